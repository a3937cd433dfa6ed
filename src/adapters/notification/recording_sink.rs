//! Notification sink that records every notice for test assertions.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::donation::Donation;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{NotificationSink, SubscriptionNotice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    DonationConfirmation,
    SubscriptionConfirmation,
    SubscriptionCancellation,
    SubscriptionRenewal,
    PaymentFailure,
}

/// A captured notice.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub user_id: UserId,
    pub donation: Option<Donation>,
    pub subscription: Option<SubscriptionNotice>,
}

#[derive(Default)]
pub struct RecordingNotificationSink {
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<bool>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose deliveries all fail after being recorded.
    pub fn failing() -> Self {
        let sink = Self::default();
        *lock(&sink.failing) = true;
        sink
    }

    pub fn sent(&self) -> Vec<Notification> {
        lock(&self.sent).clone()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        lock(&self.sent).iter().filter(|n| n.kind == kind).count()
    }

    fn record(&self, notification: Notification) -> Result<(), DomainError> {
        lock(&self.sent).push(notification);
        if *lock(&self.failing) {
            return Err(DomainError::new(
                ErrorCode::ExternalServiceError,
                "notification channel unavailable",
            ));
        }
        Ok(())
    }

    fn record_subscription(
        &self,
        kind: NotificationKind,
        user_id: &UserId,
        notice: &SubscriptionNotice,
    ) -> Result<(), DomainError> {
        self.record(Notification {
            kind,
            user_id: user_id.clone(),
            donation: None,
            subscription: Some(notice.clone()),
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn send_donation_confirmation(&self, donation: &Donation) -> Result<(), DomainError> {
        self.record(Notification {
            kind: NotificationKind::DonationConfirmation,
            user_id: donation.donor_id.clone(),
            donation: Some(donation.clone()),
            subscription: None,
        })
    }

    async fn send_subscription_confirmation(
        &self,
        user_id: &UserId,
        notice: &SubscriptionNotice,
    ) -> Result<(), DomainError> {
        self.record_subscription(NotificationKind::SubscriptionConfirmation, user_id, notice)
    }

    async fn send_subscription_cancellation(
        &self,
        user_id: &UserId,
        notice: &SubscriptionNotice,
    ) -> Result<(), DomainError> {
        self.record_subscription(NotificationKind::SubscriptionCancellation, user_id, notice)
    }

    async fn send_subscription_renewal(
        &self,
        user_id: &UserId,
        notice: &SubscriptionNotice,
    ) -> Result<(), DomainError> {
        self.record_subscription(NotificationKind::SubscriptionRenewal, user_id, notice)
    }

    async fn send_payment_failure(
        &self,
        user_id: &UserId,
        notice: &SubscriptionNotice,
    ) -> Result<(), DomainError> {
        self.record_subscription(NotificationKind::PaymentFailure, user_id, notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{PlanId, SubscriptionId, Timestamp};
    use crate::domain::subscription::SubscriptionStatus;

    fn notice() -> SubscriptionNotice {
        SubscriptionNotice {
            subscription_id: SubscriptionId::new(),
            plan_id: PlanId::new(2).unwrap(),
            plan_name: Some("Pro".to_string()),
            status: SubscriptionStatus::Active,
            current_period_end: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn records_by_kind() {
        let sink = RecordingNotificationSink::new();
        let user = UserId::new("user-1").unwrap();

        sink.send_subscription_renewal(&user, &notice()).await.unwrap();
        sink.send_payment_failure(&user, &notice()).await.unwrap();

        assert_eq!(sink.count(NotificationKind::SubscriptionRenewal), 1);
        assert_eq!(sink.count(NotificationKind::PaymentFailure), 1);
        assert_eq!(sink.sent().len(), 2);
    }

    #[tokio::test]
    async fn failing_sink_records_then_errors() {
        let sink = RecordingNotificationSink::failing();
        let user = UserId::new("user-1").unwrap();

        assert!(sink.send_subscription_confirmation(&user, &notice()).await.is_err());
        assert_eq!(sink.count(NotificationKind::SubscriptionConfirmation), 1);
    }
}
