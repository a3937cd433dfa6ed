//! Notification sink that emits tracing events.
//!
//! Stands in for an email or push channel: delivery is the log line.

use async_trait::async_trait;

use crate::domain::donation::Donation;
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{NotificationSink, SubscriptionNotice};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotificationSink;

impl LoggingNotificationSink {
    pub fn new() -> Self {
        Self
    }

    fn subscription_notice(kind: &'static str, user_id: &UserId, notice: &SubscriptionNotice) {
        tracing::info!(
            notification = kind,
            user_id = %user_id,
            subscription_id = %notice.subscription_id,
            plan_id = %notice.plan_id,
            plan_name = notice.plan_name.as_deref().unwrap_or(""),
            status = %notice.status,
            current_period_end = %notice.current_period_end.as_datetime(),
            "Subscription notification"
        );
    }
}

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn send_donation_confirmation(&self, donation: &Donation) -> Result<(), DomainError> {
        tracing::info!(
            notification = "donation_confirmation",
            donation_id = %donation.id,
            project_id = %donation.project_id,
            user_id = %donation.donor_id,
            amount_minor = donation.amount.as_minor(),
            currency = %donation.currency,
            "Donation confirmation"
        );
        Ok(())
    }

    async fn send_subscription_confirmation(
        &self,
        user_id: &UserId,
        notice: &SubscriptionNotice,
    ) -> Result<(), DomainError> {
        Self::subscription_notice("subscription_confirmation", user_id, notice);
        Ok(())
    }

    async fn send_subscription_cancellation(
        &self,
        user_id: &UserId,
        notice: &SubscriptionNotice,
    ) -> Result<(), DomainError> {
        Self::subscription_notice("subscription_cancellation", user_id, notice);
        Ok(())
    }

    async fn send_subscription_renewal(
        &self,
        user_id: &UserId,
        notice: &SubscriptionNotice,
    ) -> Result<(), DomainError> {
        Self::subscription_notice("subscription_renewal", user_id, notice);
        Ok(())
    }

    async fn send_payment_failure(
        &self,
        user_id: &UserId,
        notice: &SubscriptionNotice,
    ) -> Result<(), DomainError> {
        Self::subscription_notice("payment_failure", user_id, notice);
        Ok(())
    }
}
