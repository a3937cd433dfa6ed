//! NotificationSink port - messages triggered by ledger state changes.
//!
//! Delivery is fire-and-forget from the ledger's point of view: a failed
//! notification is logged and never undoes the financial change that
//! triggered it.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::donation::Donation;
use crate::domain::foundation::{DomainError, PlanId, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::SubscriptionStatus;

/// Subscription details included in user notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionNotice {
    pub subscription_id: SubscriptionId,
    pub plan_id: PlanId,
    pub plan_name: Option<String>,
    pub status: SubscriptionStatus,
    pub current_period_end: Timestamp,
}

/// Port for outbound user notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Donation was confirmed by the gateway.
    async fn send_donation_confirmation(&self, donation: &Donation) -> Result<(), DomainError>;

    /// Subscription was created, upgraded or reactivated.
    async fn send_subscription_confirmation(
        &self,
        user_id: &UserId,
        notice: &SubscriptionNotice,
    ) -> Result<(), DomainError>;

    /// Subscription was cancelled or scheduled for cancellation.
    async fn send_subscription_cancellation(
        &self,
        user_id: &UserId,
        notice: &SubscriptionNotice,
    ) -> Result<(), DomainError>;

    /// Subscription period was extended.
    async fn send_subscription_renewal(
        &self,
        user_id: &UserId,
        notice: &SubscriptionNotice,
    ) -> Result<(), DomainError>;

    /// Subscription invoice failed.
    async fn send_payment_failure(
        &self,
        user_id: &UserId,
        notice: &SubscriptionNotice,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_sink_is_object_safe() {
        fn _accepts_dyn(_sink: &dyn NotificationSink) {}
    }
}
