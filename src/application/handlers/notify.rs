//! Fire-and-forget delivery of notifications.
//!
//! A notification failure is logged and never undoes the ledger change that
//! triggered it.

use crate::domain::foundation::DomainError;
use crate::domain::subscription::{Plan, Subscription};
use crate::ports::SubscriptionNotice;

/// Logs a failed delivery. Successful deliveries are silent.
pub(crate) fn log_delivery(kind: &'static str, result: Result<(), DomainError>) {
    if let Err(e) = result {
        tracing::warn!(notification = kind, error = %e, "Notification delivery failed");
    }
}

/// Builds the notice sent for subscription changes.
pub(crate) fn subscription_notice(
    subscription: &Subscription,
    plan: Option<&Plan>,
) -> SubscriptionNotice {
    SubscriptionNotice {
        subscription_id: subscription.id,
        plan_id: subscription.plan_id,
        plan_name: plan
            .filter(|p| p.id == subscription.plan_id)
            .map(|p| p.name.clone()),
        status: subscription.status,
        current_period_end: subscription.current_period_end,
    }
}
