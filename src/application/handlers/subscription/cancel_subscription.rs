//! CancelSubscriptionHandler - Command handler for cancelling a subscription.

use std::sync::Arc;

use crate::application::handlers::notify::{log_delivery, subscription_notice};
use crate::domain::foundation::{StateMachine, Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::{LedgerStore, NotificationSink, PaymentGateway};

use super::shared::{apply_locked, load_current};

#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub user_id: UserId,
    /// End now instead of at the end of the paid period.
    pub immediately: bool,
}

#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    pub subscription: Subscription,
    /// When entitlements end.
    pub effective_at: Timestamp,
}

/// Handler for cancellations.
///
/// By default the subscription stays entitled until the period ends.
pub struct CancelSubscriptionHandler {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationSink>,
}

impl CancelSubscriptionHandler {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            ledger,
            gateway,
            notifier,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, SubscriptionError> {
        let current = load_current(self.ledger.as_ref(), &cmd.user_id).await?;

        // Repeated end-of-period cancellation changes nothing.
        if !cmd.immediately && current.status == SubscriptionStatus::CancelScheduled {
            return Ok(CancelSubscriptionResult {
                effective_at: current.current_period_end,
                subscription: current,
            });
        }

        let target = if cmd.immediately {
            SubscriptionStatus::Cancelled
        } else {
            SubscriptionStatus::CancelScheduled
        };
        if !current.status.can_transition_to(&target) {
            return Err(SubscriptionError::invalid_state(current.status.as_str(), "cancel"));
        }

        self.gateway
            .cancel_subscription(&current.external_subscription_ref, !cmd.immediately)
            .await
            .map_err(|e| {
                tracing::warn!(
                    subscription_id = %current.id,
                    user_id = %cmd.user_id,
                    subscription_ref = %current.external_subscription_ref,
                    gateway_code = %e.code,
                    "Subscription cancellation failed"
                );
                SubscriptionError::from(e)
            })?;

        let now = Timestamp::now();
        let immediately = cmd.immediately;
        let subscription = apply_locked(self.ledger.as_ref(), &current, "cancel", move |sub| {
            if immediately {
                sub.cancel_now(now)
            } else {
                sub.schedule_cancellation(now)
            }
        })
        .await?;

        let effective_at = if cmd.immediately {
            now
        } else {
            subscription.current_period_end
        };

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %cmd.user_id,
            subscription_ref = %subscription.external_subscription_ref,
            immediately = cmd.immediately,
            effective_at = %effective_at,
            "Subscription cancelled"
        );

        let plan = self.ledger.find_plan(subscription.plan_id).await.ok().flatten();
        log_delivery(
            "subscription_cancellation",
            self.notifier
                .send_subscription_cancellation(
                    &cmd.user_id,
                    &subscription_notice(&subscription, plan.as_ref()),
                )
                .await,
        );

        Ok(CancelSubscriptionResult {
            subscription,
            effective_at,
        })
    }
}
