//! ProcessRenewalHandler - Applies a paid subscription invoice.

use std::sync::Arc;

use crate::application::handlers::notify::{log_delivery, subscription_notice};
use crate::domain::foundation::{PlanId, SubscriptionId, Timestamp};
use crate::domain::subscription::{RenewalOutcome, Subscription, SubscriptionError};
use crate::ports::{LedgerStore, NotificationSink};

use super::shared::billing_interval;

#[derive(Debug, Clone)]
pub struct ProcessRenewalCommand {
    pub subscription_ref: String,
    /// End of the paid period, when the gateway reports it.
    pub period_end: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessRenewalResult {
    Renewed {
        subscription: Subscription,
        /// Plan that took over from a scheduled downgrade.
        swapped_to: Option<PlanId>,
    },
    AlreadyApplied {
        subscription_id: SubscriptionId,
    },
    /// No subscription with this gateway reference.
    UnknownSubscription,
}

/// Handler for renewals. Safe to call repeatedly for the same invoice.
pub struct ProcessRenewalHandler {
    ledger: Arc<dyn LedgerStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl ProcessRenewalHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { ledger, notifier }
    }

    pub async fn handle(
        &self,
        cmd: ProcessRenewalCommand,
    ) -> Result<ProcessRenewalResult, SubscriptionError> {
        let mut tx = self.ledger.begin().await?;
        let Some(mut subscription) = tx.lock_subscription_by_ref(&cmd.subscription_ref).await? else {
            return Ok(ProcessRenewalResult::UnknownSubscription);
        };

        let interval = billing_interval(self.ledger.as_ref(), subscription.plan_id).await?;
        let outcome = subscription.renew(cmd.period_end, interval, Timestamp::now())?;

        let swapped_to = match outcome {
            RenewalOutcome::AlreadyApplied => {
                tracing::debug!(
                    subscription_id = %subscription.id,
                    subscription_ref = %cmd.subscription_ref,
                    "Renewal already applied"
                );
                return Ok(ProcessRenewalResult::AlreadyApplied {
                    subscription_id: subscription.id,
                });
            }
            RenewalOutcome::Renewed { swapped_to } => swapped_to,
        };

        tx.upsert_subscription(&subscription).await?;
        tx.commit().await?;

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            subscription_ref = %cmd.subscription_ref,
            plan_id = %subscription.plan_id,
            period_end = %subscription.current_period_end,
            downgraded = swapped_to.is_some(),
            "Subscription renewed"
        );

        let plan = self.ledger.find_plan(subscription.plan_id).await.ok().flatten();
        log_delivery(
            "subscription_renewal",
            self.notifier
                .send_subscription_renewal(
                    &subscription.user_id,
                    &subscription_notice(&subscription, plan.as_ref()),
                )
                .await,
        );

        Ok(ProcessRenewalResult::Renewed {
            subscription,
            swapped_to,
        })
    }
}
