//! HandleFailedPaymentHandler - Applies a failed subscription invoice.

use std::sync::Arc;

use crate::application::handlers::notify::{log_delivery, subscription_notice};
use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::{LedgerStore, NotificationSink};

#[derive(Debug, Clone)]
pub struct HandleFailedPaymentCommand {
    pub subscription_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleFailedPaymentResult {
    MarkedPastDue {
        subscription: Subscription,
    },
    AlreadyPastDue {
        subscription_id: SubscriptionId,
    },
    /// The subscription is in a state a failed invoice does not affect.
    Skipped {
        subscription_id: SubscriptionId,
        reason: String,
    },
    UnknownSubscription,
}

/// Handler for failed invoices.
///
/// Entitlements are kept while past due; the user is told to fix payment.
pub struct HandleFailedPaymentHandler {
    ledger: Arc<dyn LedgerStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl HandleFailedPaymentHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { ledger, notifier }
    }

    pub async fn handle(
        &self,
        cmd: HandleFailedPaymentCommand,
    ) -> Result<HandleFailedPaymentResult, SubscriptionError> {
        let mut tx = self.ledger.begin().await?;
        let Some(mut subscription) = tx.lock_subscription_by_ref(&cmd.subscription_ref).await? else {
            return Ok(HandleFailedPaymentResult::UnknownSubscription);
        };

        let result = match subscription.mark_past_due(Timestamp::now()) {
            Ok(true) => {
                tx.upsert_subscription(&subscription).await?;
                tx.commit().await?;
                tracing::info!(
                    subscription_id = %subscription.id,
                    user_id = %subscription.user_id,
                    subscription_ref = %cmd.subscription_ref,
                    "Subscription past due"
                );
                HandleFailedPaymentResult::MarkedPastDue {
                    subscription: subscription.clone(),
                }
            }
            Ok(false) => HandleFailedPaymentResult::AlreadyPastDue {
                subscription_id: subscription.id,
            },
            Err(SubscriptionError::InvalidState { current, .. }) => {
                tracing::warn!(
                    subscription_id = %subscription.id,
                    subscription_ref = %cmd.subscription_ref,
                    status = %current,
                    "Failed invoice for subscription that cannot go past due"
                );
                return Ok(HandleFailedPaymentResult::Skipped {
                    subscription_id: subscription.id,
                    reason: format!("subscription is {}", current),
                });
            }
            Err(e) => return Err(e),
        };

        let plan = self.ledger.find_plan(subscription.plan_id).await.ok().flatten();
        log_delivery(
            "payment_failure",
            self.notifier
                .send_payment_failure(
                    &subscription.user_id,
                    &subscription_notice(&subscription, plan.as_ref()),
                )
                .await,
        );

        Ok(result)
    }
}
