//! EndSubscriptionHandler - Records that the gateway ended a subscription.

use std::sync::Arc;

use crate::application::handlers::notify::{log_delivery, subscription_notice};
use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::{LedgerStore, NotificationSink};

#[derive(Debug, Clone)]
pub struct EndSubscriptionCommand {
    pub subscription_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndSubscriptionResult {
    Ended { subscription: Subscription },
    AlreadyEnded { subscription_id: SubscriptionId },
    UnknownSubscription,
}

/// Handler for gateway-side subscription deletion, e.g. at the end of a
/// period with a scheduled cancellation.
pub struct EndSubscriptionHandler {
    ledger: Arc<dyn LedgerStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl EndSubscriptionHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { ledger, notifier }
    }

    pub async fn handle(
        &self,
        cmd: EndSubscriptionCommand,
    ) -> Result<EndSubscriptionResult, SubscriptionError> {
        let mut tx = self.ledger.begin().await?;
        let Some(mut subscription) = tx.lock_subscription_by_ref(&cmd.subscription_ref).await? else {
            return Ok(EndSubscriptionResult::UnknownSubscription);
        };

        if !subscription.end(Timestamp::now())? {
            return Ok(EndSubscriptionResult::AlreadyEnded {
                subscription_id: subscription.id,
            });
        }

        tx.upsert_subscription(&subscription).await?;
        tx.commit().await?;

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            subscription_ref = %cmd.subscription_ref,
            "Subscription ended by gateway"
        );

        let plan = self.ledger.find_plan(subscription.plan_id).await.ok().flatten();
        log_delivery(
            "subscription_cancellation",
            self.notifier
                .send_subscription_cancellation(
                    &subscription.user_id,
                    &subscription_notice(&subscription, plan.as_ref()),
                )
                .await,
        );

        Ok(EndSubscriptionResult::Ended { subscription })
    }
}
