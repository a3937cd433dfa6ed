//! ReactivateSubscriptionHandler - Command handler for undoing a scheduled cancellation.

use std::sync::Arc;

use crate::application::handlers::notify::{log_delivery, subscription_notice};
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::{LedgerStore, NotificationSink, PaymentGateway};

use super::shared::{apply_locked, load_current};

const NOTHING_TO_REACTIVATE: &str = "no cancelled subscription found";

#[derive(Debug, Clone)]
pub struct ReactivateSubscriptionCommand {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct ReactivateSubscriptionResult {
    pub subscription: Subscription,
}

pub struct ReactivateSubscriptionHandler {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationSink>,
}

impl ReactivateSubscriptionHandler {
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
        cmd: ReactivateSubscriptionCommand,
    ) -> Result<ReactivateSubscriptionResult, SubscriptionError> {
        let current = match load_current(self.ledger.as_ref(), &cmd.user_id).await {
            Ok(current) if current.status == SubscriptionStatus::CancelScheduled => current,
            Ok(_) | Err(SubscriptionError::SubscriptionNotFound(_)) => {
                return Err(SubscriptionError::validation("subscription", NOTHING_TO_REACTIVATE));
            }
            Err(e) => return Err(e),
        };

        self.gateway
            .resume_subscription(&current.external_subscription_ref)
            .await
            .map_err(|e| {
                tracing::warn!(
                    subscription_id = %current.id,
                    user_id = %cmd.user_id,
                    subscription_ref = %current.external_subscription_ref,
                    gateway_code = %e.code,
                    "Subscription reactivation failed"
                );
                SubscriptionError::from(e)
            })?;

        let now = Timestamp::now();
        let subscription = apply_locked(self.ledger.as_ref(), &current, "reactivate", move |sub| {
            sub.reactivate(now)
        })
        .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %cmd.user_id,
            subscription_ref = %subscription.external_subscription_ref,
            "Subscription reactivated"
        );

        let plan = self.ledger.find_plan(subscription.plan_id).await.ok().flatten();
        log_delivery(
            "subscription_confirmation",
            self.notifier
                .send_subscription_confirmation(
                    &cmd.user_id,
                    &subscription_notice(&subscription, plan.as_ref()),
                )
                .await,
        );

        Ok(ReactivateSubscriptionResult { subscription })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::notification::NotificationKind;
    use crate::application::handlers::subscription::fixtures::{self, World};
    use crate::application::handlers::subscription::{
        CancelSubscriptionCommand, CancelSubscriptionHandler,
    };
    use crate::domain::foundation::ErrorCode;

    fn handler(world: &World) -> ReactivateSubscriptionHandler {
        ReactivateSubscriptionHandler::new(
            world.store.clone(),
            world.payments.clone(),
            world.sink.clone(),
        )
    }

    #[tokio::test]
    async fn scheduled_cancellation_is_undone() {
        let world = fixtures::world();
        let user = fixtures::user("maker");
        let original = world.subscribe(&user, fixtures::STARTER).await;
        CancelSubscriptionHandler::new(world.store.clone(), world.payments.clone(), world.sink.clone())
            .handle(CancelSubscriptionCommand {
                user_id: user.clone(),
                immediately: false,
            })
            .await
            .unwrap();

        let result = handler(&world)
            .handle(ReactivateSubscriptionCommand { user_id: user })
            .await
            .unwrap();

        assert_eq!(result.subscription.status, SubscriptionStatus::Active);
        let remote = world.gateway.subscription(&original.external_subscription_ref).unwrap();
        assert!(!remote.cancel_at_period_end);
        // One from the initial subscribe, one from reactivation.
        assert_eq!(world.notifier.count(NotificationKind::SubscriptionConfirmation), 2);
    }

    #[tokio::test]
    async fn active_subscription_cannot_be_reactivated() {
        let world = fixtures::world();
        let user = fixtures::user("maker");
        world.subscribe(&user, fixtures::STARTER).await;

        let err = handler(&world)
            .handle(ReactivateSubscriptionCommand { user_id: user })
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert!(err.message().contains(NOTHING_TO_REACTIVATE));
        assert!(!world.gateway.was_called("resume_subscription"));
    }

    #[tokio::test]
    async fn free_tier_gets_validation_error() {
        let world = fixtures::world();

        let err = handler(&world)
            .handle(ReactivateSubscriptionCommand {
                user_id: fixtures::user("maker"),
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationFailed);
    }
}
