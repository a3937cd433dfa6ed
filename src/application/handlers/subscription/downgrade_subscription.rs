//! DowngradeSubscriptionHandler - Command handler for scheduling a cheaper plan.

use std::sync::Arc;

use crate::domain::foundation::{PlanId, StateMachine, Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::{
    LedgerStore, PaymentGateway, ProjectDirectory, Proration, UpdateSubscriptionRequest,
};

use super::shared::{apply_locked, load_current, load_offered_plan};

#[derive(Debug, Clone)]
pub struct DowngradeSubscriptionCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
}

#[derive(Debug, Clone)]
pub struct DowngradeSubscriptionResult {
    pub subscription: Subscription,
    /// When the new plan takes over.
    pub effective_at: Timestamp,
}

/// Handler for downgrades.
///
/// The gateway switches price without proration; the ledger keeps the
/// current plan until the renewal that starts the next period.
pub struct DowngradeSubscriptionHandler {
    ledger: Arc<dyn LedgerStore>,
    projects: Arc<dyn ProjectDirectory>,
    gateway: Arc<dyn PaymentGateway>,
}

impl DowngradeSubscriptionHandler {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        projects: Arc<dyn ProjectDirectory>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            ledger,
            projects,
            gateway,
        }
    }

    pub async fn handle(
        &self,
        cmd: DowngradeSubscriptionCommand,
    ) -> Result<DowngradeSubscriptionResult, SubscriptionError> {
        // 1. Validate against the current state
        let current = load_current(self.ledger.as_ref(), &cmd.user_id).await?;
        let plan = load_offered_plan(self.ledger.as_ref(), cmd.plan_id).await?;

        if current.plan_id == plan.id {
            return Err(SubscriptionError::validation(
                "plan_id",
                "already subscribed to this plan",
            ));
        }
        if !current
            .status
            .can_transition_to(&SubscriptionStatus::DowngradeScheduled)
        {
            return Err(SubscriptionError::invalid_state(
                current.status.as_str(),
                "downgrade",
            ));
        }

        let active_projects = self.projects.count_active_projects(&cmd.user_id).await?;
        if !plan.project_limit.allows(active_projects) {
            return Err(SubscriptionError::validation(
                "plan_id",
                format!(
                    "you have {} active projects but the {} plan allows {}; delete projects before downgrading",
                    active_projects, plan.name, plan.project_limit
                ),
            ));
        }

        // 2. Switch price at the gateway
        self.gateway
            .update_subscription(UpdateSubscriptionRequest {
                subscription_ref: current.external_subscription_ref.clone(),
                price_ref: plan.external_price_ref.clone(),
                proration: Proration::None,
                resume: false,
                idempotency_key: format!(
                    "downgrade-{}-{}-{}",
                    current.id,
                    plan.id,
                    current.updated_at.as_unix_secs()
                ),
            })
            .await
            .map_err(|e| {
                tracing::warn!(
                    subscription_id = %current.id,
                    user_id = %cmd.user_id,
                    subscription_ref = %current.external_subscription_ref,
                    gateway_code = %e.code,
                    "Subscription downgrade failed"
                );
                SubscriptionError::from(e)
            })?;

        // 3. Schedule the swap
        let plan_id = plan.id;
        let now = Timestamp::now();
        let subscription = apply_locked(self.ledger.as_ref(), &current, "downgrade", move |sub| {
            sub.schedule_downgrade(plan_id, now)
        })
        .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %cmd.user_id,
            plan_id = %subscription.plan_id,
            scheduled_plan_id = %plan_id,
            effective_at = %subscription.current_period_end,
            "Subscription downgrade scheduled"
        );

        Ok(DowngradeSubscriptionResult {
            effective_at: subscription.current_period_end,
            subscription,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::subscription::fixtures::{self, World};
    use crate::domain::foundation::ErrorCode;

    fn handler(world: &World) -> DowngradeSubscriptionHandler {
        DowngradeSubscriptionHandler::new(
            world.store.clone(),
            Arc::new(world.ledger.clone()),
            world.payments.clone(),
        )
    }

    fn command(user: &UserId, plan: i64) -> DowngradeSubscriptionCommand {
        DowngradeSubscriptionCommand {
            user_id: user.clone(),
            plan_id: fixtures::plan_id(plan),
        }
    }

    #[tokio::test]
    async fn schedules_swap_without_changing_plan() {
        let world = fixtures::world();
        let user = fixtures::user("maker");
        let original = world.subscribe(&user, fixtures::PRO).await;
        world.add_project(&user, 1);

        let result = handler(&world).handle(command(&user, fixtures::BASIC)).await.unwrap();

        assert_eq!(result.subscription.status, SubscriptionStatus::DowngradeScheduled);
        assert_eq!(result.subscription.plan_id, fixtures::plan_id(fixtures::PRO));
        assert_eq!(
            result.subscription.scheduled_plan_id,
            Some(fixtures::plan_id(fixtures::BASIC))
        );
        assert_eq!(result.effective_at, original.current_period_end);
        let call = world
            .gateway
            .calls()
            .into_iter()
            .find(|c| c.method == "update_subscription")
            .unwrap();
        assert_eq!(call.args[2], "none");
    }

    #[tokio::test]
    async fn too_many_projects_is_rejected_and_status_kept() {
        let world = fixtures::world();
        let user = fixtures::user("maker");
        world.subscribe(&user, fixtures::PRO).await;
        for id in 1..=3 {
            world.add_project(&user, id);
        }

        let err = handler(&world).handle(command(&user, fixtures::BASIC)).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert!(!world.gateway.was_called("update_subscription"));
        let stored = world.current(&user).await.unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(stored.scheduled_plan_id, None);
    }

    #[tokio::test]
    async fn exactly_at_limit_is_allowed() {
        let world = fixtures::world();
        let user = fixtures::user("maker");
        world.subscribe(&user, fixtures::PRO).await;
        world.add_project(&user, 1);
        world.add_project(&user, 2);

        let result = handler(&world).handle(command(&user, fixtures::BASIC)).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn free_tier_has_nothing_to_downgrade() {
        let world = fixtures::world();

        let err = handler(&world)
            .handle(command(&fixtures::user("maker"), fixtures::BASIC))
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::SubscriptionNotFound(_)));
    }

    #[tokio::test]
    async fn cancel_scheduled_cannot_downgrade() {
        let world = fixtures::world();
        let user = fixtures::user("maker");
        world.seed(&user, fixtures::PRO, SubscriptionStatus::CancelScheduled);

        let err = handler(&world).handle(command(&user, fixtures::BASIC)).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
        assert!(!world.gateway.was_called("update_subscription"));
    }
}
