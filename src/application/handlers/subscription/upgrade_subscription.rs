//! UpgradeSubscriptionHandler - Command handler for subscribing or switching plan now.

use std::sync::Arc;

use crate::application::handlers::notify::{log_delivery, subscription_notice};
use crate::domain::foundation::{PlanId, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{
    NewSubscription, Plan, Subscription, SubscriptionError, SubscriptionStatus,
};
use crate::ports::{
    CreateSubscriptionRequest, GatewaySubscriptionStatus, LedgerStore, NotificationSink,
    PaymentGateway, Proration, UpdateSubscriptionRequest,
};

use super::shared::{apply_locked, gateway_period, load_offered_plan};

/// Command to move a user onto `plan_id` immediately.
#[derive(Debug, Clone)]
pub struct UpgradeSubscriptionCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
    /// Required when the user has no subscription yet.
    pub payment_method_ref: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpgradeSubscriptionResult {
    pub subscription: Subscription,
    /// True when a new subscription was started from the free tier.
    pub created: bool,
}

/// Handler for upgrades.
///
/// From the free tier a new gateway subscription is created. An existing
/// subscription is swapped in place with immediate proration. Choosing the
/// current plan while a downgrade is pending withdraws the downgrade; the
/// gateway goes back to the current price without proration. Nothing is
/// written to the ledger unless the gateway accepted the change.
pub struct UpgradeSubscriptionHandler {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationSink>,
}

impl UpgradeSubscriptionHandler {
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
        cmd: UpgradeSubscriptionCommand,
    ) -> Result<UpgradeSubscriptionResult, SubscriptionError> {
        let plan = load_offered_plan(self.ledger.as_ref(), cmd.plan_id).await?;
        let current = self.ledger.find_current_subscription(&cmd.user_id).await?;

        let result = match current {
            None => self.start(&cmd, &plan).await?,
            Some(current) => self.swap(current, &plan).await?,
        };

        tracing::info!(
            subscription_id = %result.subscription.id,
            user_id = %cmd.user_id,
            plan_id = %plan.id,
            subscription_ref = %result.subscription.external_subscription_ref,
            created = result.created,
            "Subscription upgraded"
        );

        log_delivery(
            "subscription_confirmation",
            self.notifier
                .send_subscription_confirmation(
                    &cmd.user_id,
                    &subscription_notice(&result.subscription, Some(&plan)),
                )
                .await,
        );

        Ok(result)
    }

    async fn start(
        &self,
        cmd: &UpgradeSubscriptionCommand,
        plan: &Plan,
    ) -> Result<UpgradeSubscriptionResult, SubscriptionError> {
        let payment_method_ref = cmd
            .payment_method_ref
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                SubscriptionError::validation(
                    "payment_method_ref",
                    "a payment method is required to start a subscription",
                )
            })?;

        let id = SubscriptionId::new();
        let remote = self
            .gateway
            .create_subscription(CreateSubscriptionRequest {
                user_id: cmd.user_id.clone(),
                price_ref: plan.external_price_ref.clone(),
                payment_method_ref: payment_method_ref.to_string(),
                idempotency_key: format!("subscription-{}", id),
            })
            .await
            .map_err(|e| {
                tracing::warn!(
                    user_id = %cmd.user_id,
                    plan_id = %plan.id,
                    gateway_code = %e.code,
                    "Subscription creation failed"
                );
                SubscriptionError::from(e)
            })?;

        let status = match remote.status {
            GatewaySubscriptionStatus::Active => SubscriptionStatus::Active,
            GatewaySubscriptionStatus::Trialing => SubscriptionStatus::Trialing,
            other => {
                tracing::warn!(
                    user_id = %cmd.user_id,
                    subscription_ref = %remote.id,
                    gateway_status = ?other,
                    "Gateway did not activate the subscription"
                );
                return Err(SubscriptionError::PaymentDeclined {
                    message: "the first payment for this subscription did not go through"
                        .to_string(),
                });
            }
        };

        let now = Timestamp::now();
        let (period_start, period_end) = gateway_period(&remote)
            .unwrap_or_else(|| (now, now.add_days(plan.billing_interval.days())));

        let subscription = Subscription::start(
            NewSubscription {
                id,
                user_id: cmd.user_id.clone(),
                plan_id: plan.id,
                status,
                external_subscription_ref: remote.id.clone(),
                current_period_start: period_start,
                current_period_end: period_end,
            },
            now,
        )?;

        if let Err(e) = self.insert(&subscription).await {
            tracing::error!(
                subscription_id = %subscription.id,
                user_id = %cmd.user_id,
                subscription_ref = %remote.id,
                error = %e,
                "Gateway subscription created but not recorded in ledger"
            );
            return Err(e);
        }

        Ok(UpgradeSubscriptionResult {
            subscription,
            created: true,
        })
    }

    async fn insert(&self, subscription: &Subscription) -> Result<(), SubscriptionError> {
        let mut tx = self.ledger.begin().await?;
        tx.upsert_subscription(subscription).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn swap(
        &self,
        current: Subscription,
        plan: &Plan,
    ) -> Result<UpgradeSubscriptionResult, SubscriptionError> {
        let withdraw = current.plan_id == plan.id;
        if withdraw && current.scheduled_plan_id.is_none() {
            return Err(SubscriptionError::validation(
                "plan_id",
                "already subscribed to this plan",
            ));
        }

        let remote = self
            .gateway
            .update_subscription(UpdateSubscriptionRequest {
                subscription_ref: current.external_subscription_ref.clone(),
                price_ref: plan.external_price_ref.clone(),
                proration: if withdraw {
                    Proration::None
                } else {
                    Proration::Immediate
                },
                resume: current.status == SubscriptionStatus::CancelScheduled,
                idempotency_key: format!(
                    "upgrade-{}-{}-{}",
                    current.id,
                    plan.id,
                    current.updated_at.as_unix_secs()
                ),
            })
            .await
            .map_err(|e| {
                tracing::warn!(
                    subscription_id = %current.id,
                    user_id = %current.user_id,
                    subscription_ref = %current.external_subscription_ref,
                    gateway_code = %e.code,
                    "Subscription upgrade failed"
                );
                SubscriptionError::from(e)
            })?;

        let now = Timestamp::now();
        let (period_start, period_end) = gateway_period(&remote)
            .unwrap_or((current.current_period_start, current.current_period_end));
        let plan_id = plan.id;

        let subscription = apply_locked(self.ledger.as_ref(), &current, "upgrade", move |sub| {
            sub.change_plan(plan_id, period_start, period_end, now)
        })
        .await?;

        Ok(UpgradeSubscriptionResult {
            subscription,
            created: false,
        })
    }
}
