//! Lookups and the locked write path shared by the subscription handlers.

use crate::domain::foundation::{PlanId, Timestamp, UserId};
use crate::domain::subscription::{
    BillingInterval, Entitlements, Plan, Subscription, SubscriptionError,
};
use crate::ports::{GatewaySubscription, LedgerStore};

/// Plan a user may switch to: it must exist and still be offered.
pub(super) async fn load_offered_plan(
    ledger: &dyn LedgerStore,
    plan_id: PlanId,
) -> Result<Plan, SubscriptionError> {
    ledger
        .find_plan(plan_id)
        .await?
        .filter(|plan| plan.is_active)
        .ok_or(SubscriptionError::plan_not_found(plan_id))
}

pub(super) async fn load_current(
    ledger: &dyn LedgerStore,
    user_id: &UserId,
) -> Result<Subscription, SubscriptionError> {
    ledger
        .find_current_subscription(user_id)
        .await?
        .ok_or_else(|| SubscriptionError::not_found(user_id.clone()))
}

/// Current subscription (if any) and the entitlements it grants.
pub(super) async fn resolve_entitlements(
    ledger: &dyn LedgerStore,
    user_id: &UserId,
) -> Result<(Option<Subscription>, Entitlements), SubscriptionError> {
    let subscription = ledger.find_current_subscription(user_id).await?;
    let plan = match subscription.as_ref().and_then(|s| s.effective_plan_id()) {
        Some(plan_id) => ledger.find_plan(plan_id).await?,
        None => None,
    };
    let entitlements = Entitlements::resolve(subscription.as_ref(), plan.as_ref());
    Ok((subscription, entitlements))
}

/// Billing interval of the plan, monthly when the plan is unknown.
pub(super) async fn billing_interval(
    ledger: &dyn LedgerStore,
    plan_id: PlanId,
) -> Result<BillingInterval, SubscriptionError> {
    Ok(ledger
        .find_plan(plan_id)
        .await?
        .map(|plan| plan.billing_interval)
        .unwrap_or(BillingInterval::Monthly))
}

/// Period reported by the gateway, or `None` when it is missing or malformed.
pub(super) fn gateway_period(remote: &GatewaySubscription) -> Option<(Timestamp, Timestamp)> {
    let start = Timestamp::from_unix_secs(remote.current_period_start)?;
    let end = Timestamp::from_unix_secs(remote.current_period_end)?;
    (remote.current_period_start > 0 && !end.is_before(&start)).then_some((start, end))
}

/// Re-reads the user's subscription under lock, applies `change` and commits.
///
/// Called after the gateway already accepted the change, so every failure
/// here is logged with the gateway reference for reconciliation.
pub(super) async fn apply_locked<F>(
    ledger: &dyn LedgerStore,
    expected: &Subscription,
    action: &'static str,
    change: F,
) -> Result<Subscription, SubscriptionError>
where
    F: FnOnce(&mut Subscription) -> Result<(), SubscriptionError> + Send,
{
    let result = write_locked(ledger, expected, change).await;
    if let Err(e) = &result {
        tracing::error!(
            subscription_id = %expected.id,
            user_id = %expected.user_id,
            subscription_ref = %expected.external_subscription_ref,
            action,
            error = %e,
            "Gateway subscription change not recorded in ledger"
        );
    }
    result
}

async fn write_locked<F>(
    ledger: &dyn LedgerStore,
    expected: &Subscription,
    change: F,
) -> Result<Subscription, SubscriptionError>
where
    F: FnOnce(&mut Subscription) -> Result<(), SubscriptionError> + Send,
{
    let mut tx = ledger.begin().await?;
    let mut subscription = tx
        .lock_current_subscription(&expected.user_id)
        .await?
        .filter(|current| current.id == expected.id)
        .ok_or_else(|| {
            SubscriptionError::consistency("subscription changed while the request was in flight")
        })?;

    change(&mut subscription)?;

    tx.upsert_subscription(&subscription).await?;
    tx.commit().await?;
    Ok(subscription)
}
