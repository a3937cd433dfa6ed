//! GetCommissionRateHandler - Query handler for the platform commission rate.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::foundation::{PlanId, UserId};
use crate::domain::subscription::{CommissionRate, SubscriptionError};
use crate::ports::LedgerStore;

use super::shared::resolve_entitlements;

#[derive(Debug, Clone)]
pub struct GetCommissionRateQuery {
    /// Owner of the project receiving donations.
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetCommissionRateResult {
    pub rate: CommissionRate,
    pub plan_id: Option<PlanId>,
}

/// Resolves the commission taken from donations to a user's projects.
///
/// Fee computation itself belongs to the caller.
pub struct GetCommissionRateHandler {
    ledger: Arc<dyn LedgerStore>,
}

impl GetCommissionRateHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    pub async fn handle(
        &self,
        query: GetCommissionRateQuery,
    ) -> Result<GetCommissionRateResult, SubscriptionError> {
        let (_, entitlements) = resolve_entitlements(self.ledger.as_ref(), &query.user_id).await?;
        Ok(GetCommissionRateResult {
            rate: entitlements.commission_rate,
            plan_id: entitlements.plan_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::subscription::fixtures;
    use crate::domain::subscription::SubscriptionStatus;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn free_tier_pays_five_percent() {
        let world = fixtures::world();
        let handler = GetCommissionRateHandler::new(world.store.clone());

        let result = handler
            .handle(GetCommissionRateQuery {
                user_id: fixtures::user("maker"),
            })
            .await
            .unwrap();

        assert_eq!(result.rate.as_decimal(), Decimal::new(5, 2));
        assert_eq!(result.plan_id, None);
    }

    #[tokio::test]
    async fn subscriber_gets_plan_rate() {
        let world = fixtures::world();
        let user = fixtures::user("maker");
        world.seed(&user, fixtures::PRO, SubscriptionStatus::CancelScheduled);
        let handler = GetCommissionRateHandler::new(world.store.clone());

        let result = handler
            .handle(GetCommissionRateQuery { user_id: user })
            .await
            .unwrap();

        assert_eq!(result.rate.as_decimal(), Decimal::new(3, 2));
    }
}
