//! ListPlansHandler - Query handler for the plan catalogue.

use std::sync::Arc;

use crate::domain::subscription::{Plan, SubscriptionError};
use crate::ports::LedgerStore;

/// Lists plans currently offered, cheapest first.
pub struct ListPlansHandler {
    ledger: Arc<dyn LedgerStore>,
}

impl ListPlansHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self) -> Result<Vec<Plan>, SubscriptionError> {
        Ok(self.ledger.list_active_plans().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::subscription::fixtures;

    #[tokio::test]
    async fn retired_plans_are_hidden() {
        let world = fixtures::world();

        let plans = ListPlansHandler::new(world.store.clone()).handle().await.unwrap();

        let ids: Vec<i64> = plans.iter().map(|p| p.id.value()).collect();
        assert_eq!(ids, vec![fixtures::BASIC, fixtures::STARTER, fixtures::PRO]);
    }
}
