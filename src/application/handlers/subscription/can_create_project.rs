//! CanCreateProjectHandler - Query handler for the project quota gate.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::foundation::{PlanId, UserId};
use crate::domain::subscription::{ProjectLimit, SubscriptionError};
use crate::ports::{LedgerStore, ProjectDirectory};

use super::shared::resolve_entitlements;

/// Query whether a user may create one more project.
#[derive(Debug, Clone)]
pub struct CanCreateProjectQuery {
    pub user_id: UserId,
}

/// Quota check result.
///
/// The count is taken at call time. The project-creation path must repeat
/// this check inside the transaction that inserts the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanCreateProjectResult {
    pub allowed: bool,
    pub active_projects: u64,
    pub limit: ProjectLimit,
    /// `None` on the free tier.
    pub plan_id: Option<PlanId>,
}

pub struct CanCreateProjectHandler {
    ledger: Arc<dyn LedgerStore>,
    projects: Arc<dyn ProjectDirectory>,
}

impl CanCreateProjectHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>, projects: Arc<dyn ProjectDirectory>) -> Self {
        Self { ledger, projects }
    }

    pub async fn handle(
        &self,
        query: CanCreateProjectQuery,
    ) -> Result<CanCreateProjectResult, SubscriptionError> {
        let (_, entitlements) = resolve_entitlements(self.ledger.as_ref(), &query.user_id).await?;
        let active_projects = self.projects.count_active_projects(&query.user_id).await?;

        Ok(CanCreateProjectResult {
            allowed: entitlements.project_limit.allows_another(active_projects),
            active_projects,
            limit: entitlements.project_limit,
            plan_id: entitlements.plan_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::subscription::fixtures::{self, World};
    use crate::domain::subscription::SubscriptionStatus;

    fn handler(world: &World) -> CanCreateProjectHandler {
        CanCreateProjectHandler::new(world.store.clone(), Arc::new(world.ledger.clone()))
    }

    #[tokio::test]
    async fn free_tier_allows_exactly_one_project() {
        let world = fixtures::world();
        let user = fixtures::user("maker");
        let handler = handler(&world);

        let before = handler
            .handle(CanCreateProjectQuery { user_id: user.clone() })
            .await
            .unwrap();
        assert!(before.allowed);
        assert_eq!(before.limit, ProjectLimit::Limited(1));
        assert_eq!(before.plan_id, None);

        let project = world.add_project(&user, 1);
        let after = handler
            .handle(CanCreateProjectQuery { user_id: user.clone() })
            .await
            .unwrap();
        assert!(!after.allowed);
        assert_eq!(after.active_projects, 1);

        world.ledger.delete_project(project);
        let deleted = handler
            .handle(CanCreateProjectQuery { user_id: user })
            .await
            .unwrap();
        assert!(deleted.allowed);
    }

    #[tokio::test]
    async fn paid_plan_raises_the_limit() {
        let world = fixtures::world();
        let user = fixtures::user("maker");
        world.add_project(&user, 1);
        world.seed(&user, fixtures::STARTER, SubscriptionStatus::Active);

        let result = handler(&world)
            .handle(CanCreateProjectQuery { user_id: user })
            .await
            .unwrap();

        assert!(result.allowed);
        assert_eq!(result.limit, ProjectLimit::Limited(5));
        assert_eq!(result.plan_id, Some(fixtures::plan_id(fixtures::STARTER)));
    }

    #[tokio::test]
    async fn unlimited_plan_always_allows() {
        let world = fixtures::world();
        let user = fixtures::user("maker");
        for id in 1..=12 {
            world.add_project(&user, id);
        }
        world.seed(&user, fixtures::PRO, SubscriptionStatus::PastDue);

        let result = handler(&world)
            .handle(CanCreateProjectQuery { user_id: user })
            .await
            .unwrap();

        assert!(result.allowed);
        assert_eq!(result.limit, ProjectLimit::Unlimited);
    }
}
