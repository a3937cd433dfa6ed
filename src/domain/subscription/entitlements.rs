//! What a user may do under their current plan.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::PlanId;

use super::{CommissionRate, Plan, ProjectLimit, Subscription};

/// Entitlements resolved for one user.
///
/// Users without an entitled subscription get the implicit free tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlements {
    /// `None` for the free tier.
    pub plan_id: Option<PlanId>,
    pub project_limit: ProjectLimit,
    pub commission_rate: CommissionRate,
}

impl Entitlements {
    /// One project, 5% commission.
    pub fn free_tier() -> Self {
        Self {
            plan_id: None,
            project_limit: ProjectLimit::Limited(1),
            commission_rate: CommissionRate::free_tier(),
        }
    }

    pub fn for_plan(plan: &Plan) -> Self {
        Self {
            plan_id: Some(plan.id),
            project_limit: plan.project_limit,
            commission_rate: plan.commission_rate,
        }
    }

    /// Resolves entitlements from an optional subscription and its current plan.
    ///
    /// A cancelled subscription, or one whose plan cannot be found, yields the free tier.
    pub fn resolve(subscription: Option<&Subscription>, plan: Option<&Plan>) -> Self {
        match (subscription, plan) {
            (Some(sub), Some(plan)) if sub.status.is_entitled() && sub.plan_id == plan.id => {
                Self::for_plan(plan)
            }
            _ => Self::free_tier(),
        }
    }

    pub fn is_free_tier(&self) -> bool {
        self.plan_id.is_none()
    }
}
