//! HTTP DTOs for subscription endpoints.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::{CanCreateProjectResult, GetCommissionRateResult};
use crate::domain::foundation::{PlanId, SubscriptionId, Timestamp};
use crate::domain::subscription::{
    BillingInterval, Plan, ProjectLimit, Subscription, SubscriptionStatus,
};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to subscribe, or to move to a more expensive plan.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRequest {
    pub plan_id: i64,
    /// Gateway payment method; required when starting from the free tier.
    #[serde(default)]
    pub payment_method_id: Option<String>,
}

/// Request to schedule a cheaper plan for the next period.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DowngradeRequest {
    pub plan_id: i64,
}

/// Request to cancel the subscription.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    /// Whether to cancel immediately or at period end.
    #[serde(default)]
    pub immediately: bool,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Whether the caller may create another project.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectQuotaResponse {
    pub allowed: bool,
    pub active_projects: u64,
    /// `null` when the plan has no project limit.
    pub project_limit: Option<u32>,
    /// `null` on the free tier.
    pub plan_id: Option<PlanId>,
}

impl From<CanCreateProjectResult> for ProjectQuotaResponse {
    fn from(result: CanCreateProjectResult) -> Self {
        Self {
            allowed: result.allowed,
            active_projects: result.active_projects,
            project_limit: limit_value(result.limit),
            plan_id: result.plan_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRateResponse {
    pub rate: Decimal,
    pub plan_id: Option<PlanId>,
}

impl From<GetCommissionRateResult> for CommissionRateResponse {
    fn from(result: GetCommissionRateResult) -> Self {
        Self {
            rate: result.rate.as_decimal(),
            plan_id: result.plan_id,
        }
    }
}

/// A plan as offered to users.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub id: PlanId,
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    pub billing_interval: BillingInterval,
    pub project_limit: Option<u32>,
    pub commission_rate: Decimal,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        Self {
            id: plan.id,
            name: plan.name,
            price: plan.price.to_decimal(),
            currency: plan.currency.as_str().to_string(),
            billing_interval: plan.billing_interval,
            project_limit: limit_value(plan.project_limit),
            commission_rate: plan.commission_rate.as_decimal(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlansResponse {
    pub plans: Vec<PlanResponse>,
}

/// Subscription state after a plan change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub id: SubscriptionId,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,
    pub scheduled_plan_id: Option<PlanId>,
    pub cancelled_at: Option<Timestamp>,
    /// When the requested change takes effect, for deferred changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_at: Option<Timestamp>,
}

impl SubscriptionResponse {
    pub fn effective_at(mut self, at: Timestamp) -> Self {
        self.effective_at = Some(at);
        self
    }
}

impl From<Subscription> for SubscriptionResponse {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id,
            plan_id: sub.plan_id,
            status: sub.status,
            current_period_start: sub.current_period_start,
            current_period_end: sub.current_period_end,
            scheduled_plan_id: sub.scheduled_plan_id,
            cancelled_at: sub.cancelled_at,
            effective_at: None,
        }
    }
}

fn limit_value(limit: ProjectLimit) -> Option<u32> {
    match limit {
        ProjectLimit::Limited(n) => Some(n),
        ProjectLimit::Unlimited => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Currency, Money};
    use crate::domain::subscription::CommissionRate;

    #[test]
    fn unlimited_plan_renders_null_limit() {
        let plan = Plan {
            id: PlanId::new(3).unwrap(),
            name: "Pro".to_string(),
            price: Money::from_minor(2900).unwrap(),
            currency: Currency::usd(),
            billing_interval: BillingInterval::Monthly,
            project_limit: ProjectLimit::Unlimited,
            commission_rate: CommissionRate::new(Decimal::new(3, 2)).unwrap(),
            external_price_ref: "price_pro".to_string(),
            is_active: true,
        };

        let json = serde_json::to_value(PlanResponse::from(plan)).unwrap();

        assert!(json["projectLimit"].is_null());
        assert_eq!(json["billingInterval"], "monthly");
        assert!(json.get("externalPriceRef").is_none());
    }

    #[test]
    fn cancel_defaults_to_end_of_period() {
        let req: CancelRequest = serde_json::from_str("{}").unwrap();
        assert!(!req.immediately);
    }

    #[test]
    fn upgrade_reads_payment_method() {
        let req: UpgradeRequest =
            serde_json::from_str(r#"{"planId": 2, "paymentMethodId": "pm_1"}"#).unwrap();
        assert_eq!(req.plan_id, 2);
        assert_eq!(req.payment_method_id.as_deref(), Some("pm_1"));
    }
}
