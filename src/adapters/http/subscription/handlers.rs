//! HTTP handlers for subscription endpoints.

use axum::extract::{Json, State};
use axum::response::IntoResponse;

use crate::application::{
    CanCreateProjectQuery, CancelSubscriptionCommand, DowngradeSubscriptionCommand,
    GetCommissionRateQuery, ReactivateSubscriptionCommand, UpgradeSubscriptionCommand,
};
use crate::domain::foundation::PlanId;
use crate::domain::subscription::SubscriptionError;

use super::dto::{
    CancelRequest, CommissionRateResponse, DowngradeRequest, PlanResponse, PlansResponse,
    ProjectQuotaResponse, SubscriptionResponse, UpgradeRequest,
};
use crate::adapters::http::error::ApiError;
use crate::adapters::http::middleware::RequireAuth;
use crate::adapters::http::state::AppState;

fn plan_id(raw: i64) -> Result<PlanId, ApiError> {
    PlanId::new(raw).map_err(|e| SubscriptionError::from(e).into())
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/subscription/project-quota - Can the caller create another project?
pub async fn get_project_quota(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .can_create_project_handler()
        .handle(CanCreateProjectQuery { user_id: user.id })
        .await?;

    Ok(Json(ProjectQuotaResponse::from(result)))
}

/// GET /api/subscription/commission-rate - Commission charged on the caller's projects
pub async fn get_commission_rate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .commission_rate_handler()
        .handle(GetCommissionRateQuery { user_id: user.id })
        .await?;

    Ok(Json(CommissionRateResponse::from(result)))
}

/// GET /api/subscription/plans - Plans currently offered
pub async fn list_plans(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let plans = state.list_plans_handler().handle().await?;

    Ok(Json(PlansResponse {
        plans: plans.into_iter().map(PlanResponse::from).collect(),
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscription/upgrade - Subscribe or move to another plan now
pub async fn upgrade(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<UpgradeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = UpgradeSubscriptionCommand {
        user_id: user.id,
        plan_id: plan_id(request.plan_id)?,
        payment_method_ref: request.payment_method_id,
    };

    let result = state.upgrade_handler().handle(cmd).await?;

    Ok(Json(SubscriptionResponse::from(result.subscription)))
}

/// POST /api/subscription/downgrade - Schedule a cheaper plan for the next period
pub async fn downgrade(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<DowngradeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = DowngradeSubscriptionCommand {
        user_id: user.id,
        plan_id: plan_id(request.plan_id)?,
    };

    let result = state.downgrade_handler().handle(cmd).await?;

    Ok(Json(
        SubscriptionResponse::from(result.subscription).effective_at(result.effective_at),
    ))
}

/// POST /api/subscription/cancel - Cancel now or at period end
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    request: Option<Json<CancelRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let cmd = CancelSubscriptionCommand {
        user_id: user.id,
        immediately: request.immediately,
    };

    let result = state.cancel_handler().handle(cmd).await?;

    Ok(Json(
        SubscriptionResponse::from(result.subscription).effective_at(result.effective_at),
    ))
}

/// POST /api/subscription/reactivate - Undo a scheduled cancellation
pub async fn reactivate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .reactivate_handler()
        .handle(ReactivateSubscriptionCommand { user_id: user.id })
        .await?;

    Ok(Json(SubscriptionResponse::from(result.subscription)))
}
