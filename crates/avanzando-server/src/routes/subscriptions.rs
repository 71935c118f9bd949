//! Subscription, plan limit and plan catalog handlers.

use avanzando_api::{ApiError, ApiJson, ApiPath};
use avanzando_auth::BearerAuth;
use avanzando_core::subscription::{Feature, PlanType, SubscriptionState, Usage, plan_catalog};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/subscription", get(get_subscription))
        .route("/api/subscription/upgrade", post(upgrade))
        .route("/api/subscription/cancel", post(cancel))
        .route("/api/subscription/limits", get(limits))
        .route("/api/subscription/check-limit/{feature}", get(check_limit))
        .route("/api/plans", get(plans))
}

#[derive(Debug, Deserialize)]
pub struct UpgradeRequest {
    pub plan_type: Option<String>,
}

/// Only paid plans can be upgraded to.
fn paid_plan(plan_type: Option<&str>) -> Result<PlanType, ApiError> {
    match plan_type.map(str::parse::<PlanType>) {
        Some(Ok(plan @ (PlanType::Pro | PlanType::Enterprise))) => Ok(plan),
        _ => Err(ApiError::bad_request("Tipo de plan inválido")),
    }
}

/// GET /api/subscription - The caller's subscription, created on first access.
pub async fn get_subscription(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let subscription = state.storage.subscriptions().current(user.id, now).await?;
    Ok(Json(json!(subscription.view(now))))
}

/// POST /api/subscription/upgrade
pub async fn upgrade(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UpgradeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = paid_plan(req.plan_type.as_deref())?;
    let now = Utc::now();
    let upgraded = SubscriptionState::upgraded(plan, now)
        .ok_or_else(|| ApiError::bad_request("Tipo de plan inválido"))?;

    let subscription = state.storage.subscriptions().write(user.id, &upgraded).await?;
    tracing::info!(user_id = user.id, plan = %plan, "subscription upgraded");

    Ok(Json(json!({
        "message": format!("Suscripción actualizada a {plan}"),
        "subscription": subscription.view(now),
    })))
}

/// POST /api/subscription/cancel
pub async fn cancel(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let subscriptions = state.storage.subscriptions();
    // Creates the free row when the user has none yet
    subscriptions.current(user.id, now).await?;
    let subscription = subscriptions.cancel(user.id).await?;
    tracing::info!(user_id = user.id, "subscription cancelled");

    Ok(Json(json!({
        "message": "Suscripción cancelada",
        "subscription": subscription.view(now),
    })))
}

/// GET /api/subscription/limits - Plan limits alongside current usage.
pub async fn limits(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let subscription = state.storage.subscriptions().current(user.id, now).await?;
    let current_projects = state.storage.projects().count_managed_by(user.id).await?;

    Ok(Json(json!({
        "limits": subscription.limits(),
        "usage": Usage::of(&subscription, current_projects, now),
        "subscription": subscription.view(now),
    })))
}

/// GET /api/subscription/check-limit/{feature}
pub async fn check_limit(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
    ApiPath(feature): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let feature = feature.parse::<Feature>()?;
    let now = Utc::now();
    let subscription = state.storage.subscriptions().current(user.id, now).await?;
    let project_count = match feature {
        Feature::CreateProject => state.storage.projects().count_managed_by(user.id).await?,
        Feature::AiFeatures | Feature::AdvancedAnalytics => 0,
    };
    Ok(Json(json!(subscription.check(feature, project_count, now))))
}

/// GET /api/plans - Public plan catalog.
pub async fn plans() -> impl IntoResponse {
    Json(json!(plan_catalog()))
}
