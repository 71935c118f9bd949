//! Heuristic prediction and insight handlers.
//!
//! Every route sits behind the AI plan gate and is limited to the project's
//! PM or an administrator. Each prediction run is stored with its inputs.

use avanzando_api::{ApiError, ApiPath};
use avanzando_auth::BearerAuth;
use avanzando_core::prediction::{
    self, BUDGET_CONFIDENCE, BudgetInput, CompletionInput, DEFAULT_DAYS_ELAPSED,
    KPI_FORECAST_CONFIDENCE, KpiForecastInput, NewPrediction, PredictionType, RISK_CONFIDENCE,
    RiskImpactInput,
};
use avanzando_core::project::{self as project_core, Project};
use avanzando_core::subscription::Feature;
use avanzando_core::user::User;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};

use super::{ensure_manages, require_feature, require_project};
use crate::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/ai/predict/project-completion/{project_id}",
            post(predict_project_completion),
        )
        .route(
            "/api/ai/predict/budget-overrun/{project_id}",
            post(predict_budget_overrun),
        )
        .route("/api/ai/predict/kpi-forecast/{kpi_id}", post(forecast_kpi))
        .route("/api/ai/predict/risk-impact/{risk_id}", post(predict_risk_impact))
        .route("/api/ai/predictions/{project_id}", get(list_predictions))
        .route("/api/ai/insights/{project_id}", get(insights))
}

/// Plan gate, then project lookup, then ownership.
async fn authorize(state: &AppState, user: &User, project_id: i64) -> Result<Project, ApiError> {
    require_feature(state, user, Feature::AiFeatures).await?;
    let project = require_project(state, project_id).await?;
    ensure_manages(user, &project)?;
    Ok(project)
}

/// Stores a completed run and renders `{prediction, result}`.
async fn record<I: Serialize, R: Serialize>(
    state: &AppState,
    project_id: i64,
    prediction_type: PredictionType,
    input: &I,
    result: &R,
    confidence: f64,
) -> Result<Json<Value>, ApiError> {
    let new = NewPrediction::from_run(project_id, prediction_type, input, result, confidence)
        .map_err(|e| ApiError::internal(format!("prediction serialization failed: {e}")))?;
    let stored = state.storage.predictions().record(&new).await?;
    tracing::info!(
        project_id,
        prediction_id = stored.id,
        prediction_type = %prediction_type,
        confidence,
        "prediction recorded"
    );
    Ok(Json(json!({
        "prediction": stored,
        "result": new.prediction_result,
    })))
}

/// POST /api/ai/predict/project-completion/{project_id}
pub async fn predict_project_completion(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
    ApiPath(project_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let project = authorize(&state, &user, project_id).await?;
    let phases = state.storage.projects().phases(project_id).await?;

    let input = CompletionInput {
        project_id,
        progress: project_core::progress(&phases),
        days_elapsed: project
            .days_elapsed(Utc::now().date_naive())
            .unwrap_or(DEFAULT_DAYS_ELAPSED),
        total_phases: phases.len(),
        completed_phases: phases.iter().filter(|p| p.completed).count(),
        budget_used_percentage: project.budget_used_percentage(),
    };
    let result = prediction::predict_completion(&input);
    let confidence = result.completion_probability;

    record(
        &state,
        project_id,
        PredictionType::ProjectCompletion,
        &input,
        &result,
        confidence,
    )
    .await
}

/// POST /api/ai/predict/budget-overrun/{project_id}
pub async fn predict_budget_overrun(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
    ApiPath(project_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let project = authorize(&state, &user, project_id).await?;
    let phases = state.storage.projects().phases(project_id).await?;

    let input = BudgetInput {
        project_id,
        budget_used_percentage: project.budget_used_percentage(),
        progress_percentage: project_core::progress(&phases),
        estimated_budget: project.estimated_budget.unwrap_or(0.0),
        spent_budget: project.actual_budget,
    };
    let result = prediction::predict_budget_overrun(&input);

    record(
        &state,
        project_id,
        PredictionType::BudgetOverrun,
        &input,
        &result,
        BUDGET_CONFIDENCE,
    )
    .await
}

/// POST /api/ai/predict/kpi-forecast/{kpi_id}
pub async fn forecast_kpi(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
    ApiPath(kpi_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_feature(&state, &user, Feature::AiFeatures).await?;
    let kpi = state
        .storage
        .kpis()
        .find_by_id(kpi_id)
        .await?
        .ok_or_else(|| ApiError::not_found("KPI no encontrado"))?;
    let project = require_project(&state, kpi.proyecto_id).await?;
    ensure_manages(&user, &project)?;

    let input = KpiForecastInput::for_kpi(&kpi);
    let result = prediction::forecast_kpi(&input);

    record(
        &state,
        kpi.proyecto_id,
        PredictionType::KpiForecast,
        &input,
        &result,
        KPI_FORECAST_CONFIDENCE,
    )
    .await
}

/// POST /api/ai/predict/risk-impact/{risk_id}
pub async fn predict_risk_impact(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
    ApiPath(risk_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_feature(&state, &user, Feature::AiFeatures).await?;
    let risk = state
        .storage
        .risks()
        .find_by_id(risk_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Riesgo no encontrado"))?;
    let project = require_project(&state, risk.proyecto_id).await?;
    ensure_manages(&user, &project)?;

    let input = RiskImpactInput::for_risk(&risk);
    let result = prediction::assess_risk_impact(&input);

    record(
        &state,
        risk.proyecto_id,
        PredictionType::RiskProbability,
        &input,
        &result,
        RISK_CONFIDENCE,
    )
    .await
}

/// GET /api/ai/predictions/{project_id} - Stored runs, newest first.
pub async fn list_predictions(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
    ApiPath(project_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &user, project_id).await?;
    let predictions = state.storage.predictions().list_for_project(project_id).await?;
    Ok(Json(json!({
        "total": predictions.len(),
        "predictions": predictions,
    })))
}

/// GET /api/ai/insights/{project_id}
pub async fn insights(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
    ApiPath(project_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let project = authorize(&state, &user, project_id).await?;
    let phases = state.storage.projects().phases(project_id).await?;
    let kpis = state.storage.kpis().list(Some(project_id)).await?;
    let risks = state.storage.risks().list(Some(project_id)).await?;

    let insights = prediction::project_insights(
        project_core::progress(&phases),
        project.budget_used_percentage(),
        &kpis,
        &risks,
        Utc::now(),
    );
    Ok(Json(json!(insights)))
}
