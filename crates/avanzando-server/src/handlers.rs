use avanzando_api::ApiError;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Avanzando API",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Ready once the database answers `SELECT 1`.
pub async fn readyz(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.storage.ping().await.map_err(|e| {
        tracing::warn!(error = %e, "readiness check failed");
        ApiError::service_unavailable("Base de datos no disponible")
    })?;
    Ok((StatusCode::OK, Json(HealthResponse { status: "ready" })))
}
