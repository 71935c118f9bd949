//! Risk register handlers.

use avanzando_api::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse};
use avanzando_auth::{BearerAuth, PmAuth};
use avanzando_core::patch::nullable;
use avanzando_core::risk::{self, Impact, NewRisk, Probability, RiskChanges, RiskKind, RiskStatus};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::kpis::ProjectQuery;
use super::require_project;
use crate::server::AppState;

const RISK_NOT_FOUND: &str = "Riesgo no encontrado";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/riesgos", get(list_risks).post(create_risk))
        .route(
            "/api/riesgos/{id}",
            get(get_risk).put(update_risk).delete(delete_risk),
        )
        .route("/api/riesgos/matriz/{proyecto_id}", get(risk_matrix))
        .route("/api/riesgos/dashboard/{proyecto_id}", get(risk_dashboard))
}

#[derive(Debug, Deserialize)]
pub struct CreateRiskRequest {
    pub proyecto_id: i64,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: String,
    pub tipo: String,
    pub probabilidad: i32,
    pub impacto: i32,
    #[serde(default)]
    pub plan_mitigacion: String,
    #[serde(default)]
    pub plan_contingencia: String,
    pub responsable_id: Option<i64>,
    #[serde(default)]
    pub costo_estimado: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRiskRequest {
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    pub tipo: Option<String>,
    pub probabilidad: Option<i32>,
    pub impacto: Option<i32>,
    pub estado: Option<String>,
    pub plan_mitigacion: Option<String>,
    pub plan_contingencia: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub responsable_id: Option<Option<i64>>,
    pub costo_estimado: Option<f64>,
}

impl UpdateRiskRequest {
    fn into_changes(self) -> Result<RiskChanges, ApiError> {
        Ok(RiskChanges {
            name: self.nombre,
            description: self.descripcion,
            kind: self.tipo.as_deref().map(str::parse::<RiskKind>).transpose()?,
            probability: self.probabilidad.map(Probability::try_from).transpose()?,
            impact: self.impacto.map(Impact::try_from).transpose()?,
            status: self.estado.as_deref().map(str::parse::<RiskStatus>).transpose()?,
            mitigation_plan: self.plan_mitigacion,
            contingency_plan: self.plan_contingencia,
            responsable_id: self.responsable_id,
            estimated_cost: self.costo_estimado,
        })
    }
}

/// GET /api/riesgos - Active risks, optionally of one project.
pub async fn list_risks(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProjectQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let risks = state.storage.risks().list(query.proyecto_id).await?;
    let views: Vec<_> = risks.iter().map(|r| r.view()).collect();
    Ok(Json(json!(views)))
}

/// POST /api/riesgos - Register a risk under the next free code of its project.
pub async fn create_risk(
    _pm: PmAuth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateRiskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = req.tipo.parse::<RiskKind>()?;
    let probability = Probability::try_from(req.probabilidad)?;
    let impact = Impact::try_from(req.impacto)?;
    require_project(&state, req.proyecto_id).await?;

    let risks = state.storage.risks();
    let existing = risks.count_for_project(req.proyecto_id).await?;
    let riesgo = risks
        .create(&NewRisk {
            proyecto_id: req.proyecto_id,
            code: risk::risk_code(req.proyecto_id, existing),
            name: req.nombre,
            description: req.descripcion,
            kind,
            probability,
            impact,
            mitigation_plan: req.plan_mitigacion,
            contingency_plan: req.plan_contingencia,
            responsable_id: req.responsable_id,
            estimated_cost: req.costo_estimado,
        })
        .await?;
    tracing::debug!(risk_id = riesgo.id, codigo = %riesgo.code, "risk created");

    Ok(ApiResponse::created(json!({
        "message": "Riesgo creado exitosamente",
        "riesgo": riesgo.view(),
    })))
}

/// GET /api/riesgos/{id}
pub async fn get_risk(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let riesgo = state
        .storage
        .risks()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(RISK_NOT_FOUND))?;
    Ok(Json(json!(riesgo.view())))
}

/// PUT /api/riesgos/{id} - Partial update; status changes stamp review and closing dates.
pub async fn update_risk(
    _pm: PmAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateRiskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let changes = req.into_changes()?;
    let risks = state.storage.risks();
    let mut riesgo = risks
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(RISK_NOT_FOUND))?;
    changes.apply(&mut riesgo, Utc::now());
    let riesgo = risks.update(&riesgo).await?;
    Ok(Json(json!({
        "message": "Riesgo actualizado exitosamente",
        "riesgo": riesgo.view(),
    })))
}

/// DELETE /api/riesgos/{id} - Soft delete.
pub async fn delete_risk(
    _pm: PmAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.storage.risks().deactivate(id).await? {
        return Err(ApiError::not_found(RISK_NOT_FOUND));
    }
    Ok(Json(json!({ "message": "Riesgo eliminado exitosamente" })))
}

/// GET /api/riesgos/matriz/{proyecto_id} - Probability by impact grid.
pub async fn risk_matrix(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(proyecto_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let risks = state.storage.risks().list(Some(proyecto_id)).await?;
    Ok(Json(json!(risk::matrix(&risks))))
}

/// GET /api/riesgos/dashboard/{proyecto_id}
pub async fn risk_dashboard(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(proyecto_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let risks = state.storage.risks().list(Some(proyecto_id)).await?;
    Ok(Json(json!(risk::dashboard(&risks))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_outside_the_scale_are_rejected() {
        let req: UpdateRiskRequest = serde_json::from_str(r#"{"probabilidad": 6}"#).unwrap();
        assert!(matches!(req.into_changes(), Err(ApiError::BadRequest(_))));

        let req: UpdateRiskRequest = serde_json::from_str(r#"{"impacto": 0}"#).unwrap();
        assert!(matches!(req.into_changes(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn update_request_maps_status_and_clears_owner() {
        let req: UpdateRiskRequest = serde_json::from_str(
            r#"{"estado": "en_seguimiento", "responsable_id": null, "probabilidad": 4}"#,
        )
        .unwrap();
        let changes = req.into_changes().unwrap();
        assert_eq!(changes.status, Some(RiskStatus::Monitoring));
        assert_eq!(changes.responsable_id, Some(None));
        assert_eq!(changes.probability, Some(Probability::High));
    }
}
