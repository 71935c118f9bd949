//! KPI handlers.

use avanzando_api::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse};
use avanzando_auth::{BearerAuth, PmAuth};
use avanzando_core::kpi::{self, KpiChanges, KpiKind, NewKpi};
use avanzando_core::patch::nullable;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::require_project;
use crate::server::AppState;

const KPI_NOT_FOUND: &str = "KPI no encontrado";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/kpis", get(list_kpis).post(create_kpi))
        .route(
            "/api/kpis/{id}",
            get(get_kpi).put(update_kpi).delete(delete_kpi),
        )
        .route("/api/kpis/dashboard/{proyecto_id}", get(kpi_dashboard))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub proyecto_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateKpiRequest {
    pub proyecto_id: i64,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    pub tipo: String,
    pub valor_objetivo: f64,
    #[serde(default)]
    pub valor_actual: f64,
    pub unidad_medida: String,
    pub umbral_amarillo: f64,
    pub umbral_rojo: f64,
}

impl CreateKpiRequest {
    fn into_new(self) -> Result<NewKpi, ApiError> {
        Ok(NewKpi {
            proyecto_id: self.proyecto_id,
            name: self.nombre,
            description: self.descripcion,
            kind: self.tipo.parse::<KpiKind>()?,
            target: self.valor_objetivo,
            current: self.valor_actual,
            unit: self.unidad_medida,
            yellow_threshold: self.umbral_amarillo,
            red_threshold: self.umbral_rojo,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateKpiRequest {
    pub nombre: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub descripcion: Option<Option<String>>,
    pub tipo: Option<String>,
    pub valor_objetivo: Option<f64>,
    pub valor_actual: Option<f64>,
    pub unidad_medida: Option<String>,
    pub umbral_amarillo: Option<f64>,
    pub umbral_rojo: Option<f64>,
}

impl UpdateKpiRequest {
    fn into_changes(self) -> Result<KpiChanges, ApiError> {
        Ok(KpiChanges {
            name: self.nombre,
            description: self.descripcion,
            kind: self.tipo.as_deref().map(str::parse::<KpiKind>).transpose()?,
            target: self.valor_objetivo,
            current: self.valor_actual,
            unit: self.unidad_medida,
            yellow_threshold: self.umbral_amarillo,
            red_threshold: self.umbral_rojo,
        })
    }
}

/// GET /api/kpis - Active KPIs, optionally of one project.
pub async fn list_kpis(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProjectQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let kpis = state.storage.kpis().list(query.proyecto_id).await?;
    let views: Vec<_> = kpis.iter().map(|k| k.view()).collect();
    Ok(Json(json!(views)))
}

/// POST /api/kpis - Create a KPI; its traffic light is derived from the thresholds.
pub async fn create_kpi(
    _pm: PmAuth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateKpiRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = req.into_new()?;
    require_project(&state, new.proyecto_id).await?;
    let kpi = state.storage.kpis().create(&new).await?;
    tracing::debug!(kpi_id = kpi.id, estado = %kpi.status, "kpi created");
    Ok(ApiResponse::created(json!({
        "message": "KPI creado exitosamente",
        "kpi": kpi.view(),
    })))
}

/// GET /api/kpis/{id}
pub async fn get_kpi(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let kpi = state
        .storage
        .kpis()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(KPI_NOT_FOUND))?;
    Ok(Json(json!(kpi.view())))
}

/// PUT /api/kpis/{id} - Partial update; the traffic light is recomputed.
pub async fn update_kpi(
    _pm: PmAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateKpiRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let changes = req.into_changes()?;
    let kpis = state.storage.kpis();
    let mut kpi = kpis
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(KPI_NOT_FOUND))?;
    changes.apply(&mut kpi);
    let kpi = kpis.update(&kpi).await?;
    Ok(Json(json!({
        "message": "KPI actualizado exitosamente",
        "kpi": kpi.view(),
    })))
}

/// DELETE /api/kpis/{id} - Soft delete.
pub async fn delete_kpi(
    _pm: PmAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.storage.kpis().deactivate(id).await? {
        return Err(ApiError::not_found(KPI_NOT_FOUND));
    }
    Ok(Json(json!({ "message": "KPI eliminado exitosamente" })))
}

/// GET /api/kpis/dashboard/{proyecto_id}
pub async fn kpi_dashboard(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(proyecto_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let kpis = state.storage.kpis().list(Some(proyecto_id)).await?;
    Ok(Json(json!(kpi::dashboard(&kpis))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use avanzando_core::kpi::KpiStatus;

    #[test]
    fn create_request_defaults_current_value() {
        let req: CreateKpiRequest = serde_json::from_str(
            r#"{"proyecto_id": 1, "nombre": "Desviación", "tipo": "costo",
                "valor_objetivo": 100, "unidad_medida": "%",
                "umbral_amarillo": 10, "umbral_rojo": 20}"#,
        )
        .unwrap();
        let new = req.into_new().unwrap();
        assert_eq!(new.current, 0.0);
        assert_eq!(new.kind, KpiKind::Cost);
        assert_eq!(new.status(), KpiStatus::Green);
    }

    #[test]
    fn unknown_kind_is_a_bad_request() {
        let req: UpdateKpiRequest = serde_json::from_str(r#"{"tipo": "velocidad"}"#).unwrap();
        let err = req.into_changes().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg.contains("velocidad")));
    }
}
