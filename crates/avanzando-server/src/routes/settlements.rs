//! Cost settlement handlers: periods, expenses, logged hours and approval.

use avanzando_api::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse};
use avanzando_auth::{BearerAuth, PmAuth};
use avanzando_core::dates::parse_date;
use avanzando_core::settlement::{
    self, ExpenseKind, NewExpense, NewHoursEntry, NewSettlement, Settlement, SettlementStatus,
};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::kpis::ProjectQuery;
use super::require_project;
use crate::server::AppState;

const SETTLEMENT_NOT_FOUND: &str = "Liquidación no encontrada";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/liquidaciones",
            get(list_settlements).post(create_settlement),
        )
        .route("/api/liquidaciones/gastos", post(add_expense))
        .route("/api/liquidaciones/horas", post(add_hours))
        .route("/api/liquidaciones/{id}/gastos", get(list_expenses))
        .route("/api/liquidaciones/{id}/estado", post(change_status))
        .route("/api/liquidaciones/{id}/reporte", get(settlement_report))
}

#[derive(Debug, Deserialize)]
pub struct CreateSettlementRequest {
    pub proyecto_id: i64,
    pub periodo_inicio: String,
    pub periodo_fin: String,
    pub observaciones: Option<String>,
}

impl CreateSettlementRequest {
    fn into_new(self, creado_por: i64) -> Result<NewSettlement, ApiError> {
        let new = NewSettlement {
            proyecto_id: self.proyecto_id,
            period_start: parse_date(&self.periodo_inicio)?,
            period_end: parse_date(&self.periodo_fin)?,
            notes: self.observaciones,
            creado_por,
        };
        new.validate()?;
        Ok(new)
    }
}

#[derive(Debug, Deserialize)]
pub struct ExpenseRequest {
    pub liquidacion_id: i64,
    pub tipo_gasto: String,
    pub descripcion: String,
    pub cantidad: f64,
    pub precio_unitario: f64,
    pub total: Option<f64>,
    pub fecha_gasto: String,
    pub comprobante_url: Option<String>,
}

impl ExpenseRequest {
    fn into_new(self) -> Result<NewExpense, ApiError> {
        if self.cantidad < 0.0 || self.precio_unitario < 0.0 {
            return Err(ApiError::bad_request(
                "Cantidad y precio unitario no pueden ser negativos",
            ));
        }
        Ok(NewExpense {
            liquidacion_id: self.liquidacion_id,
            kind: self.tipo_gasto.parse::<ExpenseKind>()?,
            total: settlement::expense_total(self.cantidad, self.precio_unitario, self.total),
            description: self.descripcion,
            quantity: self.cantidad,
            unit_price: self.precio_unitario,
            date: parse_date(&self.fecha_gasto)?,
            receipt_url: self.comprobante_url,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct HoursRequest {
    pub liquidacion_id: i64,
    pub recurso_id: i64,
    pub fecha: String,
    pub horas_trabajadas: f64,
    pub tarifa_hora: f64,
    pub descripcion_actividad: Option<String>,
}

impl HoursRequest {
    fn into_new(self) -> Result<NewHoursEntry, ApiError> {
        let entry = NewHoursEntry {
            liquidacion_id: self.liquidacion_id,
            recurso_id: self.recurso_id,
            date: parse_date(&self.fecha)?,
            hours: self.horas_trabajadas,
            hourly_rate: self.tarifa_hora,
            activity: self.descripcion_actividad,
        };
        entry.validate()?;
        Ok(entry)
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub estado: String,
}

async fn require_settlement(state: &AppState, id: i64) -> Result<Settlement, ApiError> {
    state
        .storage
        .settlements()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(SETTLEMENT_NOT_FOUND))
}

/// GET /api/liquidaciones - Settlements, optionally of one project.
pub async fn list_settlements(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProjectQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let liquidaciones = state.storage.settlements().list(query.proyecto_id).await?;
    Ok(Json(json!({ "liquidaciones": liquidaciones })))
}

/// POST /api/liquidaciones - Open a draft settlement for a period.
pub async fn create_settlement(
    PmAuth(user): PmAuth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateSettlementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = req.into_new(user.id)?;
    require_project(&state, new.proyecto_id).await?;
    let liquidacion = state.storage.settlements().create(&new).await?;
    tracing::info!(
        settlement_id = liquidacion.id,
        project_id = liquidacion.proyecto_id,
        "settlement opened"
    );
    Ok(ApiResponse::created(json!({
        "message": "Liquidación creada exitosamente",
        "liquidacion": liquidacion,
    })))
}

/// POST /api/liquidaciones/gastos - Add an expense line to a draft.
pub async fn add_expense(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ExpenseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = req.into_new()?;
    let gasto = state.storage.settlements().add_expense(&new).await?;
    Ok(ApiResponse::created(json!({
        "message": "Gasto registrado exitosamente",
        "gasto": gasto,
    })))
}

/// GET /api/liquidaciones/{id}/gastos
pub async fn list_expenses(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_settlement(&state, id).await?;
    let gastos = state.storage.settlements().expenses(id).await?;
    Ok(Json(json!({ "gastos": gastos })))
}

/// POST /api/liquidaciones/horas - Log worked hours on a draft.
pub async fn add_hours(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<HoursRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = req.into_new()?;
    let registro = state.storage.settlements().add_hours(&entry).await?;
    Ok(ApiResponse::created(json!({
        "message": "Horas registradas exitosamente",
        "registro": registro,
    })))
}

/// POST /api/liquidaciones/{id}/estado - Move through the approval workflow.
pub async fn change_status(
    PmAuth(user): PmAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let next = req.estado.parse::<SettlementStatus>()?;
    let current = require_settlement(&state, id).await?;
    let change = current.transition(next, user.id, Utc::now())?;
    let liquidacion = state.storage.settlements().set_status(id, change).await?;
    tracing::info!(
        settlement_id = id,
        from = %current.status,
        to = %next,
        actor = user.id,
        "settlement status changed"
    );
    Ok(Json(json!({
        "message": format!("Liquidación actualizada a {next}"),
        "liquidacion": liquidacion,
    })))
}

/// GET /api/liquidaciones/{id}/reporte - Lines plus per-kind totals.
pub async fn settlement_report(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let liquidacion = require_settlement(&state, id).await?;
    let settlements = state.storage.settlements();
    let gastos = settlements.expenses(id).await?;
    let horas = settlements.hours(id).await?;
    Ok(Json(json!(settlement::report(&liquidacion, &gastos, &horas))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_periods_are_rejected() {
        let req: CreateSettlementRequest = serde_json::from_str(
            r#"{"proyecto_id": 1, "periodo_inicio": "2024-03-31", "periodo_fin": "2024-03-01"}"#,
        )
        .unwrap();
        assert!(matches!(req.into_new(5), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn expense_total_falls_back_to_quantity_times_price() {
        let req: ExpenseRequest = serde_json::from_str(
            r#"{"liquidacion_id": 2, "tipo_gasto": "transporte", "descripcion": "Fletes",
                "cantidad": 3, "precio_unitario": 40.5, "fecha_gasto": "2024-03-10"}"#,
        )
        .unwrap();
        let new = req.into_new().unwrap();
        assert_eq!(new.kind, ExpenseKind::Transport);
        assert_eq!(new.total, 121.5);

        let req: ExpenseRequest = serde_json::from_str(
            r#"{"liquidacion_id": 2, "tipo_gasto": "otro", "descripcion": "Ajuste",
                "cantidad": 1, "precio_unitario": 10, "total": 8, "fecha_gasto": "2024-03-10"}"#,
        )
        .unwrap();
        assert_eq!(req.into_new().unwrap().total, 8.0);
    }

    #[test]
    fn unknown_expense_kinds_are_a_bad_request() {
        let req: ExpenseRequest = serde_json::from_str(
            r#"{"liquidacion_id": 2, "tipo_gasto": "viaticos", "descripcion": "x",
                "cantidad": 1, "precio_unitario": 1, "fecha_gasto": "2024-03-10"}"#,
        )
        .unwrap();
        assert!(matches!(req.into_new(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn hours_must_fit_in_a_day() {
        let req: HoursRequest = serde_json::from_str(
            r#"{"liquidacion_id": 2, "recurso_id": 4, "fecha": "2024-03-10",
                "horas_trabajadas": 25, "tarifa_hora": 30}"#,
        )
        .unwrap();
        assert!(matches!(req.into_new(), Err(ApiError::BadRequest(_))));

        let req: HoursRequest = serde_json::from_str(
            r#"{"liquidacion_id": 2, "recurso_id": 4, "fecha": "2024-03-10",
                "horas_trabajadas": 8, "tarifa_hora": 30}"#,
        )
        .unwrap();
        assert_eq!(req.into_new().unwrap().total(), 240.0);
    }
}
