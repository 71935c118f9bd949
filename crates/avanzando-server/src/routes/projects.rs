//! Project and phase handlers.

use avanzando_api::{ApiError, ApiJson, ApiPath, ApiResponse};
use avanzando_auth::{BearerAuth, PmAuth};
use avanzando_core::dates::{parse_optional_date, today};
use avanzando_core::patch::nullable;
use avanzando_core::project::{NewProject, ProjectChanges, ProjectStatus, plan_advance};
use avanzando_core::user::Role;
use avanzando_db_postgres::{ProjectScope, QuotaOutcome};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::{PROJECT_NOT_FOUND, ensure_visible, require_project};
use crate::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route(
            "/api/projects/{project_id}/phases/{phase_id}/advance",
            post(advance_phase),
        )
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub nombre: Option<String>,
    pub cliente_id: Option<i64>,
    pub descripcion: Option<String>,
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
    pub presupuesto_estimado: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub nombre: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub descripcion: Option<Option<String>>,
    pub estado: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub fecha_fin: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub presupuesto_estimado: Option<Option<f64>>,
    pub presupuesto_real: Option<f64>,
}

impl UpdateProjectRequest {
    fn into_changes(self) -> Result<ProjectChanges, ApiError> {
        let status = self
            .estado
            .as_deref()
            .map(str::parse::<ProjectStatus>)
            .transpose()?;
        let end_date = match self.fecha_fin {
            Some(value) => Some(parse_optional_date(value.as_deref())?),
            None => None,
        };
        Ok(ProjectChanges {
            name: self.nombre,
            description: self.descripcion,
            status,
            end_date,
            estimated_budget: self.presupuesto_estimado,
            actual_budget: self.presupuesto_real,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub avance: Option<i64>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/projects - Projects visible to the caller.
pub async fn list_projects(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = match (user.role, user.cliente_id) {
        (Role::Administrator | Role::ProjectManager, _) => Some(ProjectScope::All),
        (Role::Client, Some(cliente_id)) => Some(ProjectScope::Client(cliente_id)),
        (Role::Client, None) | (Role::Resource, _) => None,
    };
    let projects = match scope {
        Some(scope) => state.storage.projects().list(scope).await?,
        None => Vec::new(),
    };
    Ok(Json(json!({ "projects": projects })))
}

/// POST /api/projects - Create a project with its default phases, within
/// the manager's plan quota.
pub async fn create_project(
    PmAuth(user): PmAuth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(name), Some(cliente_id)) = (req.nombre.filter(|n| !n.trim().is_empty()), req.cliente_id)
    else {
        return Err(ApiError::bad_request("Nombre y cliente_id son requeridos"));
    };

    let start_date = parse_optional_date(req.fecha_inicio.as_deref())?.unwrap_or_else(today);
    let end_date = parse_optional_date(req.fecha_fin.as_deref())?;

    state
        .storage
        .clients()
        .find_by_id(cliente_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Cliente no encontrado"))?;

    let outcome = state
        .storage
        .projects()
        .create_within_quota(
            &NewProject {
                name,
                description: req.descripcion,
                cliente_id,
                pm_id: Some(user.id),
                start_date,
                end_date,
                estimated_budget: req.presupuesto_estimado,
            },
            user.id,
            Utc::now(),
        )
        .await?;
    let project = match outcome {
        QuotaOutcome::Created(project) => project,
        QuotaOutcome::Refused(check) => {
            tracing::debug!(user_id = user.id, plan = %check.current_plan, "project quota reached");
            return Err(ApiError::upgrade_required(
                check.message,
                check.current_plan.as_str(),
            ));
        }
    };
    tracing::info!(project_id = project.project.id, pm_id = user.id, "project created");

    Ok(ApiResponse::created(json!({
        "message": "Proyecto creado exitosamente",
        "project": project,
    })))
}

/// GET /api/projects/{id} - Project with its phases.
pub async fn get_project(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .storage
        .projects()
        .detail(id)
        .await?
        .ok_or_else(|| ApiError::not_found(PROJECT_NOT_FOUND))?;
    ensure_visible(&user, &detail.project)?;
    Ok(Json(json!({ "project": detail })))
}

/// PUT /api/projects/{id} - Partial update.
pub async fn update_project(
    _pm: PmAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let changes = req.into_changes()?;
    let mut project = require_project(&state, id).await?;
    changes.apply(&mut project);
    let project = state.storage.projects().update(&project).await?;
    Ok(Json(json!({
        "message": "Proyecto actualizado exitosamente",
        "project": project,
    })))
}

/// DELETE /api/projects/{id} - Removes the project and everything under it.
pub async fn delete_project(
    PmAuth(user): PmAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.storage.projects().delete(id).await? {
        return Err(ApiError::not_found(PROJECT_NOT_FOUND));
    }
    tracing::info!(project_id = id, deleted_by = user.id, "project deleted");
    Ok(Json(json!({ "message": "Proyecto eliminado exitosamente" })))
}

/// POST /api/projects/{project_id}/phases/{phase_id}/advance
pub async fn advance_phase(
    _pm: PmAuth,
    State(state): State<AppState>,
    ApiPath((project_id, phase_id)): ApiPath<(i64, i64)>,
    ApiJson(req): ApiJson<AdvanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let advance = req
        .avance
        .ok_or_else(|| ApiError::bad_request("El avance es requerido"))?;

    let projects = state.storage.projects();
    let phase = projects
        .find_phase(project_id, phase_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Fase no encontrada"))?;

    let planned = plan_advance(&phase, advance, today())?;
    let fase = projects.record_advance(phase.id, planned).await?;
    tracing::debug!(project_id, phase_id, avance = fase.advance, "phase advanced");

    Ok(Json(json!({
        "message": "Fase actualizada exitosamente",
        "fase": fase,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn update_request_separates_null_from_absent() {
        let req: UpdateProjectRequest = serde_json::from_str(
            r#"{"estado": "pausado", "fecha_fin": null, "presupuesto_real": 1200.5}"#,
        )
        .unwrap();
        let changes = req.into_changes().unwrap();
        assert_eq!(changes.status, Some(ProjectStatus::Paused));
        assert_eq!(changes.end_date, Some(None));
        assert_eq!(changes.description, None);
        assert_eq!(changes.actual_budget, Some(1200.5));
    }

    #[test]
    fn update_request_parses_end_date() {
        let req: UpdateProjectRequest =
            serde_json::from_str(r#"{"fecha_fin": "2024-12-31"}"#).unwrap();
        let changes = req.into_changes().unwrap();
        assert_eq!(
            changes.end_date,
            Some(NaiveDate::from_ymd_opt(2024, 12, 31))
        );
    }

    #[test]
    fn update_request_rejects_unknown_status_and_bad_dates() {
        let req: UpdateProjectRequest = serde_json::from_str(r#"{"estado": "archivado"}"#).unwrap();
        assert!(matches!(req.into_changes(), Err(ApiError::BadRequest(_))));

        let req: UpdateProjectRequest = serde_json::from_str(r#"{"fecha_fin": "31/12/2024"}"#).unwrap();
        assert!(matches!(req.into_changes(), Err(ApiError::BadRequest(_))));
    }
}
