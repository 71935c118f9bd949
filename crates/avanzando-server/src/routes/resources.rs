//! Resource allocation handlers.

use avanzando_api::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse};
use avanzando_auth::{BearerAuth, PmAuth};
use avanzando_core::dates::parse_optional_date_time;
use avanzando_core::patch::nullable;
use avanzando_core::resource::{self, NewResource, ResourceChanges, ResourceKind};
use avanzando_db_postgres::ResourceFilter;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::require_project;
use crate::server::AppState;

const RESOURCE_NOT_FOUND: &str = "Recurso no encontrado";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/recursos", get(list_resources).post(create_resource))
        .route(
            "/api/recursos/{id}",
            get(get_resource).put(update_resource).delete(delete_resource),
        )
        .route("/api/recursos/dashboard/{proyecto_id}", get(resource_dashboard))
        .route("/api/recursos/asignacion/{proyecto_id}", get(allocation))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResourceQuery {
    pub proyecto_id: Option<i64>,
    pub tipo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    pub proyecto_id: i64,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: String,
    pub tipo: String,
    pub cantidad_requerida: f64,
    #[serde(default)]
    pub cantidad_asignada: f64,
    pub unidad_medida: String,
    #[serde(default)]
    pub costo_unitario: f64,
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
    pub usuario_asignado_id: Option<i64>,
    #[serde(default)]
    pub observaciones: String,
}

impl CreateResourceRequest {
    fn into_new(self) -> Result<NewResource, ApiError> {
        Ok(NewResource {
            proyecto_id: self.proyecto_id,
            name: self.nombre,
            description: self.descripcion,
            kind: self.tipo.parse::<ResourceKind>()?,
            required: self.cantidad_requerida,
            assigned: self.cantidad_asignada,
            unit: self.unidad_medida,
            unit_cost: self.costo_unitario,
            start: parse_optional_date_time(self.fecha_inicio.as_deref())?,
            end: parse_optional_date_time(self.fecha_fin.as_deref())?,
            usuario_asignado_id: self.usuario_asignado_id,
            notes: self.observaciones,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateResourceRequest {
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    pub tipo: Option<String>,
    pub cantidad_requerida: Option<f64>,
    pub cantidad_asignada: Option<f64>,
    pub unidad_medida: Option<String>,
    pub costo_unitario: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub fecha_inicio: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub fecha_fin: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub usuario_asignado_id: Option<Option<i64>>,
    pub observaciones: Option<String>,
}

impl UpdateResourceRequest {
    fn into_changes(self) -> Result<ResourceChanges, ApiError> {
        let start = self
            .fecha_inicio
            .map(|v| parse_optional_date_time(v.as_deref()))
            .transpose()?;
        let end = self
            .fecha_fin
            .map(|v| parse_optional_date_time(v.as_deref()))
            .transpose()?;
        Ok(ResourceChanges {
            name: self.nombre,
            description: self.descripcion,
            kind: self.tipo.as_deref().map(str::parse::<ResourceKind>).transpose()?,
            required: self.cantidad_requerida,
            assigned: self.cantidad_asignada,
            unit: self.unidad_medida,
            unit_cost: self.costo_unitario,
            start,
            end,
            usuario_asignado_id: self.usuario_asignado_id,
            notes: self.observaciones,
        })
    }
}

/// GET /api/recursos - Active resources filtered by project and kind.
pub async fn list_resources(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ResourceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = ResourceFilter {
        proyecto_id: query.proyecto_id,
        kind: query.tipo.as_deref().map(str::parse::<ResourceKind>).transpose()?,
    };
    let resources = state.storage.resources().list(filter).await?;
    let views: Vec<_> = resources.iter().map(|r| r.view()).collect();
    Ok(Json(json!(views)))
}

/// POST /api/recursos - Create a resource; cost and status are derived.
pub async fn create_resource(
    _pm: PmAuth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateResourceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = req.into_new()?;
    require_project(&state, new.proyecto_id).await?;
    let recurso = state.storage.resources().create(&new).await?;
    tracing::debug!(resource_id = recurso.id, estado = %recurso.status, "resource created");
    Ok(ApiResponse::created(json!({
        "message": "Recurso creado exitosamente",
        "recurso": recurso.view(),
    })))
}

/// GET /api/recursos/{id}
pub async fn get_resource(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let recurso = state
        .storage
        .resources()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(RESOURCE_NOT_FOUND))?;
    Ok(Json(json!(recurso.view())))
}

/// PUT /api/recursos/{id} - Partial update; cost and status are recomputed.
pub async fn update_resource(
    _pm: PmAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateResourceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let changes = req.into_changes()?;
    let resources = state.storage.resources();
    let mut recurso = resources
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(RESOURCE_NOT_FOUND))?;
    changes.apply(&mut recurso);
    let recurso = resources.update(&recurso).await?;
    Ok(Json(json!({
        "message": "Recurso actualizado exitosamente",
        "recurso": recurso.view(),
    })))
}

/// DELETE /api/recursos/{id} - Soft delete.
pub async fn delete_resource(
    _pm: PmAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.storage.resources().deactivate(id).await? {
        return Err(ApiError::not_found(RESOURCE_NOT_FOUND));
    }
    Ok(Json(json!({ "message": "Recurso eliminado exitosamente" })))
}

async fn project_resources(
    state: &AppState,
    proyecto_id: i64,
) -> Result<Vec<resource::Resource>, ApiError> {
    let filter = ResourceFilter {
        proyecto_id: Some(proyecto_id),
        kind: None,
    };
    Ok(state.storage.resources().list(filter).await?)
}

/// GET /api/recursos/dashboard/{proyecto_id}
pub async fn resource_dashboard(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(proyecto_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let resources = project_resources(&state, proyecto_id).await?;
    Ok(Json(json!(resource::dashboard(&resources))))
}

/// GET /api/recursos/asignacion/{proyecto_id}
pub async fn allocation(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(proyecto_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let resources = project_resources(&state, proyecto_id).await?;
    Ok(Json(json!({
        "datos_asignacion": resource::allocation_rows(&resources),
    })))
}
