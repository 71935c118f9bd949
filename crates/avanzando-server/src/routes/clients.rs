//! Client organisation handlers.

use avanzando_api::{ApiError, ApiJson, ApiPath, ApiResponse};
use avanzando_auth::{AdminAuth, BearerAuth};
use avanzando_core::client::{ClientChanges, NewClient};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::server::AppState;

const CLIENT_NOT_FOUND: &str = "Cliente no encontrado";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/clientes", get(list_clients).post(create_client))
        .route(
            "/api/clientes/{id}",
            get(get_client).put(update_client).delete(delete_client),
        )
}

/// GET /api/clientes - Active clients.
pub async fn list_clients(
    _auth: BearerAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let clientes = state.storage.clients().list_active().await?;
    Ok(Json(json!({ "clientes": clientes })))
}

/// POST /api/clientes
pub async fn create_client(
    _admin: AdminAuth,
    State(state): State<AppState>,
    ApiJson(client): ApiJson<NewClient>,
) -> Result<impl IntoResponse, ApiError> {
    if client.name.trim().is_empty() {
        return Err(ApiError::bad_request("El nombre es requerido"));
    }
    let cliente = state.storage.clients().create(&client).await?;
    tracing::info!(cliente_id = cliente.id, "client created");
    Ok(ApiResponse::created(json!({
        "message": "Cliente creado exitosamente",
        "cliente": cliente,
    })))
}

/// GET /api/clientes/{id}
pub async fn get_client(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let cliente = state
        .storage
        .clients()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(CLIENT_NOT_FOUND))?;
    Ok(Json(json!({ "cliente": cliente })))
}

/// PUT /api/clientes/{id}
pub async fn update_client(
    _admin: AdminAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(changes): ApiJson<ClientChanges>,
) -> Result<impl IntoResponse, ApiError> {
    let clients = state.storage.clients();
    let mut cliente = clients
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(CLIENT_NOT_FOUND))?;
    changes.apply(&mut cliente);
    let cliente = clients.update(&cliente).await?;
    Ok(Json(json!({
        "message": "Cliente actualizado exitosamente",
        "cliente": cliente,
    })))
}

/// DELETE /api/clientes/{id} - Soft delete.
pub async fn delete_client(
    _admin: AdminAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.storage.clients().deactivate(id).await? {
        return Err(ApiError::not_found(CLIENT_NOT_FOUND));
    }
    Ok(Json(json!({ "message": "Cliente eliminado exitosamente" })))
}
