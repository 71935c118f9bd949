//! User administration handlers.

use avanzando_api::{ApiError, ApiJson, ApiPath, ApiResponse};
use avanzando_auth::{AdminAuth, BearerAuth};
use avanzando_core::user::{NewUser, Role, UserChanges, default_email_for};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::hash_off_runtime;
use crate::server::AppState;

const USER_NOT_FOUND: &str = "Usuario no encontrado";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub nombre: Option<String>,
    pub email: Option<String>,
}

/// GET /api/users - Every account.
pub async fn list_users(
    _auth: BearerAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.storage.users().list().await?;
    Ok(Json(users))
}

/// POST /api/users - Create a `recurso` account with the default password.
pub async fn create_user(
    AdminAuth(admin): AdminAuth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req
        .nombre
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("El nombre es requerido"))?;
    let email = req
        .email
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| default_email_for(&name));

    let password_hash = hash_off_runtime(state.config.auth.default_user_password.clone()).await?;

    let user = state
        .storage
        .users()
        .create(&NewUser {
            name,
            email,
            password_hash,
            role: Role::Resource,
            cliente_id: None,
        })
        .await?;
    tracing::info!(user_id = user.id, created_by = admin.id, "user created");

    Ok(ApiResponse::created(json!({ "user": user })))
}

/// GET /api/users/{id}
pub async fn get_user(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .storage
        .users()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;
    Ok(Json(user))
}

/// PUT /api/users/{id} - Partial update.
pub async fn update_user(
    _admin: AdminAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(changes): ApiJson<UserChanges>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.storage.users();
    let mut user = users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;
    changes.apply(&mut user);
    let user = users.update(&user).await?;
    Ok(Json(user))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    AdminAuth(admin): AdminAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.storage.users().delete(id).await? {
        return Err(ApiError::not_found(USER_NOT_FOUND));
    }
    tracing::info!(user_id = id, deleted_by = admin.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
