//! Registration, login and profile handlers.

use avanzando_api::{ApiError, ApiJson, ApiResponse};
use avanzando_auth::{BearerAuth, verify_password};
use avanzando_core::user::{NewUser, Role};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::hash_off_runtime;
use crate::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/profile", get(profile))
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub nombre: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub rol: Option<String>,
    pub cliente_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Treats missing and blank fields alike.
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/auth/register - Create an account.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(name), Some(email), Some(password)) = (
        required(req.nombre),
        required(req.email),
        required(req.password),
    ) else {
        return Err(ApiError::bad_request(
            "Nombre, email y contraseña son requeridos",
        ));
    };

    let role = match req.rol.as_deref() {
        Some(rol) => rol.parse::<Role>()?,
        None => Role::default(),
    };

    let users = state.storage.users();
    if users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict("El email ya está registrado"));
    }

    let password_hash = hash_off_runtime(password).await?;

    let user = users
        .create(&NewUser {
            name,
            email,
            password_hash,
            role,
            cliente_id: req.cliente_id,
        })
        .await?;
    tracing::info!(user_id = user.id, rol = %user.role, "user registered");

    Ok(ApiResponse::created(json!({
        "message": "Usuario registrado exitosamente",
        "user": user,
    })))
}

/// POST /api/auth/login - Exchange credentials for a Bearer token.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(password)) = (required(req.email), required(req.password)) else {
        return Err(ApiError::bad_request("Email y contraseña son requeridos"));
    };

    let invalid = || ApiError::unauthorized("Credenciales inválidas");

    let user = state
        .storage
        .users()
        .find_by_email(&email)
        .await?
        .filter(|u| u.active)
        .ok_or_else(invalid)?;

    let stored = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::internal(format!("password check task failed: {e}")))?;
    // A malformed stored hash is treated like a wrong password
    let matches = verified.unwrap_or_else(|e| {
        tracing::warn!(user_id = user.id, error = %e, "stored password hash is unreadable");
        false
    });
    if !matches {
        tracing::debug!(user_id = user.id, "login rejected");
        return Err(invalid());
    }

    let token = state
        .jwt()
        .issue(&user)
        .map_err(|e| ApiError::internal(format!("token issuing failed: {e}")))?;
    tracing::info!(user_id = user.id, "login succeeded");

    Ok(Json(json!({
        "message": "Login exitoso",
        "token": token,
        "user": user,
    })))
}

/// GET /api/auth/profile - The authenticated account.
pub async fn profile(
    BearerAuth(current): BearerAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .storage
        .users()
        .find_by_id(current.id)
        .await?
        .filter(|u| u.active)
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;
    Ok(Json(json!({ "user": user })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_count_as_missing() {
        assert_eq!(required(None), None);
        assert_eq!(required(Some("   ".into())), None);
        assert_eq!(required(Some("ana".into())).as_deref(), Some("ana"));
    }

    #[test]
    fn register_payload_accepts_partial_bodies() {
        let req: RegisterRequest =
            serde_json::from_str(r#"{"nombre": "Ana", "email": "ana@example.com"}"#).unwrap();
        assert!(req.password.is_none());
        assert!(req.rol.is_none());
    }
}
