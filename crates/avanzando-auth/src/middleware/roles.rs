//! Role gates layered on [`BearerAuth`].

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;

use avanzando_core::user::User;

use crate::error::AuthError;

use super::auth::{AuthState, BearerAuth};

pub const PM_REQUIRED: &str = "Acceso denegado. Se requiere rol de PM o superior";
pub const ADMIN_REQUIRED: &str = "Acceso denegado. Se requiere rol de administrador";

/// An authenticated `administrador` or `pm`.
#[derive(Debug, Clone)]
pub struct PmAuth(pub User);

impl<S> FromRequestParts<S> for PmAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerAuth(user) = BearerAuth::from_request_parts(parts, state).await?;
        if !user.role.is_pm_or_above() {
            tracing::debug!(user_id = user.id, rol = %user.role, "PM access denied");
            return Err(AuthError::forbidden(PM_REQUIRED));
        }
        Ok(Self(user))
    }
}

/// An authenticated `administrador`.
#[derive(Debug, Clone)]
pub struct AdminAuth(pub User);

impl<S> FromRequestParts<S> for AdminAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerAuth(user) = BearerAuth::from_request_parts(parts, state).await?;
        if !user.role.is_admin() {
            tracing::debug!(user_id = user.id, rol = %user.role, "admin access denied");
            return Err(AuthError::forbidden(ADMIN_REQUIRED));
        }
        Ok(Self(user))
    }
}
