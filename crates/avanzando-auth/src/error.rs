//! Authentication and authorization error types.

use avanzando_api::ApiError;

/// Errors raised while authenticating a request or checking its role.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header.
    #[error("Token requerido")]
    MissingToken,

    /// The header is not `Bearer <token>`.
    #[error("Token malformado")]
    MalformedToken,

    #[error("Token expirado")]
    TokenExpired,

    /// Bad signature, bad structure or unreadable claims.
    #[error("Token inválido")]
    InvalidToken {
        /// Why validation failed; logged, never returned.
        reason: String,
    },

    /// The token's user no longer exists or was deactivated.
    #[error("Usuario no encontrado")]
    UserNotFound,

    /// The user is authenticated but lacks the required role.
    #[error("{message}")]
    Forbidden { message: String },

    /// Looking up the user failed.
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthError {
    #[must_use]
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` for failures answered with 401.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::MissingToken
                | Self::MalformedToken
                | Self::TokenExpired
                | Self::InvalidToken { .. }
                | Self::UserNotFound
        )
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden { message } => ApiError::forbidden(message),
            AuthError::Storage { message } | AuthError::Internal { message } => {
                ApiError::internal(message)
            }
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}
