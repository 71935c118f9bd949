//! HS256 access tokens.
//!
//! Tokens carry the user id, email and role and expire after the configured
//! lifetime. The role claim is informational; extractors always reload the
//! user so deactivation and role changes apply immediately.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use avanzando_core::user::{Role, User};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to encode token: {message}")]
    EncodingError { message: String },

    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {message}")]
    Invalid { message: String },
}

impl JwtError {
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::invalid(err.to_string()),
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub rol: Role,
    /// Expiry as a Unix timestamp in seconds.
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn for_user(user: &User, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            rol: user.role,
            exp: expires_at.timestamp(),
        }
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    #[must_use]
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Issues a token for `user` expiring `ttl` from now.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn issue(&self, user: &User) -> Result<String, JwtError> {
        self.encode(&Claims::for_user(user, Utc::now() + self.ttl))
    }

    /// # Errors
    /// Returns an error if encoding fails.
    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Decodes and validates signature and expiry.
    ///
    /// # Errors
    /// [`JwtError::Expired`] for expired tokens, [`JwtError::Invalid`] otherwise.
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;

        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }
}
