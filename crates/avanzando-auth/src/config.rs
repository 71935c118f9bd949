//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// `[auth]` section of the server configuration.
///
/// ```toml
/// [auth]
/// jwt_secret = "change-me"
/// token_ttl_hours = 24
/// default_user_password = "defaultpassword123"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify tokens.
    pub jwt_secret: String,

    /// Token lifetime in hours.
    pub token_ttl_hours: i64,

    /// Password given to accounts created by administrators.
    pub default_user_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-key".to_string(),
            token_ttl_hours: 24,
            default_user_password: "defaultpassword123".to_string(),
        }
    }
}

impl AuthConfig {
    /// Checks the values that would make every login fail.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.trim().is_empty() {
            return Err("auth.jwt_secret must not be empty".into());
        }
        if self.token_ttl_hours <= 0 {
            return Err("auth.token_ttl_hours must be positive".into());
        }
        if self.default_user_password.is_empty() {
            return Err("auth.default_user_password must not be empty".into());
        }
        Ok(())
    }
}
