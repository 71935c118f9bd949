//! # avanzando-auth
//!
//! Authentication and authorization for the Avanzando API.
//!
//! ## Modules
//!
//! - [`config`] - Token secret, lifetime and default credentials
//! - [`jwt`] - HS256 token issuing and validation
//! - [`password`] - Argon2 password hashing
//! - [`storage`] - The user lookup the extractors depend on
//! - [`middleware`] - Axum extractors for Bearer tokens and role gates

pub mod config;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod storage;

pub use config::AuthConfig;
pub use error::AuthError;
pub use jwt::{Claims, JwtError, JwtService};
pub use middleware::{AdminAuth, AuthState, BearerAuth, PmAuth};
pub use password::{hash_password, verify_password};
pub use storage::UserDirectory;

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;
