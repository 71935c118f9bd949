//! Axum extractors for authentication and role gates.
//!
//! ```ignore
//! use avanzando_auth::middleware::{BearerAuth, PmAuth};
//!
//! async fn profile(BearerAuth(user): BearerAuth) -> String {
//!     user.name
//! }
//!
//! async fn create_project(PmAuth(user): PmAuth) -> String {
//!     format!("created by {}", user.id)
//! }
//! ```

pub mod auth;
pub mod error;
pub mod roles;

pub use auth::{AuthState, BearerAuth};
pub use roles::{ADMIN_REQUIRED, AdminAuth, PM_REQUIRED, PmAuth};
