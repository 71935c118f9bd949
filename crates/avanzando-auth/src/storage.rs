//! User lookup used by the authentication extractors.

use async_trait::async_trait;

use avanzando_core::user::User;

use crate::AuthResult;

/// Source of accounts for token validation.
///
/// Implemented by the PostgreSQL storage; tests use an in-memory map.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, user_id: i64) -> AuthResult<Option<User>>;
}
