//! PostgreSQL storage for the Avanzando API.
//!
//! One storage type per table group, each borrowing the shared pool:
//!
//! ```ignore
//! use avanzando_db_postgres::{AvanzandoStorage, PostgresConfig};
//!
//! let storage = AvanzandoStorage::from_config(&PostgresConfig::new(url)).await?;
//! let project = storage.projects().find_by_id(7).await?;
//! ```
//!
//! Queries are plain runtime `query`/`query_scalar` calls mapped with
//! `Row::try_get`. Enum columns are stored as their wire text and parsed
//! back through the domain `FromStr` impls.

mod config;
mod error;
mod pool;
mod rows;

pub mod clients;
pub mod documents;
pub mod kpis;
pub mod migrations;
pub mod predictions;
pub mod projects;
pub mod resources;
pub mod risks;
pub mod settlements;
pub mod subscriptions;
pub mod users;

use std::sync::Arc;

use avanzando_api::ApiError;
use avanzando_core::CoreError;
use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

pub use clients::ClientStorage;
pub use config::PostgresConfig;
pub use documents::DocumentStorage;
pub use error::{PostgresError, Result};
pub use kpis::KpiStorage;
pub use pool::{create_lazy_pool, create_pool, test_connection};
pub use predictions::PredictionStorage;
pub use projects::{ProjectScope, ProjectStorage, QuotaOutcome};
pub use resources::{ResourceFilter, ResourceStorage};
pub use risks::RiskStorage;
pub use settlements::SettlementStorage;
pub use subscriptions::SubscriptionStorage;
pub use users::{PgUserDirectory, UserStorage};

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Requested row was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The write collides with existing data or the row's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StorageError {
    // -------------------------------------------------------------------------
    // Constructor Methods
    // -------------------------------------------------------------------------

    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    // -------------------------------------------------------------------------
    // Predicate Methods
    // -------------------------------------------------------------------------

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a database error.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// Returns `true` if this is an invalid input error.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Returns `true` if this is a client error (4xx equivalent).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Conflict(_) | Self::InvalidInput(_)
        )
    }

    /// Returns `true` if this is a server error (5xx equivalent).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Serialization(_))
    }
}

/// Stored text that no longer parses as a domain value is a decode failure,
/// not a client mistake.
impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        Self::Database(sqlx_core::Error::Decode(Box::new(err)))
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => ApiError::not_found(what),
            StorageError::Conflict(message) => ApiError::conflict(message),
            StorageError::InvalidInput(message) => ApiError::bad_request(message),
            other => ApiError::internal(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Message for a write that points at a row which does not exist.
pub const MISSING_REFERENCE: &str = "Referencia inexistente";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Violation {
    Unique,
    ForeignKey,
}

fn violation(err: &sqlx_core::Error) -> Option<Violation> {
    match err {
        sqlx_core::Error::Database(db_err) if db_err.is_unique_violation() => {
            Some(Violation::Unique)
        }
        sqlx_core::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            Some(Violation::ForeignKey)
        }
        _ => None,
    }
}

/// Maps a unique violation to [`StorageError::Conflict`] with `message`.
///
/// A foreign-key violation becomes [`StorageError::InvalidInput`] with
/// [`MISSING_REFERENCE`].
pub(crate) fn constraint_error(err: sqlx_core::Error, message: &str) -> StorageError {
    match violation(&err) {
        Some(Violation::Unique) => StorageError::conflict(message),
        Some(Violation::ForeignKey) => StorageError::invalid_input(MISSING_REFERENCE),
        None => StorageError::from(err),
    }
}

/// Maps a foreign-key violation on insert or update to
/// [`StorageError::NotFound`] naming the missing row.
pub(crate) fn reference_error(err: sqlx_core::Error, missing: &str) -> StorageError {
    match violation(&err) {
        Some(Violation::ForeignKey) => StorageError::not_found(missing),
        _ => StorageError::from(err),
    }
}

/// Maps a foreign-key violation on delete, where other rows still point at
/// the target, to [`StorageError::Conflict`].
pub(crate) fn in_use_error(err: sqlx_core::Error, message: &str) -> StorageError {
    match violation(&err) {
        Some(Violation::ForeignKey) => StorageError::conflict(message),
        _ => constraint_error(err, message),
    }
}

// =============================================================================
// Storage Facade
// =============================================================================

/// Owns the pool and hands out per-table storage types.
#[derive(Debug, Clone)]
pub struct AvanzandoStorage {
    pool: Arc<PgPool>,
}

impl AvanzandoStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Connects with `config` and applies migrations when enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or a migration fails.
    pub async fn from_config(config: &PostgresConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        if config.run_migrations {
            migrations::run(&pool).await?;
        }
        Ok(Self::new(Arc::new(pool)))
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a reference to the Arc-wrapped pool.
    #[must_use]
    pub fn pool_arc(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }

    /// Round-trips `SELECT 1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable.
    pub async fn ping(&self) -> Result<()> {
        test_connection(&self.pool).await
    }

    /// [`UserDirectory`](avanzando_auth::UserDirectory) backed by this pool.
    #[must_use]
    pub fn user_directory(&self) -> PgUserDirectory {
        PgUserDirectory::new(self.pool_arc())
    }

    // -------------------------------------------------------------------------
    // Storage Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn users(&self) -> UserStorage<'_> {
        UserStorage::new(&self.pool)
    }

    #[must_use]
    pub fn clients(&self) -> ClientStorage<'_> {
        ClientStorage::new(&self.pool)
    }

    #[must_use]
    pub fn projects(&self) -> ProjectStorage<'_> {
        ProjectStorage::new(&self.pool)
    }

    #[must_use]
    pub fn kpis(&self) -> KpiStorage<'_> {
        KpiStorage::new(&self.pool)
    }

    #[must_use]
    pub fn risks(&self) -> RiskStorage<'_> {
        RiskStorage::new(&self.pool)
    }

    #[must_use]
    pub fn resources(&self) -> ResourceStorage<'_> {
        ResourceStorage::new(&self.pool)
    }

    #[must_use]
    pub fn documents(&self) -> DocumentStorage<'_> {
        DocumentStorage::new(&self.pool)
    }

    #[must_use]
    pub fn subscriptions(&self) -> SubscriptionStorage<'_> {
        SubscriptionStorage::new(&self.pool)
    }

    #[must_use]
    pub fn predictions(&self) -> PredictionStorage<'_> {
        PredictionStorage::new(&self.pool)
    }

    #[must_use]
    pub fn settlements(&self) -> SettlementStorage<'_> {
        SettlementStorage::new(&self.pool)
    }
}

// =============================================================================
// Tests
// =============================================================================
