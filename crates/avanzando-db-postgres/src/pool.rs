//! Connection pool management.

use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::Postgres;
use tracing::{debug, info, instrument};

use crate::PgPool;
use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};

/// Type alias for PostgreSQL pool options.
pub type PgPoolOptions = PoolOptions<Postgres>;

/// Creates a new PostgreSQL connection pool from the given configuration.
///
/// # Errors
///
/// Returns [`PostgresError::Config`] when no database is configured and
/// [`PostgresError::Connection`] when the first connection fails.
#[instrument(skip(config))]
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    let options = config.connect_options()?;

    info!(
        host = options.get_host(),
        port = options.get_port(),
        database = ?options.get_database(),
        pool_size = config.pool_size,
        min_connections = ?config.min_connections,
        connect_timeout_ms = config.connect_timeout_ms,
        max_lifetime_secs = ?config.max_lifetime_secs,
        "Creating PostgreSQL connection pool"
    );

    let pool = pool_options(config).connect_with(options).await?;

    debug!("PostgreSQL connection pool created successfully");

    Ok(pool)
}

/// Builds a pool without opening a connection; the first query connects.
///
/// # Errors
///
/// Returns [`PostgresError::Config`] when no database is configured or the
/// URL cannot be parsed.
pub fn create_lazy_pool(config: &PostgresConfig) -> Result<PgPool> {
    let options = config.connect_options()?;
    debug!(host = options.get_host(), "Creating lazy PostgreSQL pool");
    Ok(pool_options(config).connect_lazy_with(options))
}

fn pool_options(config: &PostgresConfig) -> PgPoolOptions {
    let min_connections = config
        .min_connections
        .unwrap_or(config.pool_size / 4)
        .max(1);
    let max_lifetime_secs = config.max_lifetime_secs.unwrap_or(1800);

    let mut options = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .min_connections(min_connections)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .max_lifetime(Duration::from_secs(max_lifetime_secs))
        .test_before_acquire(false);

    if let Some(idle_timeout) = config.idle_timeout_ms {
        options = options.idle_timeout(Duration::from_millis(idle_timeout));
    }
    options
}

/// Runs `SELECT 1`; backs the readiness check.
///
/// # Errors
///
/// Returns an error if no connection can be acquired or the query fails.
#[instrument(skip(pool))]
pub async fn test_connection(pool: &PgPool) -> Result<()> {
    sqlx_core::query::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(PostgresError::from)?;

    debug!("Database connection test successful");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_coordinates_fail_before_connecting() {
        let config = PostgresConfig {
            host: None,
            ..Default::default()
        };
        let err = create_pool(&config).await.unwrap_err();
        assert!(matches!(err, PostgresError::Config { .. }));
        assert!(matches!(
            create_lazy_pool(&config),
            Err(PostgresError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn lazy_pool_does_not_connect_up_front() {
        let config = PostgresConfig::new("postgres://postgres@127.0.0.1:1/avanzando")
            .with_connect_timeout_ms(200);
        let pool = create_lazy_pool(&config).unwrap();
        assert!(test_connection(&pool).await.is_err());
    }
}
