//! Embedded schema migrations.
//!
//! SQL files under `migrations/` are compiled into the binary and applied
//! through sqlx's migrator, which records them in `_sqlx_migrations`.
//! To add one, create the file and append an entry to
//! `embedded_migrations!()`.

use std::borrow::Cow;

use sqlx_core::migrate::{Migration, MigrationType};
use tracing::{info, instrument};

use crate::PgPool;
use crate::error::{PostgresError, Result};

/// (version, description, sql), in chronological order.
macro_rules! embedded_migrations {
    () => {
        &[
            (
                20240101000001i64,
                "initial_schema",
                include_str!("../../migrations/20240101000001_initial_schema.sql"),
            ),
            (
                20240315000001i64,
                "settlements",
                include_str!("../../migrations/20240315000001_settlements.sql"),
            ),
        ]
    };
}

fn build_migrations() -> Vec<Migration> {
    embedded_migrations!()
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]),
            no_tx: false,
        })
        .collect()
}

/// Applies every pending migration.
///
/// # Errors
///
/// Returns [`PostgresError::Migration`] if a migration fails to execute.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> Result<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "Running database migrations (embedded)");

    let migrator = sqlx_core::migrate::Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| PostgresError::Migration(format!("Migration failed: {e}")))?;

    info!("Database migrations completed successfully");

    Ok(())
}
