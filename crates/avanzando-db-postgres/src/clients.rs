//! Client organisation storage.

use avanzando_core::client::{Client, NewClient};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::PgRow;

use crate::{PgPool, StorageError, StorageResult};

const COLUMNS: &str = "id, nombre, sector, logo, activo, fecha_creacion, fecha_actualizacion";

fn row_to_client(row: &PgRow) -> StorageResult<Client> {
    Ok(Client {
        id: row.try_get("id")?,
        name: row.try_get("nombre")?,
        sector: row.try_get("sector")?,
        logo: row.try_get("logo")?,
        active: row.try_get("activo")?,
        created_at: row.try_get("fecha_creacion")?,
        updated_at: row.try_get("fecha_actualizacion")?,
    })
}

pub struct ClientStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ClientStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active clients ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_active(&self) -> StorageResult<Vec<Client>> {
        let rows = query(&format!(
            "SELECT {COLUMNS} FROM clientes WHERE activo ORDER BY nombre, id"
        ))
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_client).collect()
    }

    /// Finds a client whether or not it is active.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<Client>> {
        let row = query(&format!("SELECT {COLUMNS} FROM clientes WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(row_to_client).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create(&self, client: &NewClient) -> StorageResult<Client> {
        let row = query(&format!(
            "INSERT INTO clientes (nombre, sector, logo) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        ))
        .bind(&client.name)
        .bind(&client.sector)
        .bind(&client.logo)
        .fetch_one(self.pool)
        .await?;
        row_to_client(&row)
    }

    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the row is gone.
    pub async fn update(&self, client: &Client) -> StorageResult<Client> {
        let row = query(&format!(
            "UPDATE clientes SET nombre = $2, sector = $3, logo = $4, activo = $5, \
             fecha_actualizacion = NOW() WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(client.id)
        .bind(&client.name)
        .bind(&client.sector)
        .bind(&client.logo)
        .bind(client.active)
        .fetch_optional(self.pool)
        .await?;
        row.as_ref()
            .map(row_to_client)
            .transpose()?
            .ok_or_else(|| StorageError::not_found("Cliente no encontrado"))
    }

    /// Soft delete. Returns `false` when no row matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn deactivate(&self, id: i64) -> StorageResult<bool> {
        let result = query(
            "UPDATE clientes SET activo = FALSE, fecha_actualizacion = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
