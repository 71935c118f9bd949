//! Account storage and the token-validation directory.

use std::sync::Arc;

use async_trait::async_trait;
use avanzando_auth::{AuthError, AuthResult, UserDirectory};
use avanzando_core::user::{NewUser, User};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::PgRow;

use crate::rows::text_enum;
use crate::{PgPool, StorageError, StorageResult, constraint_error, in_use_error};

const COLUMNS: &str = "id, nombre, email, password_hash, rol, cliente_id, activo, \
                       fecha_creacion, fecha_actualizacion";

const DUPLICATE_EMAIL: &str = "El email ya está registrado";

fn row_to_user(row: &PgRow) -> StorageResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("nombre")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: text_enum(row, "rol")?,
        cliente_id: row.try_get("cliente_id")?,
        active: row.try_get("activo")?,
        created_at: row.try_get("fecha_creacion")?,
        updated_at: row.try_get("fecha_actualizacion")?,
    })
}

pub struct UserStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> UserStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All accounts, active or not, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self) -> StorageResult<Vec<User>> {
        let rows = query(&format!("SELECT {COLUMNS} FROM users ORDER BY id"))
            .fetch_all(self.pool)
            .await?;
        rows.iter().map(row_to_user).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<User>> {
        let row = query(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let row = query(&format!("SELECT {COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] if the email is taken and
    /// [`StorageError::InvalidInput`] if `cliente_id` names no client.
    pub async fn create(&self, user: &NewUser) -> StorageResult<User> {
        let row = query(&format!(
            "INSERT INTO users (nombre, email, password_hash, rol, cliente_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.cliente_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| constraint_error(e, DUPLICATE_EMAIL))?;
        row_to_user(&row)
    }

    /// Writes every editable column of `user`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the row is gone and
    /// [`StorageError::Conflict`] if the new email is taken.
    pub async fn update(&self, user: &User) -> StorageResult<User> {
        let row = query(&format!(
            "UPDATE users SET nombre = $2, email = $3, rol = $4, cliente_id = $5, activo = $6, \
             fecha_actualizacion = NOW() WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.cliente_id)
        .bind(user.active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| constraint_error(e, DUPLICATE_EMAIL))?;
        row.as_ref()
            .map(row_to_user)
            .transpose()?
            .ok_or_else(|| StorageError::not_found("Usuario no encontrado"))
    }

    /// Hard delete. Returns `false` when no row matched.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] when documents or settlements
    /// still reference the account.
    pub async fn delete(&self, id: i64) -> StorageResult<bool> {
        let result = query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| in_use_error(e, "El usuario tiene registros asociados"))?;
        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// User Directory
// =============================================================================

/// Owned-pool adapter used by the authentication extractors.
#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: Arc<PgPool>,
}

impl PgUserDirectory {
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, user_id: i64) -> AuthResult<Option<User>> {
        UserStorage::new(&self.pool)
            .find_by_id(user_id)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))
    }
}
