//! KPI storage.

use avanzando_core::kpi::{Kpi, NewKpi};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::PgRow;

use crate::rows::text_enum;
use crate::{PgPool, StorageError, StorageResult, reference_error};

const COLUMNS: &str = "id, proyecto_id, nombre, descripcion, tipo, valor_objetivo, valor_actual, \
    unidad_medida, estado, umbral_amarillo, umbral_rojo, activo, fecha_creacion, \
    fecha_actualizacion";

fn row_to_kpi(row: &PgRow) -> StorageResult<Kpi> {
    Ok(Kpi {
        id: row.try_get("id")?,
        proyecto_id: row.try_get("proyecto_id")?,
        name: row.try_get("nombre")?,
        description: row.try_get("descripcion")?,
        kind: text_enum(row, "tipo")?,
        target: row.try_get("valor_objetivo")?,
        current: row.try_get("valor_actual")?,
        unit: row.try_get("unidad_medida")?,
        status: text_enum(row, "estado")?,
        yellow_threshold: row.try_get("umbral_amarillo")?,
        red_threshold: row.try_get("umbral_rojo")?,
        active: row.try_get("activo")?,
        created_at: row.try_get("fecha_creacion")?,
        updated_at: row.try_get("fecha_actualizacion")?,
    })
}

pub struct KpiStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> KpiStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active KPIs, optionally limited to one project.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self, proyecto_id: Option<i64>) -> StorageResult<Vec<Kpi>> {
        let rows = query(&format!(
            "SELECT {COLUMNS} FROM kpis WHERE activo AND ($1::BIGINT IS NULL OR proyecto_id = $1) \
             ORDER BY id"
        ))
        .bind(proyecto_id)
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_kpi).collect()
    }

    /// Active KPIs of several projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_for_projects(&self, project_ids: &[i64]) -> StorageResult<Vec<Kpi>> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = query(&format!(
            "SELECT {COLUMNS} FROM kpis WHERE activo AND proyecto_id = ANY($1) ORDER BY id"
        ))
        .bind(project_ids)
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_kpi).collect()
    }

    /// Finds a KPI, including deactivated ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<Kpi>> {
        let row = query(&format!("SELECT {COLUMNS} FROM kpis WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(row_to_kpi).transpose()
    }

    /// Inserts with the status classified from the thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] if the project no longer exists.
    pub async fn create(&self, kpi: &NewKpi) -> StorageResult<Kpi> {
        let row = query(&format!(
            "INSERT INTO kpis (proyecto_id, nombre, descripcion, tipo, valor_objetivo, \
                               valor_actual, unidad_medida, estado, umbral_amarillo, umbral_rojo) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {COLUMNS}"
        ))
        .bind(kpi.proyecto_id)
        .bind(&kpi.name)
        .bind(&kpi.description)
        .bind(kpi.kind.as_str())
        .bind(kpi.target)
        .bind(kpi.current)
        .bind(&kpi.unit)
        .bind(kpi.status().as_str())
        .bind(kpi.yellow_threshold)
        .bind(kpi.red_threshold)
        .fetch_one(self.pool)
        .await
        .map_err(|e| reference_error(e, "Proyecto no encontrado"))?;
        row_to_kpi(&row)
    }

    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the row is gone.
    pub async fn update(&self, kpi: &Kpi) -> StorageResult<Kpi> {
        let row = query(&format!(
            "UPDATE kpis SET nombre = $2, descripcion = $3, tipo = $4, valor_objetivo = $5, \
                valor_actual = $6, unidad_medida = $7, estado = $8, umbral_amarillo = $9, \
                umbral_rojo = $10, fecha_actualizacion = NOW() \
             WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(kpi.id)
        .bind(&kpi.name)
        .bind(&kpi.description)
        .bind(kpi.kind.as_str())
        .bind(kpi.target)
        .bind(kpi.current)
        .bind(&kpi.unit)
        .bind(kpi.status.as_str())
        .bind(kpi.yellow_threshold)
        .bind(kpi.red_threshold)
        .fetch_optional(self.pool)
        .await?;
        row.as_ref()
            .map(row_to_kpi)
            .transpose()?
            .ok_or_else(|| StorageError::not_found("KPI no encontrado"))
    }

    /// Soft delete. Returns `false` when no row matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn deactivate(&self, id: i64) -> StorageResult<bool> {
        let result =
            query("UPDATE kpis SET activo = FALSE, fecha_actualizacion = NOW() WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
