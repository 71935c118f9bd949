//! Risk register storage.

use avanzando_core::risk::{NewRisk, Risk};
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::row::Row;
use sqlx_postgres::PgRow;

use crate::rows::{level, text_enum};
use crate::{PgPool, StorageError, StorageResult, constraint_error, reference_error};

const COLUMNS: &str = "r.id, r.proyecto_id, r.codigo, r.nombre, r.descripcion, r.tipo, \
    r.probabilidad, r.impacto, r.estado, r.plan_mitigacion, r.plan_contingencia, \
    r.responsable_id, u.nombre AS responsable_nombre, r.fecha_identificacion, \
    r.fecha_revision, r.fecha_cierre, r.costo_estimado, r.activo";

const FROM: &str = "riesgos r LEFT JOIN users u ON u.id = r.responsable_id";

fn row_to_risk(row: &PgRow) -> StorageResult<Risk> {
    Ok(Risk {
        id: row.try_get("id")?,
        proyecto_id: row.try_get("proyecto_id")?,
        code: row.try_get("codigo")?,
        name: row.try_get("nombre")?,
        description: row.try_get("descripcion")?,
        kind: text_enum(row, "tipo")?,
        probability: level(row, "probabilidad")?,
        impact: level(row, "impacto")?,
        status: text_enum(row, "estado")?,
        mitigation_plan: row.try_get("plan_mitigacion")?,
        contingency_plan: row.try_get("plan_contingencia")?,
        responsable_id: row.try_get("responsable_id")?,
        responsable_nombre: row.try_get("responsable_nombre")?,
        identified_at: row.try_get("fecha_identificacion")?,
        reviewed_at: row.try_get("fecha_revision")?,
        closed_at: row.try_get("fecha_cierre")?,
        estimated_cost: row.try_get("costo_estimado")?,
        active: row.try_get("activo")?,
    })
}

pub struct RiskStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> RiskStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active risks, optionally limited to one project.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self, proyecto_id: Option<i64>) -> StorageResult<Vec<Risk>> {
        let rows = query(&format!(
            "SELECT {COLUMNS} FROM {FROM} \
             WHERE r.activo AND ($1::BIGINT IS NULL OR r.proyecto_id = $1) ORDER BY r.id"
        ))
        .bind(proyecto_id)
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_risk).collect()
    }

    /// Active risks of several projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_for_projects(&self, project_ids: &[i64]) -> StorageResult<Vec<Risk>> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = query(&format!(
            "SELECT {COLUMNS} FROM {FROM} WHERE r.activo AND r.proyecto_id = ANY($1) ORDER BY r.id"
        ))
        .bind(project_ids)
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_risk).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<Risk>> {
        let row = query(&format!("SELECT {COLUMNS} FROM {FROM} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(row_to_risk).transpose()
    }

    /// Every risk ever registered in the project, deactivated ones included,
    /// so generated codes are never reused.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_for_project(&self, proyecto_id: i64) -> StorageResult<i64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM riesgos WHERE proyecto_id = $1")
            .bind(proyecto_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] if the code is already used in the
    /// project and [`StorageError::InvalidInput`] if the project or the
    /// responsible user does not exist.
    pub async fn create(&self, risk: &NewRisk) -> StorageResult<Risk> {
        let row = query(&format!(
            "WITH r AS ( \
                INSERT INTO riesgos (proyecto_id, codigo, nombre, descripcion, tipo, probabilidad, \
                    impacto, plan_mitigacion, plan_contingencia, responsable_id, costo_estimado) \
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING * \
             ) \
             SELECT {COLUMNS} FROM r LEFT JOIN users u ON u.id = r.responsable_id"
        ))
        .bind(risk.proyecto_id)
        .bind(&risk.code)
        .bind(&risk.name)
        .bind(&risk.description)
        .bind(risk.kind.as_str())
        .bind(risk.probability.value())
        .bind(risk.impact.value())
        .bind(&risk.mitigation_plan)
        .bind(&risk.contingency_plan)
        .bind(risk.responsable_id)
        .bind(risk.estimated_cost)
        .fetch_one(self.pool)
        .await
        .map_err(|e| constraint_error(e, "El código de riesgo ya existe en el proyecto"))?;
        row_to_risk(&row)
    }

    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the row is gone.
    pub async fn update(&self, risk: &Risk) -> StorageResult<Risk> {
        let row = query(&format!(
            "WITH r AS ( \
                UPDATE riesgos SET nombre = $2, descripcion = $3, tipo = $4, probabilidad = $5, \
                    impacto = $6, estado = $7, plan_mitigacion = $8, plan_contingencia = $9, \
                    responsable_id = $10, fecha_revision = $11, fecha_cierre = $12, \
                    costo_estimado = $13 \
                WHERE id = $1 RETURNING * \
             ) \
             SELECT {COLUMNS} FROM r LEFT JOIN users u ON u.id = r.responsable_id"
        ))
        .bind(risk.id)
        .bind(&risk.name)
        .bind(&risk.description)
        .bind(risk.kind.as_str())
        .bind(risk.probability.value())
        .bind(risk.impact.value())
        .bind(risk.status.as_str())
        .bind(&risk.mitigation_plan)
        .bind(&risk.contingency_plan)
        .bind(risk.responsable_id)
        .bind(risk.reviewed_at)
        .bind(risk.closed_at)
        .bind(risk.estimated_cost)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| reference_error(e, "Responsable inexistente"))?;
        row.as_ref()
            .map(row_to_risk)
            .transpose()?
            .ok_or_else(|| StorageError::not_found("Riesgo no encontrado"))
    }

    /// Soft delete. Returns `false` when no row matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn deactivate(&self, id: i64) -> StorageResult<bool> {
        let result = query("UPDATE riesgos SET activo = FALSE WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
