//! Project and phase storage.

use avanzando_core::project::{
    DEFAULT_PHASES, NewProject, Phase, PhaseAdvance, Project, ProjectDetail,
};
use avanzando_core::subscription::{Feature, LimitCheck};
use chrono::{DateTime, Utc};
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::row::Row;
use sqlx_postgres::{PgConnection, PgRow};
use tracing::debug;

use crate::rows::text_enum;
use crate::subscriptions;
use crate::{PgPool, StorageError, StorageResult, reference_error};

const PROJECT_COLUMNS: &str = "p.id, p.nombre, p.descripcion, p.cliente_id, \
    c.nombre AS cliente_nombre, p.pm_id, p.estado, p.fecha_inicio, p.fecha_fin, \
    p.presupuesto_estimado, p.presupuesto_real, p.fecha_creacion, p.fecha_actualizacion";

const PHASE_COLUMNS: &str = "id, proyecto_id, tipo, nombre, descripcion, avance, fecha_inicio, \
    fecha_fin, completada, fecha_creacion, fecha_actualizacion";

/// Which projects a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectScope {
    All,
    /// Projects owned by one client organisation.
    Client(i64),
    /// Projects whose `pm_id` is this user.
    ManagedBy(i64),
}

fn row_to_project(row: &PgRow) -> StorageResult<Project> {
    Ok(Project {
        id: row.try_get("id")?,
        name: row.try_get("nombre")?,
        description: row.try_get("descripcion")?,
        cliente_id: row.try_get("cliente_id")?,
        cliente_nombre: row.try_get("cliente_nombre")?,
        pm_id: row.try_get("pm_id")?,
        status: text_enum(row, "estado")?,
        start_date: row.try_get("fecha_inicio")?,
        end_date: row.try_get("fecha_fin")?,
        estimated_budget: row.try_get("presupuesto_estimado")?,
        actual_budget: row.try_get("presupuesto_real")?,
        created_at: row.try_get("fecha_creacion")?,
        updated_at: row.try_get("fecha_actualizacion")?,
    })
}

fn row_to_phase(row: &PgRow) -> StorageResult<Phase> {
    Ok(Phase {
        id: row.try_get("id")?,
        proyecto_id: row.try_get("proyecto_id")?,
        kind: text_enum(row, "tipo")?,
        name: row.try_get("nombre")?,
        description: row.try_get("descripcion")?,
        advance: row.try_get("avance")?,
        start_date: row.try_get("fecha_inicio")?,
        end_date: row.try_get("fecha_fin")?,
        completed: row.try_get("completada")?,
        created_at: row.try_get("fecha_creacion")?,
        updated_at: row.try_get("fecha_actualizacion")?,
    })
}

/// Outcome of [`ProjectStorage::create_within_quota`].
#[derive(Debug)]
pub enum QuotaOutcome {
    Created(ProjectDetail),
    /// The plan limit was reached; nothing was written.
    Refused(LimitCheck),
}

async fn insert_with_phases(
    conn: &mut PgConnection,
    project: &NewProject,
) -> StorageResult<ProjectDetail> {
    let row = query(&format!(
        "WITH p AS ( \
            INSERT INTO proyectos (nombre, descripcion, cliente_id, pm_id, fecha_inicio, \
                                   fecha_fin, presupuesto_estimado) \
            VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING * \
         ) \
         SELECT {PROJECT_COLUMNS} FROM p LEFT JOIN clientes c ON c.id = p.cliente_id"
    ))
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.cliente_id)
    .bind(project.pm_id)
    .bind(project.start_date)
    .bind(project.end_date)
    .bind(project.estimated_budget)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| reference_error(e, "Cliente o responsable inexistente"))?;
    let created = row_to_project(&row)?;

    let mut phases = Vec::with_capacity(DEFAULT_PHASES.len());
    for kind in DEFAULT_PHASES {
        let row = query(&format!(
            "INSERT INTO fases (proyecto_id, tipo, nombre) VALUES ($1, $2, $3) \
             RETURNING {PHASE_COLUMNS}"
        ))
        .bind(created.id)
        .bind(kind.as_str())
        .bind(kind.default_name())
        .fetch_one(&mut *conn)
        .await?;
        phases.push(row_to_phase(&row)?);
    }

    debug!(project_id = created.id, "Project created with default phases");
    Ok(ProjectDetail {
        project: created,
        phases,
    })
}

pub struct ProjectStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ProjectStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Projects visible in `scope`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self, scope: ProjectScope) -> StorageResult<Vec<Project>> {
        let base = format!(
            "SELECT {PROJECT_COLUMNS} FROM proyectos p LEFT JOIN clientes c ON c.id = p.cliente_id"
        );
        let rows = match scope {
            ProjectScope::All => {
                query(&format!("{base} ORDER BY p.fecha_creacion DESC, p.id DESC"))
                    .fetch_all(self.pool)
                    .await?
            }
            ProjectScope::Client(cliente_id) => {
                query(&format!(
                    "{base} WHERE p.cliente_id = $1 ORDER BY p.fecha_creacion DESC, p.id DESC"
                ))
                .bind(cliente_id)
                .fetch_all(self.pool)
                .await?
            }
            ProjectScope::ManagedBy(pm_id) => {
                query(&format!(
                    "{base} WHERE p.pm_id = $1 ORDER BY p.fecha_creacion DESC, p.id DESC"
                ))
                .bind(pm_id)
                .fetch_all(self.pool)
                .await?
            }
        };
        rows.iter().map(row_to_project).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<Project>> {
        let row = query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM proyectos p \
             LEFT JOIN clientes c ON c.id = p.cliente_id WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.as_ref().map(row_to_project).transpose()
    }

    /// Project with its phases, or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if either query fails.
    pub async fn detail(&self, id: i64) -> StorageResult<Option<ProjectDetail>> {
        let Some(project) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let phases = self.phases(id).await?;
        Ok(Some(ProjectDetail { project, phases }))
    }

    /// Inserts the project and its five default phases in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the client or manager does not
    /// exist, or any database error; nothing is written in that case.
    pub async fn create(&self, project: &NewProject) -> StorageResult<ProjectDetail> {
        let mut tx = self.pool.begin().await?;
        let detail = insert_with_phases(&mut tx, project).await?;
        tx.commit().await?;
        Ok(detail)
    }

    /// Creates a project managed by `pm_id` only if their plan still allows
    /// another one.
    ///
    /// The manager's subscription row stays locked from the count to the
    /// commit, so concurrent requests by the same manager are serialized.
    ///
    /// # Errors
    ///
    /// Same as [`ProjectStorage::create`].
    pub async fn create_within_quota(
        &self,
        project: &NewProject,
        pm_id: i64,
        now: DateTime<Utc>,
    ) -> StorageResult<QuotaOutcome> {
        let mut tx = self.pool.begin().await?;
        let subscription = subscriptions::lock_current(&mut tx, pm_id, now).await?;
        let count: i64 = query_scalar("SELECT COUNT(*) FROM proyectos WHERE pm_id = $1")
            .bind(pm_id)
            .fetch_one(&mut *tx)
            .await?;

        let check = subscription.check(Feature::CreateProject, count, now);
        if !check.allowed {
            tx.commit().await?;
            return Ok(QuotaOutcome::Refused(check));
        }

        let detail = insert_with_phases(&mut tx, project).await?;
        tx.commit().await?;
        Ok(QuotaOutcome::Created(detail))
    }

    /// Writes the editable columns of `project`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the row is gone.
    pub async fn update(&self, project: &Project) -> StorageResult<Project> {
        let row = query(&format!(
            "WITH p AS ( \
                UPDATE proyectos SET nombre = $2, descripcion = $3, estado = $4, fecha_fin = $5, \
                    presupuesto_estimado = $6, presupuesto_real = $7, fecha_actualizacion = NOW() \
                WHERE id = $1 RETURNING * \
             ) \
             SELECT {PROJECT_COLUMNS} FROM p LEFT JOIN clientes c ON c.id = p.cliente_id"
        ))
        .bind(project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.status.as_str())
        .bind(project.end_date)
        .bind(project.estimated_budget)
        .bind(project.actual_budget)
        .fetch_optional(self.pool)
        .await?;
        row.as_ref()
            .map(row_to_project)
            .transpose()?
            .ok_or_else(|| StorageError::not_found("Proyecto no encontrado"))
    }

    /// Deletes the project; child rows go with it through `ON DELETE CASCADE`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete(&self, id: i64) -> StorageResult<bool> {
        let result = query("DELETE FROM proyectos WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of projects managed by `pm_id`; the subscription quota counts these.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_managed_by(&self, pm_id: i64) -> StorageResult<i64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM proyectos WHERE pm_id = $1")
            .bind(pm_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Phases
    // -------------------------------------------------------------------------

    /// Phases of one project in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn phases(&self, project_id: i64) -> StorageResult<Vec<Phase>> {
        let rows = query(&format!(
            "SELECT {PHASE_COLUMNS} FROM fases WHERE proyecto_id = $1 ORDER BY id"
        ))
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_phase).collect()
    }

    /// Phases of several projects at once.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn phases_of(&self, project_ids: &[i64]) -> StorageResult<Vec<Phase>> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = query(&format!(
            "SELECT {PHASE_COLUMNS} FROM fases WHERE proyecto_id = ANY($1) ORDER BY proyecto_id, id"
        ))
        .bind(project_ids)
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_phase).collect()
    }

    /// A phase, only if it belongs to `project_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_phase(&self, project_id: i64, phase_id: i64) -> StorageResult<Option<Phase>> {
        let row = query(&format!(
            "SELECT {PHASE_COLUMNS} FROM fases WHERE id = $1 AND proyecto_id = $2"
        ))
        .bind(phase_id)
        .bind(project_id)
        .fetch_optional(self.pool)
        .await?;
        row.as_ref().map(row_to_phase).transpose()
    }

    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the phase is gone.
    pub async fn record_advance(&self, phase_id: i64, advance: PhaseAdvance) -> StorageResult<Phase> {
        let row = query(&format!(
            "UPDATE fases SET avance = $2, completada = $3, fecha_fin = $4, \
             fecha_actualizacion = NOW() WHERE id = $1 RETURNING {PHASE_COLUMNS}"
        ))
        .bind(phase_id)
        .bind(advance.advance)
        .bind(advance.completed)
        .bind(advance.end_date)
        .fetch_optional(self.pool)
        .await?;
        row.as_ref()
            .map(row_to_phase)
            .transpose()?
            .ok_or_else(|| StorageError::not_found("Fase no encontrada"))
    }
}
