//! Project resource storage.

use avanzando_core::resource::{NewResource, Resource, ResourceKind};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::PgRow;

use crate::rows::text_enum;
use crate::{PgPool, StorageError, StorageResult, reference_error};

const COLUMNS: &str = "r.id, r.proyecto_id, r.nombre, r.descripcion, r.tipo, r.estado, \
    r.cantidad_requerida, r.cantidad_asignada, r.unidad_medida, r.costo_unitario, r.costo_total, \
    r.fecha_inicio, r.fecha_fin, r.usuario_asignado_id, u.nombre AS usuario_asignado_nombre, \
    r.observaciones, r.activo, r.fecha_creacion, r.fecha_actualizacion";

const FROM: &str = "recursos r LEFT JOIN users u ON u.id = r.usuario_asignado_id";

/// Optional list filters; `None` matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    pub proyecto_id: Option<i64>,
    pub kind: Option<ResourceKind>,
}

fn row_to_resource(row: &PgRow) -> StorageResult<Resource> {
    Ok(Resource {
        id: row.try_get("id")?,
        proyecto_id: row.try_get("proyecto_id")?,
        name: row.try_get("nombre")?,
        description: row.try_get("descripcion")?,
        kind: text_enum(row, "tipo")?,
        status: text_enum(row, "estado")?,
        required: row.try_get("cantidad_requerida")?,
        assigned: row.try_get("cantidad_asignada")?,
        unit: row.try_get("unidad_medida")?,
        unit_cost: row.try_get("costo_unitario")?,
        total_cost: row.try_get("costo_total")?,
        start: row.try_get("fecha_inicio")?,
        end: row.try_get("fecha_fin")?,
        usuario_asignado_id: row.try_get("usuario_asignado_id")?,
        usuario_asignado_nombre: row.try_get("usuario_asignado_nombre")?,
        notes: row.try_get("observaciones")?,
        active: row.try_get("activo")?,
        created_at: row.try_get("fecha_creacion")?,
        updated_at: row.try_get("fecha_actualizacion")?,
    })
}

pub struct ResourceStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ResourceStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active resources matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self, filter: ResourceFilter) -> StorageResult<Vec<Resource>> {
        let rows = query(&format!(
            "SELECT {COLUMNS} FROM {FROM} \
             WHERE r.activo \
               AND ($1::BIGINT IS NULL OR r.proyecto_id = $1) \
               AND ($2::TEXT IS NULL OR r.tipo = $2) \
             ORDER BY r.id"
        ))
        .bind(filter.proyecto_id)
        .bind(filter.kind.map(|kind| kind.as_str()))
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_resource).collect()
    }

    /// Active resources of several projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_for_projects(&self, project_ids: &[i64]) -> StorageResult<Vec<Resource>> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = query(&format!(
            "SELECT {COLUMNS} FROM {FROM} WHERE r.activo AND r.proyecto_id = ANY($1) ORDER BY r.id"
        ))
        .bind(project_ids)
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_resource).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<Resource>> {
        let row = query(&format!("SELECT {COLUMNS} FROM {FROM} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(row_to_resource).transpose()
    }

    /// Inserts with total cost and status derived from the quantities.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] if the project or assigned user
    /// does not exist.
    pub async fn create(&self, resource: &NewResource) -> StorageResult<Resource> {
        let row = query(&format!(
            "WITH r AS ( \
                INSERT INTO recursos (proyecto_id, nombre, descripcion, tipo, estado, \
                    cantidad_requerida, cantidad_asignada, unidad_medida, costo_unitario, \
                    costo_total, fecha_inicio, fecha_fin, usuario_asignado_id, observaciones) \
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING * \
             ) \
             SELECT {COLUMNS} FROM r LEFT JOIN users u ON u.id = r.usuario_asignado_id"
        ))
        .bind(resource.proyecto_id)
        .bind(&resource.name)
        .bind(&resource.description)
        .bind(resource.kind.as_str())
        .bind(resource.status().as_str())
        .bind(resource.required)
        .bind(resource.assigned)
        .bind(&resource.unit)
        .bind(resource.unit_cost)
        .bind(resource.total_cost())
        .bind(resource.start)
        .bind(resource.end)
        .bind(resource.usuario_asignado_id)
        .bind(&resource.notes)
        .fetch_one(self.pool)
        .await
        .map_err(|e| reference_error(e, "Proyecto o usuario asignado inexistente"))?;
        row_to_resource(&row)
    }

    /// Writes every editable column, including the derived ones.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the row is gone.
    pub async fn update(&self, resource: &Resource) -> StorageResult<Resource> {
        let row = query(&format!(
            "WITH r AS ( \
                UPDATE recursos SET nombre = $2, descripcion = $3, tipo = $4, estado = $5, \
                    cantidad_requerida = $6, cantidad_asignada = $7, unidad_medida = $8, \
                    costo_unitario = $9, costo_total = $10, fecha_inicio = $11, fecha_fin = $12, \
                    usuario_asignado_id = $13, observaciones = $14, fecha_actualizacion = NOW() \
                WHERE id = $1 RETURNING * \
             ) \
             SELECT {COLUMNS} FROM r LEFT JOIN users u ON u.id = r.usuario_asignado_id"
        ))
        .bind(resource.id)
        .bind(&resource.name)
        .bind(&resource.description)
        .bind(resource.kind.as_str())
        .bind(resource.status.as_str())
        .bind(resource.required)
        .bind(resource.assigned)
        .bind(&resource.unit)
        .bind(resource.unit_cost)
        .bind(resource.total_cost)
        .bind(resource.start)
        .bind(resource.end)
        .bind(resource.usuario_asignado_id)
        .bind(&resource.notes)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| reference_error(e, "Usuario asignado inexistente"))?;
        row.as_ref()
            .map(row_to_resource)
            .transpose()?
            .ok_or_else(|| StorageError::not_found("Recurso no encontrado"))
    }

    /// Soft delete. Returns `false` when no row matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn deactivate(&self, id: i64) -> StorageResult<bool> {
        let result =
            query("UPDATE recursos SET activo = FALSE, fecha_actualizacion = NOW() WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
