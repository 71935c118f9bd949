//! Document and template storage.

use avanzando_core::document::{Document, DocumentKind, NewDocument, NewTemplate, Template};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::PgRow;

use crate::rows::text_enum;
use crate::{PgPool, StorageError, StorageResult, reference_error};

const DOCUMENT_COLUMNS: &str = "id, nombre, tipo, estado, proyecto_id, plantilla_id, contenido, \
    archivo_url, version, creado_por, fecha_creacion, fecha_actualizacion";

const TEMPLATE_COLUMNS: &str =
    "id, nombre, tipo, contenido_plantilla, variables, activa, fecha_creacion";

fn row_to_document(row: &PgRow) -> StorageResult<Document> {
    Ok(Document {
        id: row.try_get("id")?,
        name: row.try_get("nombre")?,
        kind: text_enum(row, "tipo")?,
        status: text_enum(row, "estado")?,
        proyecto_id: row.try_get("proyecto_id")?,
        plantilla_id: row.try_get("plantilla_id")?,
        content: row.try_get("contenido")?,
        archivo_url: row.try_get("archivo_url")?,
        version: row.try_get("version")?,
        creado_por: row.try_get("creado_por")?,
        created_at: row.try_get("fecha_creacion")?,
        updated_at: row.try_get("fecha_actualizacion")?,
    })
}

fn row_to_template(row: &PgRow) -> StorageResult<Template> {
    Ok(Template {
        id: row.try_get("id")?,
        name: row.try_get("nombre")?,
        kind: text_enum(row, "tipo")?,
        body: row.try_get("contenido_plantilla")?,
        variables: row.try_get("variables")?,
        active: row.try_get("activa")?,
        created_at: row.try_get("fecha_creacion")?,
    })
}

pub struct DocumentStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> DocumentStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Documents, newest first, optionally filtered by project and kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(
        &self,
        proyecto_id: Option<i64>,
        kind: Option<DocumentKind>,
    ) -> StorageResult<Vec<Document>> {
        let rows = query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documentos \
             WHERE ($1::BIGINT IS NULL OR proyecto_id = $1) AND ($2::TEXT IS NULL OR tipo = $2) \
             ORDER BY fecha_creacion DESC, id DESC"
        ))
        .bind(proyecto_id)
        .bind(kind.map(|kind| kind.as_str()))
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_document).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<Document>> {
        let row = query(&format!("SELECT {DOCUMENT_COLUMNS} FROM documentos WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(row_to_document).transpose()
    }

    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] if the project or template does not exist.
    pub async fn create(&self, document: &NewDocument) -> StorageResult<Document> {
        let row = query(&format!(
            "INSERT INTO documentos (nombre, tipo, proyecto_id, plantilla_id, contenido, creado_por) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(&document.name)
        .bind(document.kind.as_str())
        .bind(document.proyecto_id)
        .bind(document.plantilla_id)
        .bind(&document.content)
        .bind(document.creado_por)
        .fetch_one(self.pool)
        .await
        .map_err(|e| reference_error(e, "Proyecto o plantilla inexistente"))?;
        row_to_document(&row)
    }

    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the row is gone.
    pub async fn update(&self, document: &Document) -> StorageResult<Document> {
        let row = query(&format!(
            "UPDATE documentos SET nombre = $2, estado = $3, contenido = $4, archivo_url = $5, \
                version = $6, fecha_actualizacion = NOW() \
             WHERE id = $1 RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(document.id)
        .bind(&document.name)
        .bind(document.status.as_str())
        .bind(&document.content)
        .bind(&document.archivo_url)
        .bind(document.version)
        .fetch_optional(self.pool)
        .await?;
        row.as_ref()
            .map(row_to_document)
            .transpose()?
            .ok_or_else(|| StorageError::not_found("Documento no encontrado"))
    }

    /// Hard delete. Returns `false` when no row matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete(&self, id: i64) -> StorageResult<bool> {
        let result = query("DELETE FROM documentos WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Templates
    // -------------------------------------------------------------------------

    /// Active templates, optionally of one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_templates(&self, kind: Option<DocumentKind>) -> StorageResult<Vec<Template>> {
        let rows = query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM plantillas_documento \
             WHERE activa AND ($1::TEXT IS NULL OR tipo = $1) ORDER BY nombre, id"
        ))
        .bind(kind.map(|kind| kind.as_str()))
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_template).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_template(&self, id: i64) -> StorageResult<Option<Template>> {
        let row = query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM plantillas_documento WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.as_ref().map(row_to_template).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_template(&self, template: &NewTemplate) -> StorageResult<Template> {
        let row = query(&format!(
            "INSERT INTO plantillas_documento (nombre, tipo, contenido_plantilla, variables) \
             VALUES ($1, $2, $3, $4) RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(&template.name)
        .bind(template.kind.as_str())
        .bind(&template.body)
        .bind(&template.variables)
        .fetch_one(self.pool)
        .await?;
        row_to_template(&row)
    }
}
