//! Document, upload and template handlers.

use avanzando_api::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse};
use avanzando_auth::{BearerAuth, PmAuth};
use avanzando_core::document::{
    DocumentChanges, DocumentKind, DocumentStatus, NewDocument, NewTemplate, render_template,
    stored_file_name, template_variables,
};
use avanzando_core::patch::nullable;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::require_project;
use crate::server::AppState;

const DOCUMENT_NOT_FOUND: &str = "Documento no encontrado";
const TEMPLATE_NOT_FOUND: &str = "Plantilla no encontrada";
const MISSING_FILE: &str = "No se encontró archivo";

/// Public URL prefix of stored uploads.
pub const UPLOADS_URL_PREFIX: &str = "/uploads/documentos";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/documentos", get(list_documents).post(create_document))
        .route("/api/documentos/upload", post(upload_document))
        .route(
            "/api/documentos/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/api/documentos/{id}/generar", post(generate_document))
        .route("/api/plantillas", get(list_templates).post(create_template))
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct DocumentQuery {
    pub proyecto_id: Option<i64>,
    pub tipo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KindQuery {
    pub tipo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub nombre: String,
    pub tipo: String,
    pub proyecto_id: i64,
    pub plantilla_id: Option<i64>,
    #[serde(default)]
    pub contenido: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDocumentRequest {
    pub nombre: Option<String>,
    pub estado: Option<String>,
    pub contenido: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub archivo_url: Option<Option<String>>,
}

impl UpdateDocumentRequest {
    fn into_changes(self) -> Result<DocumentChanges, ApiError> {
        Ok(DocumentChanges {
            name: self.nombre,
            status: self
                .estado
                .as_deref()
                .map(str::parse::<DocumentStatus>)
                .transpose()?,
            content: self.contenido,
            archivo_url: self.archivo_url,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub variables: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub nombre: String,
    pub tipo: String,
    pub contenido_plantilla: String,
    pub variables: Option<Value>,
}

impl CreateTemplateRequest {
    fn into_new(self) -> Result<NewTemplate, ApiError> {
        let kind = self.tipo.parse::<DocumentKind>()?;
        // Without an explicit list the placeholders found in the body are recorded
        let variables = self
            .variables
            .unwrap_or_else(|| json!(template_variables(&self.contenido_plantilla)));
        Ok(NewTemplate {
            name: self.nombre,
            kind,
            body: self.contenido_plantilla,
            variables,
        })
    }
}

// =============================================================================
// Documents
// =============================================================================

/// GET /api/documentos - Documents filtered by project and kind.
pub async fn list_documents(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DocumentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = query.tipo.as_deref().map(str::parse::<DocumentKind>).transpose()?;
    let documentos = state.storage.documents().list(query.proyecto_id, kind).await?;
    Ok(Json(json!({ "documentos": documentos })))
}

/// POST /api/documentos
pub async fn create_document(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = req.tipo.parse::<DocumentKind>()?;
    require_project(&state, req.proyecto_id).await?;

    let documents = state.storage.documents();
    if let Some(plantilla_id) = req.plantilla_id {
        documents
            .find_template(plantilla_id)
            .await?
            .ok_or_else(|| ApiError::not_found(TEMPLATE_NOT_FOUND))?;
    }

    let documento = documents
        .create(&NewDocument {
            name: req.nombre,
            kind,
            proyecto_id: req.proyecto_id,
            plantilla_id: req.plantilla_id,
            content: req.contenido,
            creado_por: user.id,
        })
        .await?;
    tracing::debug!(document_id = documento.id, "document created");

    Ok(ApiResponse::created(json!({
        "message": "Documento creado exitosamente",
        "documento": documento,
    })))
}

/// GET /api/documentos/{id}
pub async fn get_document(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let documento = state
        .storage
        .documents()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(DOCUMENT_NOT_FOUND))?;
    Ok(Json(json!({ "documento": documento })))
}

/// PUT /api/documentos/{id} - Partial update; new content bumps the version.
pub async fn update_document(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let changes = req.into_changes()?;
    let documents = state.storage.documents();
    let mut documento = documents
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(DOCUMENT_NOT_FOUND))?;
    changes.apply(&mut documento);
    let documento = documents.update(&documento).await?;
    Ok(Json(json!({
        "message": "Documento actualizado exitosamente",
        "documento": documento,
    })))
}

/// DELETE /api/documentos/{id}
pub async fn delete_document(
    _pm: PmAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.storage.documents().delete(id).await? {
        return Err(ApiError::not_found(DOCUMENT_NOT_FOUND));
    }
    Ok(Json(json!({ "message": "Documento eliminado exitosamente" })))
}

/// POST /api/documentos/upload - Store the multipart field `file` on disk.
pub async fn upload_document(
    BearerAuth(user): BearerAuth,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "upload without a multipart body");
        ApiError::bad_request(MISSING_FILE)
    })?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Formulario inválido: {}", e.body_text())))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Formulario inválido: {}", e.body_text())))?;
            upload = Some((file_name, data));
            break;
        }
    }

    let (file_name, data) = upload.ok_or_else(|| ApiError::bad_request(MISSING_FILE))?;
    if file_name.trim().is_empty() {
        return Err(ApiError::bad_request("No se seleccionó archivo"));
    }

    let stored = stored_file_name(&file_name);
    let dir = state.config.documents_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::internal(format!("cannot create {}: {e}", dir.display())))?;
    let path = dir.join(&stored);
    tokio::fs::write(&path, &data)
        .await
        .map_err(|e| ApiError::internal(format!("cannot write {}: {e}", path.display())))?;
    tracing::info!(user_id = user.id, bytes = data.len(), file = %stored, "document uploaded");

    Ok(Json(json!({
        "message": "Archivo subido exitosamente",
        "archivo_url": format!("{UPLOADS_URL_PREFIX}/{stored}"),
    })))
}

/// POST /api/documentos/{id}/generar - Render the document's template.
pub async fn generate_document(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<GenerateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let documents = state.storage.documents();
    let mut documento = documents
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(DOCUMENT_NOT_FOUND))?;

    let no_template = || ApiError::bad_request("Documento no tiene plantilla asociada");
    let plantilla_id = documento.plantilla_id.ok_or_else(no_template)?;
    let plantilla = documents
        .find_template(plantilla_id)
        .await?
        .ok_or_else(no_template)?;

    let content = render_template(&plantilla.body, &req.variables);
    DocumentChanges {
        content: Some(content),
        ..Default::default()
    }
    .apply(&mut documento);
    let documento = documents.update(&documento).await?;

    Ok(Json(json!({
        "message": "Documento generado exitosamente",
        "documento": documento,
    })))
}

// =============================================================================
// Templates
// =============================================================================

/// GET /api/plantillas - Active templates, optionally of one kind.
pub async fn list_templates(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<KindQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = query.tipo.as_deref().map(str::parse::<DocumentKind>).transpose()?;
    let plantillas = state.storage.documents().list_templates(kind).await?;
    Ok(Json(json!({ "plantillas": plantillas })))
}

/// POST /api/plantillas
pub async fn create_template(
    _pm: PmAuth,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateTemplateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let template = req.into_new()?;
    let plantilla = state.storage.documents().create_template(&template).await?;
    Ok(ApiResponse::created(json!({
        "message": "Plantilla creada exitosamente",
        "plantilla": plantilla,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_variables_default_to_placeholders() {
        let req: CreateTemplateRequest = serde_json::from_str(
            r#"{"nombre": "Acta", "tipo": "acta",
                "contenido_plantilla": "Reunión de {{proyecto}} el {{fecha}} en {{proyecto}}"}"#,
        )
        .unwrap();
        let template = req.into_new().unwrap();
        assert_eq!(template.kind, DocumentKind::Minutes);
        assert_eq!(template.variables, json!(["proyecto", "fecha"]));
    }

    #[test]
    fn explicit_template_variables_are_kept() {
        let req: CreateTemplateRequest = serde_json::from_str(
            r#"{"nombre": "Factura", "tipo": "factura", "contenido_plantilla": "{{total}}",
                "variables": {"total": "number"}}"#,
        )
        .unwrap();
        assert_eq!(req.into_new().unwrap().variables, json!({"total": "number"}));
    }

    #[test]
    fn generate_request_defaults_to_no_variables() {
        let req: GenerateRequest = serde_json::from_str("{}").unwrap();
        assert!(req.variables.is_empty());
    }

    #[test]
    fn update_request_rejects_unknown_status() {
        let req: UpdateDocumentRequest = serde_json::from_str(r#"{"estado": "archivado"}"#).unwrap();
        assert!(matches!(req.into_changes(), Err(ApiError::BadRequest(_))));
    }
}
