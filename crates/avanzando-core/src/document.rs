//! Project documents, templates and placeholder rendering.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

string_enum! {
    pub enum DocumentKind: "tipo" {
        Contract => "contrato",
        Proposal => "propuesta",
        Report => "informe",
        Minutes => "acta",
        Invoice => "factura",
        Other => "otro",
    }
}

string_enum! {
    pub enum DocumentStatus: "estado" {
        Draft => "borrador",
        Review => "revision",
        Approved => "aprobado",
        Signed => "firmado",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "tipo")]
    pub kind: DocumentKind,
    #[serde(rename = "estado")]
    pub status: DocumentStatus,
    pub proyecto_id: i64,
    pub plantilla_id: Option<i64>,
    #[serde(rename = "contenido")]
    pub content: String,
    pub archivo_url: Option<String>,
    pub version: i32,
    pub creado_por: i64,
    #[serde(rename = "fecha_creacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fecha_actualizacion")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub kind: DocumentKind,
    pub proyecto_id: i64,
    pub plantilla_id: Option<i64>,
    pub content: String,
    pub creado_por: i64,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentChanges {
    pub name: Option<String>,
    pub status: Option<DocumentStatus>,
    pub content: Option<String>,
    pub archivo_url: Option<Option<String>>,
}

impl DocumentChanges {
    /// Applies the changes; new content bumps the version.
    pub fn apply(self, document: &mut Document) {
        if let Some(name) = self.name {
            document.name = name;
        }
        if let Some(status) = self.status {
            document.status = status;
        }
        if let Some(content) = self.content
            && content != document.content
        {
            document.content = content;
            document.version += 1;
        }
        if let Some(url) = self.archivo_url {
            document.archivo_url = url;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "tipo")]
    pub kind: DocumentKind,
    #[serde(rename = "contenido_plantilla")]
    pub body: String,
    pub variables: Value,
    #[serde(rename = "activa")]
    pub active: bool,
    #[serde(rename = "fecha_creacion")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub kind: DocumentKind,
    pub body: String,
    pub variables: Value,
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("Invalid placeholder regex")
});

/// Replaces every `{{name}}` placeholder (inner whitespace allowed) with the
/// variable's string form.
///
/// Strings are inserted without quotes; other JSON values use their JSON
/// text. Placeholders without a matching variable are left in place.
#[must_use]
pub fn render_template(body: &str, variables: &serde_json::Map<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(body, |caps: &regex::Captures<'_>| match variables.get(&caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Distinct placeholder names in order of first appearance.
#[must_use]
pub fn template_variables(body: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for capture in PLACEHOLDER.captures_iter(body) {
        let name = &capture[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Reduces an uploaded file name to a safe ASCII basename.
///
/// Path separators and whitespace become `_`, characters outside
/// `[A-Za-z0-9._-]` are dropped and leading or trailing dots and
/// underscores are trimmed. An empty result becomes `archivo`.
#[must_use]
pub fn sanitize_filename(original: &str) -> String {
    let spaced: String = original
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "archivo".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `{uuid}_{sanitized name}`, unique per upload.
#[must_use]
pub fn stored_file_name(original: &str) -> String {
    format!("{}_{}", uuid::Uuid::new_v4(), sanitize_filename(original))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn renders_all_occurrences() {
        let body = "Contrato con {{cliente}} por {{monto}} USD. Firma: {{cliente}}. {{pendiente}}";
        let out = render_template(body, &vars(json!({"cliente": "Acme", "monto": 1500})));
        assert_eq!(out, "Contrato con Acme por 1500 USD. Firma: Acme. {{pendiente}}");
    }

    #[test]
    fn renders_placeholders_with_inner_whitespace() {
        let body = "Hola {{ nombre }}, proyecto {{proyecto }} {{ otro }}";
        assert_eq!(template_variables(body), ["nombre", "proyecto", "otro"]);
        let out = render_template(body, &vars(json!({"nombre": "Ana", "proyecto": 7})));
        assert_eq!(out, "Hola Ana, proyecto 7 {{ otro }}");
    }

    #[test]
    fn lists_template_variables_once() {
        let names = template_variables("{{a}} {{ b }} {{a}} {{c_1}}");
        assert_eq!(names, ["a", "b", "c_1"]);
        assert!(template_variables("sin variables").is_empty());
    }

    #[test]
    fn sanitizes_like_a_secure_filename() {
        assert_eq!(sanitize_filename("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(sanitize_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("informe final (v2).pdf"), "informe_final_v2.pdf");
        assert_eq!(sanitize_filename(".env"), "env");
        assert_eq!(sanitize_filename("ñ"), "archivo");
    }

    #[test]
    fn stored_name_is_prefixed_with_uuid() {
        let name = stored_file_name("acta 1.docx");
        let (prefix, rest) = name.split_once('_').unwrap();
        assert!(uuid::Uuid::parse_str(prefix).is_ok());
        assert_eq!(rest, "acta_1.docx");
    }

    #[test]
    fn content_change_bumps_version() {
        let now = Utc::now();
        let mut doc = Document {
            id: 1,
            name: "Acta".into(),
            kind: DocumentKind::Minutes,
            status: DocumentStatus::Draft,
            proyecto_id: 1,
            plantilla_id: None,
            content: "v1".into(),
            archivo_url: None,
            version: 1,
            creado_por: 1,
            created_at: now,
            updated_at: now,
        };
        DocumentChanges {
            content: Some("v1".into()),
            ..Default::default()
        }
        .apply(&mut doc);
        assert_eq!(doc.version, 1);

        DocumentChanges {
            content: Some("v2".into()),
            status: Some(DocumentStatus::Review),
            ..Default::default()
        }
        .apply(&mut doc);
        assert_eq!(doc.version, 2);
        assert_eq!(doc.status, DocumentStatus::Review);
    }
}
