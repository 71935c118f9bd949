use avanzando_core::CoreError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Message returned to clients for unexpected failures. The real cause is only logged.
pub const INTERNAL_ERROR_MESSAGE: &str = "Error interno del servidor";

/// High-level API errors mapped to HTTP responses with a `{"error": ...}` body
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    /// A plan gate refused the request; the body tells the client which plan it is on.
    #[error("Upgrade required: {message}")]
    UpgradeRequired {
        message: String,
        current_plan: String,
    },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
    pub fn upgrade_required(msg: impl Into<String>, current_plan: impl Into<String>) -> Self {
        Self::UpgradeRequired {
            message: msg.into(),
            current_plan: current_plan.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) | ApiError::UpgradeRequired { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to API clients.
    pub fn public_message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
            ApiError::UpgradeRequired { message, .. } => message,
            ApiError::Internal(_) => INTERNAL_ERROR_MESSAGE,
        }
    }

    /// JSON body sent for this error.
    pub fn to_body(&self) -> serde_json::Value {
        match self {
            ApiError::UpgradeRequired {
                message,
                current_plan,
            } => json!({
                "error": message,
                "upgrade_required": true,
                "current_plan": current_plan,
            }),
            other => json!({ "error": other.public_message() }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let ApiError::Internal(cause) = &self {
            tracing::error!(error = %cause, "request failed with internal error");
        }

        let body = serde_json::to_vec(&self.to_body())
            .unwrap_or_else(|_| br#"{"error":"Serialization failure"}"#.to_vec());

        (
            status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(format!("JSON inválido: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(format!("Parámetro de ruta inválido: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(format!("Parámetro de consulta inválido: {}", rejection.body_text()))
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownVariant { .. } | CoreError::Validation(_) => {
                ApiError::bad_request(err.to_string())
            }
            CoreError::InvalidTransition { .. } => ApiError::conflict(err.to_string()),
            CoreError::Export(msg) => ApiError::internal(msg),
        }
    }
}

// -------------------------
// JSON body extractor
// -------------------------

/// `axum::Json` with rejections rendered as [`ApiError`] JSON bodies.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// `axum::extract::Path` with rejections rendered as [`ApiError`] JSON bodies.
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `axum::extract::Query` with rejections rendered as [`ApiError`] JSON bodies.
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

// -------------------------
// API Response Wrapper
// -------------------------

#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub value: T,
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl<T> ApiResponse<T> {
    pub fn new(value: T, status: StatusCode) -> Self {
        Self {
            value,
            status,
            headers: Vec::new(),
        }
    }

    pub fn ok(value: T) -> Self {
        Self::new(value, StatusCode::OK)
    }

    pub fn created(value: T) -> Self {
        Self::new(value, StatusCode::CREATED)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = match serde_json::to_vec(&self.value) {
            Ok(b) => b,
            Err(e) => return ApiError::internal(format!("serialization failure: {e}")).into_response(),
        };
        let mut response = (
            self.status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response();
        for (name, value) in self.headers {
            response.headers_mut().insert(name, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn into_response_sets_status_and_error_body() {
        let resp = ApiError::bad_request("Nombre y cliente_id son requeridos").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            &HeaderValue::from_static("application/json")
        );
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Nombre y cliente_id son requeridos");
    }

    #[tokio::test]
    async fn internal_errors_hide_the_cause() {
        let resp = ApiError::internal("connection reset by peer").into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"], INTERNAL_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn upgrade_required_carries_plan() {
        let resp = ApiError::upgrade_required("AI features require Pro or Enterprise subscription", "free")
            .into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert_eq!(body["upgrade_required"], true);
        assert_eq!(body["current_plan"], "free");
    }

    #[test]
    fn api_error_variants_map_to_status() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (ApiError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (
                ApiError::service_unavailable("x"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ApiError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases.into_iter() {
            assert_eq!(err.status_code(), status);
        }
    }

    #[test]
    fn core_errors_map_to_client_statuses() {
        let err: ApiError = CoreError::unknown_variant("estado", "dormido").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Valor inválido para estado: 'dormido'");

        let err: ApiError = CoreError::invalid_transition("borrador", "pagada").into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err: ApiError = CoreError::Export("csv".into()).into();
        assert_eq!(err.public_message(), INTERNAL_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn path_and_query_rejections_are_json() {
        use axum::{Router, body::Body, http::Request, routing::get};
        use tower::ServiceExt;

        #[derive(serde::Deserialize)]
        struct Filter {
            #[allow(dead_code)]
            proyecto_id: Option<i64>,
        }

        let app = Router::new()
            .route("/items/{id}", get(|ApiPath(id): ApiPath<i64>| async move { id.to_string() }))
            .route(
                "/items",
                get(|ApiQuery(_): ApiQuery<Filter>| async { "ok" }),
            );

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/items/abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("Parámetro de ruta inválido"));

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/items?proyecto_id=x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_response_created_and_headers() {
        let resp = ApiResponse::created(json!({"message": "ok"}))
            .with_header(header::LOCATION, HeaderValue::from_static("/api/projects/1"))
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            &HeaderValue::from_static("/api/projects/1")
        );
    }
}
