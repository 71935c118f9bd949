//! Error responses for the authentication extractors.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use avanzando_api::ApiError;

use crate::error::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::InvalidToken { reason } = &self {
            tracing::debug!(reason = %reason, "rejected bearer token");
        }
        let description = self.to_string();
        let mut response = ApiError::from(self).into_response();

        if response.status() == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(&description);
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}

/// `Bearer realm="avanzando", error="invalid_token", error_description="..."`
///
/// Non-ASCII characters are not valid in header values, so the description
/// is reduced to ASCII.
fn build_www_authenticate_header(description: &str) -> String {
    let ascii: String = description
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            'ñ' => 'n',
            '"' => '\'',
            c if c.is_ascii() => c,
            _ => '?',
        })
        .collect();
    format!(
        "Bearer realm=\"avanzando\", error=\"invalid_token\", error_description=\"{ascii}\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn unauthorized_carries_challenge_and_json_body() {
        let response = AuthError::MissingToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(www_auth.starts_with("Bearer realm=\"avanzando\""));
        assert!(www_auth.contains("Token requerido"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Token requerido");
    }

    #[tokio::test]
    async fn forbidden_has_no_challenge() {
        let response = AuthError::forbidden(crate::middleware::PM_REQUIRED).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[test]
    fn challenge_is_ascii() {
        let header = build_www_authenticate_header("Token inválido");
        assert!(header.is_ascii());
        assert!(header.contains("Token invalido"));
    }
}
