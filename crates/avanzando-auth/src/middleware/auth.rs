//! Bearer token authentication extractor.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use avanzando_core::user::User;

use crate::error::AuthError;
use crate::jwt::{JwtError, JwtService};
use crate::storage::UserDirectory;

// =============================================================================
// Auth State
// =============================================================================

/// State required by [`BearerAuth`], exposed from the application state via
/// `FromRef`.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_service: Arc<JwtService>,
    pub users: Arc<dyn UserDirectory>,
}

impl AuthState {
    pub fn new(jwt_service: Arc<JwtService>, users: Arc<dyn UserDirectory>) -> Self {
        Self { jwt_service, users }
    }
}

// =============================================================================
// Bearer Auth Extractor
// =============================================================================

/// The authenticated, active user behind an `Authorization: Bearer` header.
///
/// Rejections:
/// - no header: "Token requerido"
/// - header without a token part: "Token malformado"
/// - expired token: "Token expirado"
/// - any other decoding failure: "Token inválido"
/// - user missing or inactive: "Usuario no encontrado"
#[derive(Debug, Clone)]
pub struct BearerAuth(pub User);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::MalformedToken)?;
        let token = bearer_token(header)?;

        let claims = auth_state.jwt_service.decode(token).map_err(|e| match e {
            JwtError::Expired => AuthError::TokenExpired,
            other => AuthError::invalid_token(other.to_string()),
        })?;

        let user = auth_state
            .users
            .find_by_id(claims.user_id)
            .await?
            .filter(|user| user.active)
            .ok_or_else(|| {
                tracing::debug!(user_id = claims.user_id, "token user missing or inactive");
                AuthError::UserNotFound
            })?;

        tracing::debug!(user_id = user.id, rol = %user.role, "token validated");
        Ok(BearerAuth(user))
    }
}

/// Second whitespace-separated part of the header, the way clients send
/// `Bearer <token>`.
fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let mut parts = header.split_whitespace();
    let _scheme = parts.next().ok_or(AuthError::MissingToken)?;
    parts.next().ok_or(AuthError::MalformedToken)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use axum::http::Request;
    use chrono::Utc;

    use avanzando_core::user::Role;

    use super::*;
    use crate::AuthResult;

    pub struct MemoryDirectory(pub HashMap<i64, User>);

    #[async_trait]
    impl UserDirectory for MemoryDirectory {
        async fn find_by_id(&self, user_id: i64) -> AuthResult<Option<User>> {
            Ok(self.0.get(&user_id).cloned())
        }
    }

    pub fn user(id: i64, role: Role, active: bool) -> User {
        let now = Utc::now();
        User {
            id,
            name: format!("Usuario {id}"),
            email: format!("u{id}@example.com"),
            password_hash: String::new(),
            role,
            cliente_id: None,
            active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(users: Vec<User>) -> AuthState {
        AuthState::new(
            Arc::new(JwtService::new("test-secret", 24)),
            Arc::new(MemoryDirectory(users.into_iter().map(|u| (u.id, u)).collect())),
        )
    }

    pub fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/profile");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use avanzando_core::user::Role;
    use axum::http::Request;

    async fn extract(state: &AuthState, header: Option<&str>) -> Result<User, AuthError> {
        let mut parts = parts(header);
        BearerAuth::from_request_parts(&mut parts, state)
            .await
            .map(|BearerAuth(user)| user)
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let ana = user(1, Role::ProjectManager, true);
        let state = state(vec![ana.clone()]);
        let token = state.jwt_service.issue(&ana).unwrap();

        let found = extract(&state, Some(&format!("Bearer {token}"))).await.unwrap();
        assert_eq!(found.id, 1);
    }

    #[tokio::test]
    async fn header_problems() {
        let state = state(vec![]);
        assert!(matches!(extract(&state, None).await, Err(AuthError::MissingToken)));
        assert!(matches!(
            extract(&state, Some("Bearer")).await,
            Err(AuthError::MalformedToken)
        ));
        assert!(matches!(
            extract(&state, Some("Bearer nope")).await,
            Err(AuthError::InvalidToken { .. })
        ));
    }

    #[tokio::test]
    async fn inactive_or_missing_user_is_rejected() {
        let gone = user(2, Role::Resource, true);
        let idle = user(3, Role::Resource, false);
        let state = state(vec![idle.clone()]);

        let token = state.jwt_service.issue(&gone).unwrap();
        assert!(matches!(
            extract(&state, Some(&format!("Bearer {token}"))).await,
            Err(AuthError::UserNotFound)
        ));

        let token = state.jwt_service.issue(&idle).unwrap();
        assert!(matches!(
            extract(&state, Some(&format!("Bearer {token}"))).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn routed_handlers_see_the_user_or_a_bearer_challenge() {
        use axum::Router;
        use axum::body::{Body, to_bytes};
        use axum::http::{StatusCode, header::WWW_AUTHENTICATE};
        use axum::routing::get;
        use tower::ServiceExt;

        let ana = user(1, Role::ProjectManager, true);
        let state = state(vec![ana.clone()]);
        let token = state.jwt_service.issue(&ana).unwrap();
        let app = Router::new()
            .route("/me", get(|BearerAuth(user): BearerAuth| async move { user.email }))
            .with_state(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"u1@example.com");

        let response = app
            .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(WWW_AUTHENTICATE));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Token requerido");
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc").unwrap(), "abc");
        assert!(matches!(bearer_token("Bearer"), Err(AuthError::MalformedToken)));
        assert!(matches!(bearer_token(""), Err(AuthError::MissingToken)));
    }
}
