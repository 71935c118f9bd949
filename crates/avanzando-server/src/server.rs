use std::net::SocketAddr;
use std::sync::Arc;

use avanzando_auth::{AuthState, JwtService};
use avanzando_db_postgres::{AvanzandoStorage, PostgresError};
use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    middleware,
    routing::get,
};
use thiserror::Error;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::AppConfig,
    handlers,
    middleware::{self as app_middleware, RequestId},
    routes,
};

// =============================================================================
// Application State
// =============================================================================

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: AvanzandoStorage,
    pub auth: AuthState,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wires token validation to the storage's user table.
    #[must_use]
    pub fn new(storage: AvanzandoStorage, config: Arc<AppConfig>) -> Self {
        let jwt = Arc::new(JwtService::new(
            &config.auth.jwt_secret,
            config.auth.token_ttl_hours,
        ));
        let auth = AuthState::new(jwt, Arc::new(storage.user_directory()));
        Self {
            storage,
            auth,
            config,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.auth.jwt_service
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

// =============================================================================
// Router
// =============================================================================

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .merge(routes::api_router())
        .with_state(state)
        // Layers run bottom-up: the request id exists before the span is made
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<RequestId>()
                        .map(|id| id.as_str().to_string())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
}

// =============================================================================
// Server
// =============================================================================

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("storage initialization failed: {0}")]
    Storage(#[from] PostgresError),
    #[error("uploads directory unavailable: {0}")]
    Uploads(std::io::Error),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct AvanzandoServer {
    addr: SocketAddr,
    app: Router,
}

impl AvanzandoServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn run(self) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "Avanzando server listening");
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("server stopped");
        Ok(())
    }
}

#[derive(Default)]
pub struct ServerBuilder {
    addr: Option<SocketAddr>,
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Connects to PostgreSQL, runs pending migrations and prepares the
    /// upload directory.
    pub async fn build(self) -> Result<AvanzandoServer, ServerError> {
        let addr = self.addr.unwrap_or_else(|| self.config.addr());

        let storage = AvanzandoStorage::from_config(&self.config.storage.postgres).await?;
        tracing::info!("PostgreSQL storage ready");

        let documents_dir = self.config.documents_dir();
        tokio::fs::create_dir_all(&documents_dir)
            .await
            .map_err(ServerError::Uploads)?;
        tracing::debug!(path = %documents_dir.display(), "uploads directory ready");

        let state = AppState::new(storage, Arc::new(self.config));
        Ok(AvanzandoServer {
            addr,
            app: build_app(state),
        })
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
