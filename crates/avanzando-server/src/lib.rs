pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod server;

pub use config::{AppConfig, LoggingConfig, ServerConfig, StorageConfig};
pub use observability::init_tracing;
pub use server::{AppState, AvanzandoServer, ServerBuilder, ServerError, build_app};
