use std::net::SocketAddr;
use std::path::PathBuf;

use avanzando_auth::AuthConfig;
use avanzando_db_postgres::PostgresConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Token signing and default account settings
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Storage validation
        let pg = &self.storage.postgres;
        if pg.pool_size == 0 {
            return Err("storage.postgres.pool_size must be > 0".into());
        }
        if !pg.is_configured() {
            return Err(
                "storage.postgres requires either 'url' or 'host' and 'database' to be set".into(),
            );
        }
        // Auth validation
        self.auth
            .validate()
            .map_err(|e| format!("auth config error: {e}"))?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    /// Directory receiving uploaded document files.
    pub fn documents_dir(&self) -> PathBuf {
        self.server.uploads_dir.join("documentos")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted request body, uploads included.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_body_limit() -> usize {
    16 * 1024 * 1024
}
fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            uploads_dir: default_uploads_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "avanzando.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., AVANZANDO__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("AVANZANDO")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 5000);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.addr().to_string(), "0.0.0.0:5000");
        assert_eq!(cfg.documents_dir(), PathBuf::from("uploads/documentos"));
    }

    #[test]
    fn rejects_invalid_sections() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        assert!(cfg.validate().unwrap_err().contains("server.port"));

        let mut cfg = AppConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().unwrap_err().contains("logging.level"));

        let mut cfg = AppConfig::default();
        cfg.storage.postgres.pool_size = 0;
        assert!(cfg.validate().unwrap_err().contains("pool_size"));

        let mut cfg = AppConfig::default();
        cfg.storage.postgres.host = None;
        assert!(cfg.validate().unwrap_err().contains("storage.postgres"));

        let mut cfg = AppConfig::default();
        cfg.auth.jwt_secret = String::new();
        assert!(cfg.validate().unwrap_err().contains("auth config error"));
    }

    #[test]
    fn unparsable_host_falls_back_to_any() {
        let mut cfg = AppConfig::default();
        cfg.server.host = "localhost".into();
        cfg.server.port = 8080;
        assert_eq!(cfg.addr().to_string(), "0.0.0.0:8080");
    }
}
