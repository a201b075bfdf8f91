//! Application configuration.
//!
//! Layered configuration: built-in defaults, then an optional TOML file,
//! then `AGORA__`-prefixed environment variables (`AGORA__SERVER__BIND_ADDR`
//! and friends).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::ws::{HubConfig, SessionConfig};

pub const APP_NAME: &str = "agora";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,

    /// Origins allowed to make cross-origin requests. Empty means deny.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8081".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path. Defaults to `<data dir>/agora.db`.
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn resolve_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(default_data_dir()?.join("agora.db")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HS256 secret for validating JWTs from the auth service.
    /// A value of the form `env:VAR_NAME` is resolved from the
    /// environment at startup.
    pub jwt_secret: Option<String>,
}

impl AuthConfig {
    pub fn resolve_secret(&self) -> Result<String> {
        let raw = self
            .jwt_secret
            .as_deref()
            .ok_or_else(|| anyhow!("auth.jwt_secret is not configured"))?;

        if let Some(var) = raw.strip_prefix("env:") {
            return env::var(var)
                .with_context(|| format!("reading JWT secret from environment variable {var}"));
        }

        Ok(raw.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Seconds a message stays in the in-memory retention buffer.
    pub message_ttl_secs: u64,

    /// Seconds between retention-buffer cleanup passes.
    pub cleanup_interval_secs: u64,

    /// Seconds between database retention sweeps.
    pub retention_sweep_interval_secs: u64,

    /// Seconds a message stays in the database.
    pub db_retention_secs: u64,

    /// Per-session outbound queue capacity.
    pub session_queue_capacity: usize,

    /// Seconds between WebSocket pings.
    pub heartbeat_interval_secs: u64,

    /// Seconds of read inactivity before a connection is dropped.
    pub read_idle_timeout_secs: u64,

    /// Maximum message content length in bytes.
    pub max_message_bytes: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            message_ttl_secs: 20,
            cleanup_interval_secs: 5,
            retention_sweep_interval_secs: 60,
            db_retention_secs: 24 * 60 * 60,
            session_queue_capacity: 256,
            heartbeat_interval_secs: 54,
            read_idle_timeout_secs: 60,
            max_message_bytes: 512,
        }
    }
}

impl ChatConfig {
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            message_ttl: Duration::from_secs(self.message_ttl_secs),
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            queue_capacity: self.session_queue_capacity,
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            read_idle_timeout: Duration::from_secs(self.read_idle_timeout_secs),
        }
    }

    pub fn db_retention(&self) -> Duration {
        Duration::from_secs(self.db_retention_secs)
    }

    pub fn retention_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.retention_sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the given file (or the default location),
    /// with environment variables layered on top.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let path = match config_file {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };

        let built = Config::builder()
            .add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("AGORA").separator("__"))
            .build()
            .context("building configuration")?;

        built.try_deserialize().context("parsing configuration")
    }

    /// Write a default configuration file, creating parent directories.
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {parent:?}"))?;
        }

        let toml =
            toml::to_string_pretty(&Self::default()).context("serializing default config")?;
        let body = format!("# Configuration for {APP_NAME}\n\n{toml}");
        fs::write(path, body).with_context(|| format!("writing config to {}", path.display()))
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(default_config_dir()?.join("config.toml"))
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

pub fn default_data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::data_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".local").join("share").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine data directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8081");
        assert!(config.server.allowed_origins.is_empty());
        assert_eq!(config.chat.message_ttl_secs, 20);
        assert_eq!(config.chat.session_queue_capacity, 256);
        assert_eq!(config.chat.max_message_bytes, 512);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_resolve_secret_literal() {
        let auth = AuthConfig {
            jwt_secret: Some("super-secret".to_string()),
        };
        assert_eq!(auth.resolve_secret().unwrap(), "super-secret");
    }

    #[test]
    fn test_resolve_secret_missing() {
        let auth = AuthConfig { jwt_secret: None };
        assert!(auth.resolve_secret().is_err());
    }

    #[test]
    fn test_resolve_secret_from_env() {
        unsafe { env::set_var("AGORA_TEST_JWT_SECRET", "from-env") };
        let auth = AuthConfig {
            jwt_secret: Some("env:AGORA_TEST_JWT_SECRET".to_string()),
        };
        assert_eq!(auth.resolve_secret().unwrap(), "from-env");
        unsafe { env::remove_var("AGORA_TEST_JWT_SECRET") };
    }

    #[test]
    fn test_chat_durations() {
        let chat = ChatConfig::default();
        let hub = chat.hub_config();
        assert_eq!(hub.message_ttl, Duration::from_secs(20));
        assert_eq!(hub.cleanup_interval, Duration::from_secs(5));

        let session = chat.session_config();
        assert_eq!(session.heartbeat_interval, Duration::from_secs(54));
        assert_eq!(session.read_idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_write_default_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        AppConfig::write_default(&path).unwrap();

        let loaded = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.server.bind_addr, "127.0.0.1:8081");
    }
}
