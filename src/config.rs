//! Application configuration.
//!
//! Configuration is read once at startup from a YAML file, then overridden
//! by environment variables and CLI flags in that order. Every field has a
//! serde default so a partial (or absent) file is fine.
//!
//! Recognized environment variables:
//! - `TASKHUB_DB_PATH` -- database file path
//! - `TASKHUB_PORT` -- HTTP listen port
//! - `TASKHUB_JWT_SECRET` -- token signing secret

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 4280;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP server and storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on (default: 4280).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            db_path: default_db_path(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskhub")
        .join("taskhub.db")
}

/// Reminder scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scan frequency in milliseconds (default: 60000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Suppression window for duplicate reminder firings, in minutes
    /// (default: 5).
    #[serde(default = "default_dedup_window_minutes")]
    pub dedup_window_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            dedup_window_minutes: default_dedup_window_minutes(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    60_000 // one minute
}

fn default_dedup_window_minutes() -> i64 {
    5
}

/// Token issuance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret. Override in production via TASKHUB_JWT_SECRET.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    /// Token lifetime in minutes (default: 1 day).
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_minutes: default_token_ttl_minutes(),
        }
    }
}

fn default_jwt_secret() -> String {
    "taskhub-dev-secret".to_string()
}

fn default_token_ttl_minutes() -> u64 {
    24 * 60
}

impl AppConfig {
    /// Load configuration from a YAML file, falling back to defaults when
    /// the file is absent, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file {:?}", p))?;
                serde_yaml::from_str(&text)
                    .with_context(|| format!("Failed to parse config file {:?}", p))?
            }
            None => AppConfig::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(db_path) = std::env::var("TASKHUB_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }
        if let Ok(port) = std::env::var("TASKHUB_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }
        if let Ok(secret) = std::env::var("TASKHUB_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
    }

    /// Ensure the directory holding the database file exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {:?}", parent))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 4280);
        assert_eq!(config.scheduler.poll_interval_ms, 60_000);
        assert_eq!(config.scheduler.dedup_window_minutes, 5);
        assert_eq!(config.auth.token_ttl_minutes, 24 * 60);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: AppConfig =
            serde_yaml::from_str("scheduler:\n  poll_interval_ms: 1000\n").unwrap();
        assert_eq!(config.scheduler.poll_interval_ms, 1000);
        assert_eq!(config.scheduler.dedup_window_minutes, 5);
        assert_eq!(config.server.port, 4280);
    }
}
