//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{self, Context, Result};

use crate::defaults::{
    DEFAULT_DB_MAX_CONNECTIONS, DEFAULT_HTTP_BIND_ADDR, DEFAULT_IMPORT_BATCH_SIZE,
    DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PARSER_CHANNEL_CAPACITY, DEFAULT_PROGRESS_INTERVAL_MS,
    DEFAULT_UPLOAD_DIR,
};
use crate::services::import_processor::ImportSettings;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string
    pub database_url: String,
    pub db_max_connections: u32,

    /// JWT secret key for token validation
    pub jwt_secret: String,

    /// Address the HTTP API listens on
    pub http_bind_addr: String,

    /// NATS server URL for live status events (optional, events are only logged without it)
    pub nats_url: Option<String>,
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// Directory uploaded CSV files are spooled to
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,

    /// Rows per bulk insert
    pub import_batch_size: usize,
    /// Minimum time between progress checkpoints
    pub import_progress_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let jwt_secret = lookup("JWT_SECRET")
            .context("JWT_SECRET must be set. Generate one with: openssl rand -base64 48")?;

        if jwt_secret.len() < 32 {
            anyhow::bail!(
                "JWT_SECRET must be at least 32 bytes (current: {} bytes). Generate one with: openssl rand -base64 48",
                jwt_secret.len()
            );
        }

        const KNOWN_DEV_SECRETS: &[&str] = &["dev-secret-change-in-production-min-32-bytes!!"];
        if KNOWN_DEV_SECRETS.contains(&jwt_secret.as_str()) {
            tracing::warn!("JWT_SECRET matches a known default, change it for production!");
        }

        let import_batch_size: usize =
            parse_or(&lookup, "IMPORT_BATCH_SIZE", DEFAULT_IMPORT_BATCH_SIZE)?;
        if import_batch_size == 0 {
            anyhow::bail!("IMPORT_BATCH_SIZE must be greater than 0");
        }

        let progress_ms: u64 =
            parse_or(&lookup, "IMPORT_PROGRESS_INTERVAL_MS", DEFAULT_PROGRESS_INTERVAL_MS)?;

        Ok(Self {
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            jwt_secret,
            http_bind_addr: lookup("HTTP_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_HTTP_BIND_ADDR.to_string()),
            nats_url: lookup("NATS_URL").filter(|v| !v.is_empty()),
            nats_user: lookup("NATS_USER").filter(|v| !v.is_empty()),
            nats_password: lookup("NATS_PASSWORD"),
            upload_dir: lookup("UPLOAD_DIR")
                .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string())
                .into(),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            import_batch_size,
            import_progress_interval: Duration::from_millis(progress_ms),
        })
    }

    pub fn import_settings(&self) -> ImportSettings {
        ImportSettings {
            batch_size: self.import_batch_size,
            progress_interval: self.import_progress_interval,
            channel_capacity: DEFAULT_PARSER_CHANNEL_CAPACITY,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number, got '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgres://test"), ("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.http_bind_addr, "0.0.0.0:8080");
        assert!(config.nats_url.is_none());
        assert_eq!(config.upload_dir, PathBuf::from("uploads/imports"));
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.import_batch_size, 1000);
        assert_eq!(config.import_progress_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_config_requires_database_url() {
        let err = config_from(&[("JWT_SECRET", SECRET)]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_config_rejects_short_jwt_secret() {
        let err = config_from(&[("DATABASE_URL", "postgres://test"), ("JWT_SECRET", "short")]).unwrap_err();
        assert!(err.to_string().contains("at least 32 bytes"));
    }

    #[test]
    fn test_config_rejects_zero_batch_size() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", SECRET),
            ("IMPORT_BATCH_SIZE", "0"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("IMPORT_BATCH_SIZE"));
    }

    #[test]
    fn test_config_rejects_non_numeric_upload_limit() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", SECRET),
            ("MAX_UPLOAD_BYTES", "lots"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("MAX_UPLOAD_BYTES"));
    }

    #[test]
    fn test_config_overrides_flow_into_import_settings() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", SECRET),
            ("NATS_URL", "nats://localhost:4222"),
            ("IMPORT_BATCH_SIZE", "250"),
            ("IMPORT_PROGRESS_INTERVAL_MS", "200"),
        ])
        .unwrap();

        assert_eq!(config.nats_url.as_deref(), Some("nats://localhost:4222"));
        let settings = config.import_settings();
        assert_eq!(settings.batch_size, 250);
        assert_eq!(settings.progress_interval, Duration::from_millis(200));
    }
}
