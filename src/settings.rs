//! Runtime settings from the environment (a `.env` file is loaded first by the binary).

use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub max_connections: u32,
    /// Applied as `statement_timeout` on every pooled connection.
    pub statement_timeout: Option<Duration>,
    /// Catalog JSON file; the embedded warehouse catalog when unset.
    pub catalog_path: Option<PathBuf>,
    pub storage_backend: StorageBackend,
    pub apply_migrations: bool,
    pub body_limit_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let storage_backend = match get("STORAGE_BACKEND").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("postgres") => StorageBackend::Postgres,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Settings(format!(
                    "STORAGE_BACKEND must be postgres or memory, got '{}'",
                    other
                )))
            }
        };

        Ok(Settings {
            database_url: get("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/warehouse".into()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            max_connections: parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 5)?,
            statement_timeout: get("DB_STATEMENT_TIMEOUT_MS")
                .map(|v| parse_num::<u64>(&v, "DB_STATEMENT_TIMEOUT_MS"))
                .transpose()?
                .map(Duration::from_millis),
            catalog_path: get("CATALOG_PATH").map(PathBuf::from),
            storage_backend,
            apply_migrations: parse_bool(get("APPLY_MIGRATIONS"), "APPLY_MIGRATIONS", true)?,
            body_limit_bytes: parse_or(get("BODY_LIMIT_BYTES"), "BODY_LIMIT_BYTES", 1024 * 1024)?,
        })
    }
}

fn parse_num<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Settings(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    match value {
        Some(v) => parse_num(&v, key),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, key: &str, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Settings(format!("{} must be a boolean, got '{}'", key, other))),
    }
}
