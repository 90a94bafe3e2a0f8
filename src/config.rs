//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub tenants: TenantsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Outbound HTTP timeout for key fetch / fetch-fallback / delivery, in seconds
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
}

fn default_http_timeout_seconds() -> u64 {
    5
}

/// Backing store configuration
///
/// `backend` selects which partition implementation tenants, the remote
/// partition and the private partition use. `file_root` / `sql_path` are
/// only consulted for the matching backend.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Root directory for the file backend (one JSON file per resource)
    pub file_root: Option<PathBuf>,
    /// SQLite database path for the sql backend
    pub sql_path: Option<PathBuf>,
    /// Enable HTTP fetch-fallback for unknown remote resources
    #[serde(default = "default_true")]
    pub fetch_fallback: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
    Sql,
}

/// Tenant table: maps a URL prefix (scheme+host[+port]) to a partition name.
///
/// `*` is accepted as a catch-all tenant prefix.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TenantsConfig {
    #[serde(default)]
    pub prefixes: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FIRM__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.http_timeout_seconds", 5)?
            .set_default("store.backend", "memory")?
            .set_default("store.fetch_fallback", true)?
            .set_default("tenants.prefixes", Vec::<String>::new())?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("FIRM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))
    }

    /// Parse `tenants.prefixes` into a lookup table keyed by the prefix string.
    ///
    /// Values are the prefix itself; the table exists so the store layer has
    /// a stable type to route against without re-parsing the config list
    /// on every request.
    pub fn tenant_table(&self) -> HashMap<String, String> {
        self.tenants
            .prefixes
            .iter()
            .map(|p| (p.clone(), p.clone()))
            .collect()
    }
}
