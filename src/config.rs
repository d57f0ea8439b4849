//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (CHARTFLOW_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [storage]
//! temp_dir = "./temp"
//! max_size_mb = 5
//!
//! [cleanup]
//! ttl_secs = 300
//! interval_secs = 300
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! CHARTFLOW_STORAGE__TEMP_DIR=/custom/path
//! CHARTFLOW_CLEANUP__TTL_SECS=600
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Temp-file storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for session artifacts (uploads/ and charts/ live under it)
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Maximum upload size in megabytes
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    /// Accepted upload file extensions
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

/// Cleanup scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Start the background cleanup loop on server startup
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Artifact time-to-live in seconds. Zero or negative means every
    /// session is always eligible for deletion.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: i64,

    /// How often the background loop scans for expired sessions.
    /// Decoupled from the TTL: this controls detection promptness only.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// HTTP server bind address
    #[serde(default = "default_http_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Allowed CORS origins (empty = same-origin only, unless cors_allow_all is true)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Explicitly allow all CORS origins (dev mode opt-in)
    #[serde(default)]
    pub cors_allow_all: bool,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Bearer-token authentication for the API.
///
/// The cleanup core trusts whatever principal the request layer has
/// validated; this is the request layer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Enable authentication
    #[serde(default)]
    pub enabled: bool,

    /// Accepted bearer tokens
    #[serde(default)]
    pub api_keys: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional log file directory; unset = stderr only
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

// Default value functions
fn default_temp_dir() -> PathBuf {
    PathBuf::from("./temp")
}
fn default_max_size_mb() -> u64 {
    5
}
fn default_allowed_extensions() -> Vec<String> {
    vec![".csv".to_string(), ".xlsx".to_string(), ".xls".to_string()]
}
fn default_true() -> bool {
    true
}
fn default_ttl_secs() -> i64 {
    300
}
fn default_interval_secs() -> u64 {
    300
}
fn default_http_host() -> String {
    "127.0.0.1".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            temp_dir: default_temp_dir(),
            max_size_mb: default_max_size_mb(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        CleanupConfig {
            enabled: true,
            ttl_secs: default_ttl_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            host: default_http_host(),
            port: default_http_port(),
            cors_origins: Vec::new(),
            cors_allow_all: false,
            auth: AuthConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
            dir: None,
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (CHARTFLOW_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("CHARTFLOW_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("CHARTFLOW_").split("__"))
            .extract()
    }

    /// Validate invariants that figment cannot express.
    ///
    /// Fatal at initialization: a zero poll interval would spin the
    /// cleanup loop, so it is rejected before the scheduler starts.
    pub fn validate(&self) -> Result<(), Error> {
        if self.cleanup.enabled && self.cleanup.interval_secs == 0 {
            return Err(Error::Config(
                "cleanup.interval_secs must be greater than zero when cleanup is enabled"
                    .to_string(),
            ));
        }
        if self.storage.max_size_mb == 0 {
            return Err(Error::Config(
                "storage.max_size_mb must be greater than zero".to_string(),
            ));
        }
        if self.http.auth.enabled && self.http.auth.api_keys.is_empty() {
            return Err(Error::Config(
                "http.auth.enabled is set but http.auth.api_keys is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Maximum upload size in bytes
    pub fn max_upload_bytes(&self) -> usize {
        (self.storage.max_size_mb as usize) * 1024 * 1024
    }
}
