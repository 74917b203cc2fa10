//! # Catalog Configuration
//!
//! Configuration for the API client, the sync engine and the local database.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CATALOG_API_URL=https://api.example.com                            │
//! │     CATALOG_SYNC_INTERVAL_SECS=60                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/product-catalog/catalog.toml (Linux)                     │
//! │     ~/Library/Application Support/com.catalog.product-catalog/ (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     http://localhost:3000, sync every 5 minutes, reset after 3 fails   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # catalog.toml
//! [api]
//! base_url = "http://localhost:3000"
//! timeout_secs = 30
//! username = "admin"
//! password = "admin123"
//!
//! [sync]
//! auto_sync = true
//! interval_secs = 300
//! failure_threshold = 3
//! retry_delay_secs = 5
//! max_backoff_secs = 300
//! probe_interval_secs = 30
//! change_retention_days = 30
//!
//! [database]
//! path = "/var/lib/catalog/catalog.db"
//! ```
//!
//! ## Environment Variables
//! | Variable | Overrides |
//! |----------|-----------|
//! | `CATALOG_API_URL` | `api.base_url` |
//! | `CATALOG_API_TIMEOUT_SECS` | `api.timeout_secs` |
//! | `CATALOG_USERNAME` | `api.username` |
//! | `CATALOG_PASSWORD` | `api.password` |
//! | `CATALOG_SYNC_INTERVAL_SECS` | `sync.interval_secs` |
//! | `CATALOG_AUTO_SYNC` | `sync.auto_sync` |
//! | `CATALOG_DB_PATH` | `database.path` |

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// API Settings
// =============================================================================

/// Where and how to reach the product API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL; endpoint paths such as `/api/products` are appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Login for `/api/auth/login`. Both must be set for the client to
    /// authenticate; otherwise requests go out without a token.
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            username: None,
            password: None,
        }
    }
}

impl ApiSettings {
    /// Both halves of the login, if configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync engine behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Run the background driver (timer, online edge, post-mutation kicks).
    #[serde(default = "default_true")]
    pub auto_sync: bool,

    /// Periodic sync interval (seconds).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Consecutive failed attempts that trigger the local store reset.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// First retry delay after a failed attempt (seconds).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Upper bound for the retry delay (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// How often to probe the API for connectivity (seconds). 0 disables
    /// the probe; the front end then reports connectivity itself.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Delete synced change-log entries older than this many days.
    /// Unset keeps the full log.
    #[serde(default)]
    pub change_retention_days: Option<u32>,
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    300
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_max_backoff() -> u64 {
    300
}

fn default_probe_interval() -> u64 {
    30
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            auto_sync: default_true(),
            interval_secs: default_interval(),
            failure_threshold: default_failure_threshold(),
            retry_delay_secs: default_retry_delay(),
            max_backoff_secs: default_max_backoff(),
            probe_interval_secs: default_probe_interval(),
            change_retention_days: None,
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    /// `None` when probing is disabled.
    pub fn probe_interval(&self) -> Option<Duration> {
        (self.probe_interval_secs > 0).then(|| Duration::from_secs(self.probe_interval_secs))
    }

    pub fn change_retention(&self) -> Option<chrono::Duration> {
        self.change_retention_days
            .map(|days| chrono::Duration::days(i64::from(days)))
    }
}

// =============================================================================
// Database Settings
// =============================================================================

/// Local database location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete catalog configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl CatalogConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration: defaults, then the TOML file (explicit path or
    /// the platform config dir), then environment overrides. Validates the
    /// result.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading catalog config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        self.api_url()?;

        if self.api.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.sync.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.failure_threshold == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.failure_threshold must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// The parsed API base URL. Only http and https are accepted.
    pub fn api_url(&self) -> SyncResult<Url> {
        let url = Url::parse(&self.api.base_url)?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(SyncError::InvalidUrl(format!(
                "API URL must use http or https, got: {}",
                other
            ))),
        }
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CATALOG_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Some(timeout) = lookup("CATALOG_API_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.api.timeout_secs = secs,
                Err(_) => warn!(value = %timeout, "Ignoring invalid CATALOG_API_TIMEOUT_SECS"),
            }
        }

        if let Some(user) = lookup("CATALOG_USERNAME") {
            self.api.username = Some(user);
        }

        if let Some(pass) = lookup("CATALOG_PASSWORD") {
            self.api.password = Some(pass);
        }

        if let Some(interval) = lookup("CATALOG_SYNC_INTERVAL_SECS") {
            match interval.parse::<u64>() {
                Ok(secs) => {
                    debug!(secs, "Overriding sync interval from environment");
                    self.sync.interval_secs = secs;
                }
                Err(_) => warn!(value = %interval, "Ignoring invalid CATALOG_SYNC_INTERVAL_SECS"),
            }
        }

        if let Some(auto) = lookup("CATALOG_AUTO_SYNC") {
            match auto.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.sync.auto_sync = true,
                "0" | "false" | "no" | "off" => self.sync.auto_sync = false,
                _ => warn!(value = %auto, "Unknown CATALOG_AUTO_SYNC value"),
            }
        }

        if let Some(path) = lookup("CATALOG_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "catalog", "product-catalog")
            .map(|dirs| dirs.config_dir().join("catalog.toml"))
    }

    /// The configured database file, or `catalog.db` in the platform data
    /// directory, or `./catalog.db` as a last resort.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database.path {
            return path.clone();
        }

        directories::ProjectDirs::from("com", "catalog", "product-catalog")
            .map(|dirs| dirs.data_dir().join("catalog.db"))
            .unwrap_or_else(|| PathBuf::from("./catalog.db"))
    }
}
