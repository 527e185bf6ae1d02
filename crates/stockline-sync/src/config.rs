//! # Sync Configuration
//!
//! Configuration management for the sync engine and its host.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKLINE_BASE_URL=https://staging.example.com/api/public/         │
//! │     STOCKLINE_CONNECTIVITY=offline                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/stockline/stockline.toml (Linux)                         │
//! │     ~/Library/Application Support/com.stockline.stockline/ (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     public product API, auto connectivity, platform data dir          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [remote]
//! base_url = "https://app.getswipe.in/api/public/"
//! request_timeout_secs = 30
//!
//! [connectivity]
//! mode = "auto"  # auto | online | offline
//!
//! [storage]
//! data_dir = "/var/lib/stockline"
//!
//! [trigger]
//! name = "product_upload_work_v5"
//! initial_backoff_secs = 30
//!
//! [notifications]
//! enabled = true
//! sink = "tracing"  # tracing | recording | none
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

/// Public product API used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "https://app.getswipe.in/api/public/";

/// Name of the single-slot background work unit.
pub const DEFAULT_TRIGGER_NAME: &str = "product_upload_work_v5";

// =============================================================================
// Remote Settings
// =============================================================================

/// Where the product API lives and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL; `get` and `add` are resolved against it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP/TLS connect timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Pause after a manual refresh so the spinner is visible (milliseconds).
    #[serde(default = "default_refresh_delay")]
    pub refresh_delay_ms: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_refresh_delay() -> u64 {
    1_000
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            refresh_delay_ms: default_refresh_delay(),
        }
    }
}

// =============================================================================
// Connectivity Settings
// =============================================================================

/// How the engine decides whether it is online.
///
/// ```text
/// AUTO     probe the base URL; any HTTP answer counts as online
/// ONLINE   always online (probe skipped)
/// OFFLINE  always offline: every add is queued, nothing is sent
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityMode {
    #[default]
    Auto,
    Online,
    Offline,
}

impl std::fmt::Display for ConnectivityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityMode::Auto => write!(f, "auto"),
            ConnectivityMode::Online => write!(f, "online"),
            ConnectivityMode::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for ConnectivityMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "probe" => Ok(ConnectivityMode::Auto),
            "online" | "on" => Ok(ConnectivityMode::Online),
            "offline" | "off" => Ok(ConnectivityMode::Offline),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown connectivity mode: '{}'. Valid options: auto, online, offline",
                other
            ))),
        }
    }
}

/// Connectivity oracle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivitySettings {
    #[serde(default)]
    pub mode: ConnectivityMode,

    /// URL probed in auto mode. Defaults to the remote base URL.
    #[serde(default)]
    pub probe_url: Option<String>,

    /// Probe timeout (seconds).
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_probe_timeout() -> u64 {
    3
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        ConnectivitySettings {
            mode: ConnectivityMode::default(),
            probe_url: None,
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Where the database and image files go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Root for the database, queued images and the temp cache.
    /// Defaults to the platform data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Explicit database file. Defaults to `<data_dir>/stockline.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Delete and recreate the database when its schema is incompatible.
    #[serde(default = "default_true")]
    pub recreate_on_incompatible: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            data_dir: None,
            database_path: None,
            recreate_on_incompatible: true,
        }
    }
}

// =============================================================================
// Trigger Settings
// =============================================================================

/// Background trigger timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSettings {
    /// Name of the single-slot work unit (shows up in logs).
    #[serde(default = "default_trigger_name")]
    pub name: String,

    /// How often connectivity is sampled while waiting or idle (seconds).
    #[serde(default = "default_network_poll")]
    pub network_poll_secs: u64,

    /// First retry delay after a failed drain (seconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_secs: u64,

    /// Retry delay ceiling (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Schedule a drain on every offline→online transition.
    #[serde(default = "default_true")]
    pub drain_on_reconnect: bool,
}

fn default_trigger_name() -> String {
    DEFAULT_TRIGGER_NAME.to_string()
}
fn default_network_poll() -> u64 {
    5
}
fn default_initial_backoff() -> u64 {
    30
}
fn default_max_backoff() -> u64 {
    3_600
}

impl Default for TriggerSettings {
    fn default() -> Self {
        TriggerSettings {
            name: default_trigger_name(),
            network_poll_secs: default_network_poll(),
            initial_backoff_secs: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            drain_on_reconnect: true,
        }
    }
}

impl TriggerSettings {
    pub fn network_poll_interval(&self) -> Duration {
        Duration::from_secs(self.network_poll_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

// =============================================================================
// Notification Settings
// =============================================================================

/// Which notification sink the host wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Structured log lines.
    #[default]
    Tracing,
    /// In-memory event log, for hosts that poll.
    Recording,
    /// Drop everything.
    None,
}

/// Notification sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Whether the user has granted notification permission.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub sink: SinkKind,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            enabled: true,
            sink: SinkKind::default(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub connectivity: ConnectivitySettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub trigger: TriggerSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (stockline.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| SyncError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        self.base_url()?;

        if let Some(ref probe) = self.connectivity.probe_url {
            Url::parse(probe)?;
        }

        if self.remote.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.trigger.network_poll_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "network_poll_secs must be greater than 0".into(),
            ));
        }

        if self.trigger.initial_backoff_secs > self.trigger.max_backoff_secs {
            return Err(SyncError::InvalidConfig(
                "initial_backoff_secs must not exceed max_backoff_secs".into(),
            ));
        }

        if self.trigger.name.trim().is_empty() {
            return Err(SyncError::InvalidConfig("trigger name must not be empty".into()));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup (the environment in production).
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("STOCKLINE_BASE_URL") {
            debug!(url = %url, "Overriding base URL from environment");
            self.remote.base_url = url;
        }

        if let Some(path) = lookup("STOCKLINE_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.database_path = Some(PathBuf::from(path));
        }

        if let Some(dir) = lookup("STOCKLINE_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(mode) = lookup("STOCKLINE_CONNECTIVITY") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding connectivity mode from environment");
                    self.connectivity.mode = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown connectivity mode in environment"),
            }
        }

        if let Some(secs) = lookup("STOCKLINE_REQUEST_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.remote.request_timeout_secs = s;
            }
        }

        if let Some(flag) = lookup("STOCKLINE_NOTIFICATIONS") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => self.notifications.enabled = true,
                "0" | "false" | "off" | "no" => self.notifications.enabled = false,
                _ => warn!(value = %flag, "Unknown notifications flag in environment"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("stockline.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Parsed base URL, always ending in `/` so endpoints join under it.
    pub fn base_url(&self) -> SyncResult<Url> {
        let mut raw = self.remote.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }

        let url = Url::parse(&raw)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Base URL must start with http:// or https://, got: {}",
                self.remote.base_url
            )));
        }
        Ok(url)
    }

    /// URL probed by the connectivity oracle in auto mode.
    pub fn probe_url(&self) -> SyncResult<Url> {
        match self.connectivity.probe_url {
            Some(ref probe) => Ok(Url::parse(probe)?),
            None => self.base_url(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.connect_timeout_secs)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.remote.refresh_delay_ms)
    }

    /// Root data directory.
    pub fn data_dir(&self) -> SyncResult<PathBuf> {
        if let Some(ref dir) = self.storage.data_dir {
            return Ok(dir.clone());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| SyncError::InvalidConfig("No data directory available".into()))
    }

    /// Database file path.
    pub fn database_path(&self) -> SyncResult<PathBuf> {
        match self.storage.database_path {
            Some(ref path) => Ok(path.clone()),
            None => Ok(self.data_dir()?.join("stockline.db")),
        }
    }

    /// Stable copies of images for queued uploads.
    pub fn image_dir(&self) -> SyncResult<PathBuf> {
        Ok(self.data_dir()?.join("images"))
    }

    /// Temporary copies of images for foreground uploads.
    pub fn cache_dir(&self) -> SyncResult<PathBuf> {
        Ok(self.data_dir()?.join("cache"))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "stockline", "stockline")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_connectivity_mode_parsing() {
        assert_eq!("auto".parse::<ConnectivityMode>().unwrap(), ConnectivityMode::Auto);
        assert_eq!("ONLINE".parse::<ConnectivityMode>().unwrap(), ConnectivityMode::Online);
        assert_eq!("off".parse::<ConnectivityMode>().unwrap(), ConnectivityMode::Offline);
        assert!("sometimes".parse::<ConnectivityMode>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.remote.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.connectivity.mode, ConnectivityMode::Auto);
        assert_eq!(config.trigger.name, DEFAULT_TRIGGER_NAME);
        assert!(config.notifications.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.remote.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config.remote.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.remote.base_url = "http://localhost:8080/api".to_string();
        assert!(config.validate().is_ok());

        config.trigger.initial_backoff_secs = 10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let mut config = SyncConfig::default();
        config.remote.base_url = "http://localhost:8080/api/public".to_string();

        let url = config.base_url().unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/public/");
        assert_eq!(url.join("add").unwrap().as_str(), "http://localhost:8080/api/public/add");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("STOCKLINE_BASE_URL", "http://127.0.0.1:9000/"),
            ("STOCKLINE_DB_PATH", "/tmp/override.db"),
            ("STOCKLINE_CONNECTIVITY", "offline"),
            ("STOCKLINE_REQUEST_TIMEOUT_SECS", "7"),
            ("STOCKLINE_NOTIFICATIONS", "off"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.remote.base_url, "http://127.0.0.1:9000/");
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/override.db"));
        assert_eq!(config.connectivity.mode, ConnectivityMode::Offline);
        assert_eq!(config.remote.request_timeout_secs, 7);
        assert!(!config.notifications.enabled);
    }

    #[test]
    fn test_paths_follow_data_dir() {
        let mut config = SyncConfig::default();
        config.storage.data_dir = Some(PathBuf::from("/srv/stockline"));

        assert_eq!(config.database_path().unwrap(), PathBuf::from("/srv/stockline/stockline.db"));
        assert_eq!(config.image_dir().unwrap(), PathBuf::from("/srv/stockline/images"));
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/srv/stockline/cache"));
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
            [remote]
            base_url = "http://localhost:3000/"

            [connectivity]
            mode = "online"

            [notifications]
            sink = "recording"
        "#;

        let config: SyncConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.connectivity.mode, ConnectivityMode::Online);
        assert_eq!(config.notifications.sink, SinkKind::Recording);
        assert_eq!(config.trigger.initial_backoff_secs, 30);

        let written = toml::to_string_pretty(&config).unwrap();
        assert!(written.contains("[remote]"));
        assert!(written.contains("[trigger]"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockline.toml");

        let mut config = SyncConfig::default();
        config.remote.base_url = "http://localhost:3000/".to_string();
        config.save(Some(path.clone())).unwrap();

        let loaded: SyncConfig = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.remote.base_url, "http://localhost:3000/");
    }
}
