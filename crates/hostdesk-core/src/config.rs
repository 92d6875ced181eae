//! Configuration management for hostdesk
//!
//! Handles loading and validation of hostdesk.toml configuration files.
//! Every section and field has a default, so an absent or empty file yields
//! a fully working configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Snapshot polling settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Session persistence settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Permission grants for the static gate
    #[serde(default)]
    pub permissions: PermissionsConfig,

    /// Notification delivery settings
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-friendly colored output
    #[default]
    Pretty,
    /// Machine-parseable JSON lines
    Json,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> String {
    "~/.local/share/hostdesk".to_string()
}

/// Snapshot polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Poll interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Path to the ticket snapshot file, if file-backed
    #[serde(default)]
    pub ticket_snapshot: Option<PathBuf>,

    /// Path to the reservation snapshot file, if file-backed
    #[serde(default)]
    pub reservation_snapshot: Option<PathBuf>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            ticket_snapshot: None,
            reservation_snapshot: None,
        }
    }
}

fn default_poll_interval() -> u64 {
    5000
}

/// Session persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session document file name, relative to the data directory
    #[serde(default = "default_session_file")]
    pub file: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file: default_session_file(),
        }
    }
}

fn default_session_file() -> String {
    "session.json".to_string()
}

/// Permission configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsConfig {
    /// Permission names granted to the operator. When empty, everything is
    /// granted (single-operator default).
    #[serde(default)]
    pub granted: Vec<String>,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            granted: Vec::new(),
        }
    }
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Minimum seconds between deliveries on throttled channels. Zero
    /// disables throttling.
    #[serde(default)]
    pub min_interval_secs: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 0,
        }
    }
}

impl Config {
    /// Load configuration from `hostdesk.toml` in the default data
    /// directory, falling back to defaults when the file is absent.
    pub fn load() -> crate::Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(ConfigError::ParseFailed)?;
        Ok(config)
    }

    /// Default configuration file location
    pub fn default_path() -> crate::Result<PathBuf> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoDataDir)?;
        Ok(dir.join("hostdesk").join("hostdesk.toml"))
    }

    /// Resolve the session document path from the configured data directory.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir).join(&self.session.file)
    }
}

/// Expand a leading `~/` against the home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.watch.poll_interval_ms, 5000);
        assert_eq!(config.session.file, "session.json");
        assert!(config.permissions.granted.is_empty());
        assert_eq!(config.notifications.min_interval_secs, 0);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert!(config.watch.ticket_snapshot.is_none());
    }

    #[test]
    fn partial_toml_fills_missing_sections() {
        let config: Config = toml::from_str(
            r#"
            [watch]
            poll_interval_ms = 250
            ticket_snapshot = "/tmp/tickets.json"

            [permissions]
            granted = ["notifications.tickets"]
            "#,
        )
        .unwrap();
        assert_eq!(config.watch.poll_interval_ms, 250);
        assert_eq!(
            config.watch.ticket_snapshot.as_deref(),
            Some(Path::new("/tmp/tickets.json"))
        );
        assert_eq!(config.permissions.granted, ["notifications.tickets"]);
        // Untouched sections keep their defaults.
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn log_format_round_trips() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            format: LogFormat,
        }
        let w: Wrapper = toml::from_str("format = \"json\"").unwrap();
        assert_eq!(w.format, LogFormat::Json);
    }

    #[test]
    fn session_path_joins_data_dir_and_file() {
        let mut config = Config::default();
        config.general.data_dir = "/var/lib/hostdesk".to_string();
        assert_eq!(
            config.session_path(),
            PathBuf::from("/var/lib/hostdesk/session.json")
        );
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths_alone() {
        assert_eq!(expand_tilde("/opt/data"), PathBuf::from("/opt/data"));
    }
}
