//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/usagegrid/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/usagegrid/` (~/.config/usagegrid/)
//! - State/Logs: `$XDG_STATE_HOME/usagegrid/` (~/.local/state/usagegrid/)
//!
//! Claude Code's own files (transcripts, stats cache, credentials) live under
//! `[sources] claude_dir`, which defaults to `~/.claude`.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Rolling-window message limits offered by the widget menu.
pub const ROLLING_LIMIT_PRESETS: [u64; 5] = [450, 900, 2250, 4500, 9000];

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Expand a leading `~/` against the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Where Claude Code keeps its data
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Calendar grid configuration
    #[serde(default)]
    pub grid: GridConfig,

    /// Rolling usage window configuration
    #[serde(default)]
    pub window: WindowConfig,

    /// Refresh cadence
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Remote usage quota configuration
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Claude Code data locations
#[derive(Debug, Deserialize, Default, Clone)]
pub struct SourcesConfig {
    /// Override path for the Claude Code data directory (default `~/.claude`)
    pub claude_dir: Option<PathBuf>,
}

impl SourcesConfig {
    /// Root of Claude Code's data directory.
    pub fn claude_dir(&self) -> PathBuf {
        match &self.claude_dir {
            Some(dir) => expand_home(dir),
            None => home_dir().join(".claude"),
        }
    }

    /// Directory holding per-project transcript files.
    pub fn projects_dir(&self) -> PathBuf {
        self.claude_dir().join("projects")
    }

    /// Persisted daily-activity summary written by Claude Code.
    pub fn cache_path(&self) -> PathBuf {
        self.claude_dir().join("stats-cache.json")
    }

    /// OAuth credentials file (used when no keychain entry is available).
    pub fn credentials_path(&self) -> PathBuf {
        self.claude_dir().join(".credentials.json")
    }
}

/// Calendar grid configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GridConfig {
    /// Number of week columns in the calendar
    #[serde(default = "default_grid_weeks")]
    pub weeks: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            weeks: default_grid_weeks(),
        }
    }
}

fn default_grid_weeks() -> u32 {
    16
}

/// Rolling usage window configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WindowConfig {
    /// Length of the trailing window in hours
    #[serde(default = "default_window_hours")]
    pub hours: u32,

    /// Message budget for one window (see [`ROLLING_LIMIT_PRESETS`])
    #[serde(default = "default_window_limit")]
    pub limit: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            hours: default_window_hours(),
            limit: default_window_limit(),
        }
    }
}

fn default_window_hours() -> u32 {
    5
}

fn default_window_limit() -> u64 {
    900
}

/// Refresh cadence
#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    /// Seconds between live (today + rolling window) refreshes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Milliseconds to coalesce bursts of cache file events
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl RefreshConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_poll_interval() -> u64 {
    30
}

fn default_debounce_ms() -> u64 {
    500
}

/// Remote usage quota configuration
///
/// The quota endpoint reports server-side utilization of the 5-hour and
/// 7-day windows. Failures never surface to the user; the quota simply
/// stays absent.
#[derive(Debug, Deserialize, Clone)]
pub struct QuotaConfig {
    /// Enable/disable quota fetching
    #[serde(default = "default_quota_enabled")]
    pub enabled: bool,

    /// Usage endpoint URL
    #[serde(default = "default_quota_endpoint")]
    pub endpoint: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_quota_timeout")]
    pub timeout_secs: u64,

    /// macOS keychain service holding the OAuth credentials
    #[serde(default = "default_keychain_service")]
    pub keychain_service: String,

    /// User-Agent header sent with the request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: default_quota_enabled(),
            endpoint: default_quota_endpoint(),
            timeout_secs: default_quota_timeout(),
            keychain_service: default_keychain_service(),
            user_agent: default_user_agent(),
        }
    }
}

impl QuotaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_quota_enabled() -> bool {
    true
}

fn default_quota_endpoint() -> String {
    "https://api.anthropic.com/api/oauth/usage".to_string()
}

fn default_quota_timeout() -> u64 {
    10
}

fn default_keychain_service() -> String {
    "Claude Code-credentials".to_string()
}

fn default_user_agent() -> String {
    "claude-code/2.1.50".to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges, returning an error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.grid.weeks == 0 || self.grid.weeks > 53 {
            return Err(Error::Config(
                "grid.weeks must be between 1 and 53".to_string(),
            ));
        }
        if self.window.hours == 0 {
            return Err(Error::Config("window.hours must be at least 1".to_string()));
        }
        if self.window.limit == 0 {
            return Err(Error::Config("window.limit must be at least 1".to_string()));
        }
        if self.refresh.poll_interval_secs == 0 {
            return Err(Error::Config(
                "refresh.poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.quota.enabled && self.quota.endpoint.trim().is_empty() {
            return Err(Error::Config(
                "quota.endpoint is required when quota is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/usagegrid/config.toml` (~/.config/usagegrid/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("usagegrid").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/usagegrid/` (~/.local/state/usagegrid/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("usagegrid")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/usagegrid/usagegrid.log` (~/.local/state/usagegrid/usagegrid.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("usagegrid.log")
    }
}
