//! TOML Configuration File Support
//!
//! Centralized configuration loading for the console, with an optional TOML
//! file at `~/.config/elevator-hmi/console.toml`.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [gateway]
//! base_url = "http://10.0.0.5:8080"
//! request_timeout_ms = 10000
//!
//! [telemetry]
//! url = "ws://10.0.0.5:8080/ws/telemetry"
//! reconnect_delay_ms = 4000
//!
//! [polling]
//! alarm_interval_ms = 2000
//! insights_interval_ms = 5000
//! clock_interval_ms = 1000
//!
//! [session]
//! token_path = "/var/lib/elevator-hmi/ent_token"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directory name used under the XDG config and data directories
pub const APP_DIR_NAME: &str = "elevator-hmi";

/// Fixed name of the persisted token slot
pub const TOKEN_SLOT_NAME: &str = "ent_token";

/// Default gateway base address
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8080";

/// Default telemetry WebSocket address
pub const DEFAULT_TELEMETRY_URL: &str = "ws://localhost:8080/ws/telemetry";

/// Fixed reconnect delay for the telemetry stream
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(4);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Gateway section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayToml {
    /// Base address of the API gateway
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: Option<u64>,
}

/// Telemetry section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryToml {
    /// WebSocket address of the telemetry stream
    pub url: Option<String>,

    /// Fixed delay before a reconnect attempt, in milliseconds
    pub reconnect_delay_ms: Option<u64>,
}

/// Polling section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingToml {
    /// Active alarm refresh period in milliseconds
    pub alarm_interval_ms: Option<u64>,

    /// Insights refresh period in milliseconds
    pub insights_interval_ms: Option<u64>,

    /// Clock tick period in milliseconds
    pub clock_interval_ms: Option<u64>,
}

/// Session section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Location of the persisted token slot
    pub token_path: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleToml {
    /// Gateway section
    pub gateway: GatewayToml,

    /// Telemetry section
    pub telemetry: TelemetryToml,

    /// Polling section
    pub polling: PollingToml,

    /// Session section
    pub session: SessionToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved console configuration
#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    /// Gateway base address (no trailing slash)
    pub gateway_url: String,

    /// Telemetry WebSocket address
    pub telemetry_url: String,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,

    /// Fixed telemetry reconnect delay
    pub reconnect_delay: Duration,

    /// Active alarm refresh period
    pub alarm_interval: Duration,

    /// Insights refresh period
    pub insights_interval: Duration,

    /// Clock tick period
    pub clock_interval: Duration,

    /// Token slot override (None = XDG data dir)
    pub token_path: Option<PathBuf>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            telemetry_url: DEFAULT_TELEMETRY_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            alarm_interval: Duration::from_millis(2000),
            insights_interval: Duration::from_millis(5000),
            clock_interval: Duration::from_millis(1000),
            token_path: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ConsoleConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Resolve the token slot location
    ///
    /// Uses the configured override, otherwise
    /// `$XDG_DATA_HOME/elevator-hmi/ent_token`.
    #[must_use]
    pub fn token_slot_path(&self) -> Option<PathBuf> {
        self.token_path
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join(APP_DIR_NAME).join(TOKEN_SLOT_NAME)))
    }

    /// Check URL schemes and intervals
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url(&self.gateway_url, &["http", "https"], "gateway url")?;
        check_url(&self.telemetry_url, &["ws", "wss"], "telemetry url")?;

        for (name, value) in [
            ("request timeout", self.request_timeout),
            ("alarm interval", self.alarm_interval),
            ("insights interval", self.insights_interval),
            ("clock interval", self.clock_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

fn check_url(raw: &str, schemes: &[&str], what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::ValidationError(format!("{what} {raw:?}: {e}")))?;
    if schemes.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{what} {raw:?} must use one of: {}",
            schemes.join(", ")
        )))
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/elevator-hmi/console.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR_NAME).join("console.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed. The
/// result is not validated; call [`ConsoleConfig::validate`] once all
/// overrides are applied.
pub fn load_config() -> Result<ConsoleConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// A missing file is not an error (defaults are used).
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ConsoleConfig, ConfigError> {
    let mut config = ConsoleConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ConsoleToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_with(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ConsoleConfig, toml: &ConsoleToml) {
    if let Some(ref url) = toml.gateway.base_url {
        config.gateway_url = url.trim_end_matches('/').to_string();
    }
    if let Some(ms) = toml.gateway.request_timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }

    if let Some(ref url) = toml.telemetry.url {
        config.telemetry_url.clone_from(url);
    }
    if let Some(ms) = toml.telemetry.reconnect_delay_ms {
        config.reconnect_delay = Duration::from_millis(ms);
    }

    if let Some(ms) = toml.polling.alarm_interval_ms {
        config.alarm_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.polling.insights_interval_ms {
        config.insights_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.polling.clock_interval_ms {
        config.clock_interval = Duration::from_millis(ms);
    }

    if let Some(ref path) = toml.session.token_path {
        config.token_path = Some(PathBuf::from(path));
    }
}

/// Apply environment overrides, reading variables through `lookup`
fn apply_env_with(config: &mut ConsoleConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("HMI_GATEWAY_URL") {
        config.gateway_url = url.trim_end_matches('/').to_string();
        config.source = ConfigSource::Env;
    }
    if let Some(url) = lookup("HMI_TELEMETRY_URL") {
        config.telemetry_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(path) = lookup("HMI_TOKEN_PATH") {
        config.token_path = Some(PathBuf::from(path));
        config.source = ConfigSource::Env;
    }

    let millis = |key: &str| lookup(key).and_then(|v| v.parse::<u64>().ok());

    if let Some(ms) = millis("HMI_REQUEST_TIMEOUT_MS") {
        config.request_timeout = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = millis("HMI_RECONNECT_DELAY_MS") {
        config.reconnect_delay = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = millis("HMI_ALARM_POLL_MS") {
        config.alarm_interval = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = millis("HMI_INSIGHTS_POLL_MS") {
        config.insights_interval = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = millis("HMI_CLOCK_MS") {
        config.clock_interval = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Gateway base address override
    pub gateway_url: Option<String>,

    /// Telemetry address override
    pub telemetry_url: Option<String>,

    /// Token slot override
    pub token_path: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set gateway address override
    #[must_use]
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    /// Set telemetry address override
    #[must_use]
    pub fn with_telemetry_url(mut self, url: impl Into<String>) -> Self {
        self.telemetry_url = Some(url.into());
        self
    }

    /// Set token slot override
    #[must_use]
    pub fn with_token_path(mut self, path: PathBuf) -> Self {
        self.token_path = Some(path);
        self
    }

    /// Check if any overrides are set
    #[must_use]
    pub fn has_overrides(&self) -> bool {
        self.gateway_url.is_some() || self.telemetry_url.is_some() || self.token_path.is_some()
    }

    /// Apply overrides to a configuration
    pub fn apply(self, config: &mut ConsoleConfig) {
        if !self.has_overrides() {
            return;
        }
        if let Some(url) = self.gateway_url {
            config.gateway_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = self.telemetry_url {
            config.telemetry_url = url;
        }
        if let Some(path) = self.token_path {
            config.token_path = Some(path);
        }
        config.source = ConfigSource::Cli;
    }
}
