//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `signage.toml` in the working directory (or the file named by
//! `SIGNAGE_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use signage_app::orchestrator::OrchestratorConfig;
use signage_app::poller::PollerConfig;

const DEFAULT_PATH: &str = "signage.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration server.
    pub server: ServerConfig,
    /// Local state database.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Pairing behavior.
    pub pairing: PairingConfig,
    /// Fallback polling and heartbeat.
    pub sync: SyncConfig,
    /// Media warm-up and simulated playback.
    pub media: MediaConfig,
}

/// Configuration server connection.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL (e.g. `https://signage.example`).
    pub url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Pairing configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Show a pairing code on unbound terminals; otherwise show the global
    /// configuration.
    pub enabled: bool,
    pub poll_interval_secs: u64,
    pub poll_max_interval_secs: u64,
}

/// Fallback polling configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub poll_interval_secs: u64,
    pub poll_max_interval_secs: u64,
    pub heartbeat_secs: u64,
}

/// Media configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Concurrent preload requests.
    pub preload_concurrency: usize,
    /// How long self-timed media "plays" on the headless renderer.
    pub simulated_media_secs: u64,
}

impl Config {
    /// Load configuration from `signage.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SIGNAGE_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SIGNAGE_SERVER_URL") {
            self.server.url = val;
        }
        if let Ok(val) = std::env::var("SIGNAGE_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("SIGNAGE_PAIRING") {
            if let Ok(enabled) = val.parse() {
                self.pairing.enabled = enabled;
            }
        }
        if let Ok(val) = std::env::var("SIGNAGE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.server.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "server url must be http(s), got {url:?}"
            )));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request timeout must be non-zero".to_string(),
            ));
        }
        if self.media.preload_concurrency == 0 {
            return Err(ConfigError::Validation(
                "preload concurrency must be non-zero".to_string(),
            ));
        }
        self.orchestrator()
            .validate()
            .map_err(|err| ConfigError::Validation(err.to_string()))
    }

    /// Timing and behavior handed to the orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> OrchestratorConfig {
        let defaults = OrchestratorConfig::default();
        OrchestratorConfig {
            pairing_enabled: self.pairing.enabled,
            config_poll: PollerConfig {
                interval: Duration::from_secs(self.sync.poll_interval_secs),
                max_interval: Duration::from_secs(self.sync.poll_max_interval_secs),
                ..defaults.config_poll
            },
            pairing_poll: PollerConfig {
                interval: Duration::from_secs(self.pairing.poll_interval_secs),
                max_interval: Duration::from_secs(self.pairing.poll_max_interval_secs),
                ..defaults.pairing_poll
            },
            heartbeat_interval: Duration::from_secs(self.sync.heartbeat_secs),
        }
    }

    /// HTTP adapter configuration.
    #[must_use]
    pub fn http(&self) -> signage_adapter_http_reqwest::Config {
        signage_adapter_http_reqwest::Config {
            base_url: self.server.url.trim().to_string(),
            request_timeout: Duration::from_secs(self.server.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.server.connect_timeout_secs),
        }
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            request_timeout_secs: 15,
            connect_timeout_secs: 5,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:signage.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "signaged=info,signage=info".to_string(),
        }
    }
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 5,
            poll_max_interval_secs: 60,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            poll_max_interval_secs: 300,
            heartbeat_secs: 60,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            preload_concurrency: 4,
            simulated_media_secs: 12,
        }
    }
}

impl MediaConfig {
    #[must_use]
    pub fn simulated_media(&self) -> Duration {
        Duration::from_secs(self.simulated_media_secs)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
