//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;

/// Application configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Session token configuration.
    pub auth: AuthConfig,
    /// Status reconciler configuration.
    #[serde(default)]
    #[validate(nested)]
    pub status: StatusConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL of the status store.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Access token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to verify HS256 access tokens.
    pub jwt_secret: String,
    /// Clock skew tolerated when checking `exp`.
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
}

/// What the reconciler does with the ban state when the moderation store
/// cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BanCheckFailure {
    /// Reset to "not banned".
    #[default]
    FailOpen,
    /// Keep whatever the previous resolution produced.
    KeepPrevious,
}

/// Status reconciler configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StatusConfig {
    /// Seconds between periodic resolutions.
    #[serde(default = "default_poll_interval_secs")]
    #[validate(range(min = 1))]
    pub poll_interval_secs: u64,
    /// File holding welcome-seen markers. Markers live in memory when unset.
    #[serde(default)]
    pub marker_path: Option<PathBuf>,
    /// Ban state policy on moderation store failure.
    #[serde(default)]
    pub ban_check_failure: BanCheckFailure,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            marker_path: None,
            ban_check_failure: BanCheckFailure::default(),
        }
    }
}

impl StatusConfig {
    /// Poll interval used when none is configured.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_min_connections() -> u32 {
    1
}

const fn default_leeway_secs() -> u64 {
    30
}

const fn default_poll_interval_secs() -> u64 {
    StatusConfig::DEFAULT_POLL_INTERVAL.as_secs()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `STANDING_ENV`)
    /// 4. Environment variables with `STANDING_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("STANDING_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("STANDING")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::checked(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("STANDING")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::checked(config)
    }

    fn checked(config: config::Config) -> Result<Self, config::ConfigError> {
        let config: Self = config.try_deserialize()?;
        config
            .validate()
            .map_err(|e| config::ConfigError::Message(format!("Invalid configuration: {e}")))?;
        Ok(config)
    }
}
