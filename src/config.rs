//! Database configuration.
//!
//! The only required setting is the connection descriptor. It is read once at
//! start-up, either from a YAML file or from the process environment:
//!
//! ```yaml
//! uri: "sqlite:///${DATA_DIR:-.}/notifications.db"
//! pool_size: 8
//! connect_timeout: 10s
//! ```

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default maximum number of pooled connections.
pub const DEFAULT_POOL_SIZE: u32 = 5;

/// Default time `session()` waits for a free connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the connection descriptor.
pub const ENV_DATABASE_URI: &str = "DATABASE_URI";

/// Environment variable overriding [`DatabaseConfig::pool_size`].
pub const ENV_POOL_SIZE: &str = "DATABASE_POOL_SIZE";

/// Environment variable overriding [`DatabaseConfig::connect_timeout`].
pub const ENV_CONNECT_TIMEOUT: &str = "DATABASE_CONNECT_TIMEOUT";

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A required setting is absent.
    #[error("missing config value: {0}")]
    Missing(String),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    Validation(String),
}

/// Settings used to build the process-wide [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection descriptor, e.g. `sqlite:///./notifications.db`.
    pub uri: String,

    /// Maximum pooled connections (default: 5).
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// How long to wait for a free connection (default: "30s").
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl DatabaseConfig {
    /// Create a config for `uri` with default pool settings.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            pool_size: DEFAULT_POOL_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references in `uri` are expanded from
    /// the environment before validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.uri = expand_env_vars(&config.uri);
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from `DATABASE_URI` and the optional pool variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let uri = lookup(ENV_DATABASE_URI)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing(ENV_DATABASE_URI.to_string()))?;
        let mut config = Self::new(uri);

        if let Some(raw) = lookup(ENV_POOL_SIZE) {
            config.pool_size = raw.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("{ENV_POOL_SIZE}: '{raw}' is not a number"))
            })?;
        }
        if let Some(raw) = lookup(ENV_CONNECT_TIMEOUT) {
            config.connect_timeout = parse_duration(&raw)
                .map_err(|e| ConfigError::Validation(format!("{ENV_CONNECT_TIMEOUT}: {e}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uri.trim().is_empty() {
            return Err(ConfigError::Validation("uri must not be empty".to_string()));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::Validation(
                "pool_size must be positive".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "connect_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a duration such as `30s`, `500ms` or `1m30s`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Expand `${VAR}` and `${VAR:-default}` from the environment.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: OnceLock<Regex> = OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var pattern is valid")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(&caps[1]).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}
