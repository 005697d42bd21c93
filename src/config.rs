//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::command::DEFAULT_CONFIGURE_URL;
use crate::error::{ConfigError, Result, ValidationError};

/// Name of the variable carrying the latest blocklist timestamp, both at
/// build time and at runtime.
pub const TIMESTAMP_ENV: &str = "CF_LATEST_BLOCKLIST_TIMESTAMP";

/// Timestamp baked in at build time, if the variable was set then.
const COMPILED_TIMESTAMP: Option<&str> = option_env!("CF_LATEST_BLOCKLIST_TIMESTAMP");

/// Main configuration for the command layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Latest blocklist version stamp. Only used when neither the build nor
    /// the environment provides one.
    pub latest_timestamp: Option<String>,

    /// Target of the `config` redirect.
    #[serde(default = "default_configure_url")]
    pub configure_url: String,

    /// JSON data file for the in-memory filter. If None, the filter is empty.
    pub filter_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            latest_timestamp: None,
            configure_url: default_configure_url(),
            filter_path: None,
        }
    }
}

fn default_configure_url() -> String {
    DEFAULT_CONFIGURE_URL.to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate().map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self
            .latest_timestamp
            .as_deref()
            .is_some_and(|ts| ts.trim().is_empty())
        {
            return Err(ValidationError::EmptyTimestamp);
        }

        if !(self.configure_url.starts_with("http://") || self.configure_url.starts_with("https://"))
        {
            return Err(ValidationError::InvalidConfigureUrl {
                url: self.configure_url.clone(),
            });
        }

        if self
            .filter_path
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            return Err(ValidationError::EmptyFilterPath);
        }

        Ok(())
    }

    /// Resolve the latest blocklist timestamp.
    ///
    /// Precedence: the value compiled into the binary, then the
    /// `CF_LATEST_BLOCKLIST_TIMESTAMP` environment variable, then the config
    /// file. Run once at startup; the result is immutable afterwards.
    pub fn latest_timestamp(&self) -> Result<String> {
        let from_env = std::env::var(TIMESTAMP_ENV).ok();
        resolve_timestamp(
            COMPILED_TIMESTAMP,
            from_env.as_deref(),
            self.latest_timestamp.as_deref(),
        )
    }
}

/// Pick the first non-blank timestamp among the candidates, in order.
pub fn resolve_timestamp(
    compiled: Option<&str>,
    environment: Option<&str>,
    configured: Option<&str>,
) -> Result<String> {
    [compiled, environment, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|ts| !ts.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingTimestamp.into())
}
