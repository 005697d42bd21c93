//! Error types for blocklist control.

use std::io;

use thiserror::Error;

use crate::filter::FilterError;
use crate::filter::loader::LoadError;

/// Main error type for startup and library operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to load filter data: {0}")]
    Load(#[from] LoadError),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error(
        "no blocklist timestamp: set CF_LATEST_BLOCKLIST_TIMESTAMP or latest_timestamp in the config"
    )]
    MissingTimestamp,

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("latest_timestamp cannot be empty")]
    EmptyTimestamp,

    #[error("configure_url must start with http:// or https://: {url:?}")]
    InvalidConfigureUrl { url: String },

    #[error("filter_path cannot be empty")]
    EmptyFilterPath,
}

/// Failures raised while executing a control command.
///
/// These never escape [`CommandControl`](crate::command::CommandControl): the
/// dispatcher folds them into an exception envelope.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid request url")]
    InvalidUrl(#[from] url::ParseError),

    #[error("blocklist filter failed")]
    Filter(#[from] FilterError),

    #[error("failed to encode response body")]
    Encode(#[from] serde_json::Error),

    #[error("failed to build http response")]
    Http(#[from] http::Error),

    #[error("command panicked: {0}")]
    Panicked(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
