use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Only the parser message is shown; the full error quotes file content.
    #[error("failed to parse config from {path:?}: {}", .source.message())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(
        "missing bearer token: set 'lunatask_bearer_token' in the config file, \
         pass --token, or export LUNATASK_BEARER_TOKEN"
    )]
    MissingToken,

    #[error("base URL '{url}' must use https")]
    InsecureBaseUrl { url: String },

    #[error("base URL '{url}' is not a valid URL")]
    InvalidBaseUrl { url: String },

    #[error("'{field}' = {value} is out of range ({min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },

    #[error("invalid log level '{value}' (expected DEBUG, INFO, WARNING, ERROR or CRITICAL)")]
    InvalidLogLevel { value: String },

    #[error("invalid timezone '{value}' (expected UTC or a fixed offset such as +02:00)")]
    InvalidTimezone { value: String },
}
