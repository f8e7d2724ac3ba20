use super::error::ConfigError;
use crate::constants::{DEFAULT_BASE_URL, REDACTED};
use crate::infrastructure::http::BearerToken;
use chrono::{FixedOffset, Offset, Utc};
use serde_json::{Value, json};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// tracing has no level above ERROR, so CRITICAL shares it.
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Critical => LevelFilter::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err(ConfigError::InvalidLogLevel {
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values supplied on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub base_url: Option<String>,
    pub token: Option<BearerToken>,
    pub rate_limit_rpm: Option<i64>,
    pub rate_limit_burst: Option<i64>,
}

/// Effective server configuration after layering and validation.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bearer_token: BearerToken,
    pub base_url: String,
    /// Accepted from existing config files and reported; nothing binds it.
    pub port: u16,
    pub log_level: LogLevel,
    pub test_connectivity_on_startup: bool,
    pub rate_limit_rpm: u32,
    pub rate_limit_burst: u32,
    pub http_retries: u32,
    pub http_backoff_start: Duration,
    pub http_min_mutation_interval: Duration,
    pub http_user_agent: String,
    pub timeout_connect: Duration,
    pub timeout_read: Duration,
    pub timezone: FixedOffset,
    pub config_file: Option<PathBuf>,
}

impl ServerConfig {
    /// Defaults for everything except the credential.
    pub fn new(token: BearerToken) -> Self {
        Self {
            bearer_token: token,
            base_url: DEFAULT_BASE_URL.to_string(),
            port: 8080,
            log_level: LogLevel::Info,
            test_connectivity_on_startup: false,
            rate_limit_rpm: 60,
            rate_limit_burst: 10,
            http_retries: 2,
            http_backoff_start: Duration::from_millis(250),
            http_min_mutation_interval: Duration::ZERO,
            http_user_agent: default_user_agent(),
            timeout_connect: Duration::from_secs(5),
            timeout_read: Duration::from_secs(30),
            timezone: Utc.fix(),
            config_file: None,
        }
    }

    /// Load from `path` (or the default path), the environment and `overrides`
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        super::loader::load_config(path, overrides)
    }

    /// Effective configuration for logging, with the credential masked.
    pub fn to_redacted_json(&self) -> Value {
        json!({
            "lunatask_bearer_token": REDACTED,
            "lunatask_base_url": self.base_url,
            "port": self.port,
            "log_level": self.log_level.as_str(),
            "config_file": self.config_file.as_ref().map(|p| p.display().to_string()),
            "test_connectivity_on_startup": self.test_connectivity_on_startup,
            "rate_limit_rpm": self.rate_limit_rpm,
            "rate_limit_burst": self.rate_limit_burst,
            "http_retries": self.http_retries,
            "http_backoff_start_seconds": self.http_backoff_start.as_secs_f64(),
            "http_min_mutation_interval_seconds": self.http_min_mutation_interval.as_secs_f64(),
            "http_user_agent": self.http_user_agent,
            "timeout_connect": self.timeout_connect.as_secs_f64(),
            "timeout_read": self.timeout_read.as_secs_f64(),
            "timezone": self.timezone.to_string(),
        })
    }
}

pub fn default_user_agent() -> String {
    format!("lunatask-mcp/{}", env!("CARGO_PKG_VERSION"))
}
