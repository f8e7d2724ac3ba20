use super::app::{ConfigOverrides, LogLevel, ServerConfig, default_user_agent};
use super::error::ConfigError;
use crate::constants::{CONFIG_PATH, ENV_PATH, TOKEN_ENV_VAR};
use crate::infrastructure::http::BearerToken;
use chrono::{FixedOffset, Offset, Utc};
use dotenvy::from_filename;
use reqwest::Url;
use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;
use tracing::debug;

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure for deserialization from TOML
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(super) struct RawConfig {
    pub lunatask_bearer_token: Option<BearerToken>,
    pub lunatask_base_url: Option<String>,
    pub port: Option<i64>,
    pub log_level: Option<String>,
    pub test_connectivity_on_startup: Option<bool>,
    pub rate_limit_rpm: Option<i64>,
    pub rate_limit_burst: Option<i64>,
    pub http_retries: Option<i64>,
    pub http_backoff_start_seconds: Option<f64>,
    pub http_min_mutation_interval_seconds: Option<f64>,
    pub http_user_agent: Option<String>,
    pub timeout_connect: Option<f64>,
    pub timeout_read: Option<f64>,
    pub timezone: Option<String>,
}

impl RawConfig {
    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(level) = &overrides.log_level {
            self.log_level = Some(level.clone());
        }
        if let Some(url) = &overrides.base_url {
            self.lunatask_base_url = Some(url.clone());
        }
        if let Some(token) = &overrides.token {
            self.lunatask_bearer_token = Some(token.clone());
        }
        if let Some(rpm) = overrides.rate_limit_rpm {
            self.rate_limit_rpm = Some(rpm);
        }
        if let Some(burst) = overrides.rate_limit_burst {
            self.rate_limit_burst = Some(burst);
        }
    }
}

/// Ensures environment variables are loaded from config/.env
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = from_filename(ENV_PATH);
    });
}

/// Load and validate configuration.
///
/// An explicitly named file must exist; a missing default file means
/// "defaults plus environment".
pub fn load_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<ServerConfig, ConfigError> {
    ensure_env_loaded();
    let (config_path, explicit) = match path {
        Some(path) => (expand_path(path), true),
        None => (PathBuf::from(CONFIG_PATH), false),
    };

    let mut raw = match read_config(&config_path) {
        Ok(raw) => raw,
        Err(ConfigError::NotFound { .. }) if !explicit => {
            debug!(path = %config_path.display(), "No configuration file, using defaults");
            RawConfig::default()
        }
        Err(err) => return Err(err),
    };
    raw.apply_overrides(overrides);

    let loaded_from = explicit || config_path.exists();
    let mut config = validate_and_build(raw)?;
    if loaded_from {
        config.config_file = Some(config_path);
    }
    Ok(config)
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(&raw)
        .map(|cow| PathBuf::from(cow.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn read_config(path: &Path) -> Result<RawConfig, ConfigError> {
    debug!(path = %path.display(), "Reading server configuration file");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub(super) fn validate_and_build(raw: RawConfig) -> Result<ServerConfig, ConfigError> {
    let token = raw
        .lunatask_bearer_token
        .or_else(|| env::var(TOKEN_ENV_VAR).ok().map(BearerToken::new))
        .filter(|token| !token.is_blank())
        .ok_or(ConfigError::MissingToken)?;

    let mut config = ServerConfig::new(token);

    if let Some(url) = raw.lunatask_base_url {
        config.base_url = validate_base_url(url)?;
    }
    if let Some(port) = raw.port {
        config.port = bounded_int("port", port, 1, 65_535)? as u16;
    }
    if let Some(level) = raw.log_level {
        config.log_level = level.parse::<LogLevel>()?;
    }
    if let Some(flag) = raw.test_connectivity_on_startup {
        config.test_connectivity_on_startup = flag;
    }
    if let Some(rpm) = raw.rate_limit_rpm {
        config.rate_limit_rpm = bounded_int("rate_limit_rpm", rpm, 1, 10_000)?;
    }
    if let Some(burst) = raw.rate_limit_burst {
        config.rate_limit_burst = bounded_int("rate_limit_burst", burst, 1, 100)?;
    }
    if let Some(retries) = raw.http_retries {
        config.http_retries = bounded_int("http_retries", retries, 0, 5)?;
    }
    if let Some(seconds) = raw.http_backoff_start_seconds {
        config.http_backoff_start = bounded_secs("http_backoff_start_seconds", seconds, 0.1, 10.0)?;
    }
    if let Some(seconds) = raw.http_min_mutation_interval_seconds {
        config.http_min_mutation_interval =
            bounded_secs("http_min_mutation_interval_seconds", seconds, 0.0, 5.0)?;
    }
    config.http_user_agent = raw
        .http_user_agent
        .filter(|agent| !agent.trim().is_empty())
        .unwrap_or_else(default_user_agent);
    if let Some(seconds) = raw.timeout_connect {
        config.timeout_connect = bounded_secs("timeout_connect", seconds, 1.0, 30.0)?;
    }
    if let Some(seconds) = raw.timeout_read {
        config.timeout_read = bounded_secs("timeout_read", seconds, 5.0, 120.0)?;
    }
    if let Some(zone) = raw.timezone {
        config.timezone = parse_timezone(&zone)?;
    }

    Ok(config)
}

fn validate_base_url(url: String) -> Result<String, ConfigError> {
    let parsed = Url::parse(&url).map_err(|_| ConfigError::InvalidBaseUrl { url: url.clone() })?;
    if parsed.scheme() != "https" {
        return Err(ConfigError::InsecureBaseUrl { url });
    }
    Ok(url)
}

fn bounded_int(field: &'static str, value: i64, min: i64, max: i64) -> Result<u32, ConfigError> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    Ok(value as u32)
}

fn bounded_secs(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    Ok(Duration::from_secs_f64(value))
}

fn parse_timezone(value: &str) -> Result<FixedOffset, ConfigError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
        return Ok(Utc.fix());
    }
    trimmed
        .parse::<FixedOffset>()
        .map_err(|_| ConfigError::InvalidTimezone {
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with_token() -> RawConfig {
        RawConfig {
            lunatask_bearer_token: Some(BearerToken::new("file-token")),
            ..RawConfig::default()
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: Result<RawConfig, _> = toml::from_str("lunatask_bearer_token = \"t\"\nmystery = 1\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn integer_literals_are_accepted_for_second_fields() {
        let parsed: RawConfig = toml::from_str("timeout_read = 60\n").expect("parse");
        assert_eq!(parsed.timeout_read, Some(60.0));
    }

    #[test]
    fn http_base_url_is_refused() {
        let raw = RawConfig {
            lunatask_base_url: Some("http://api.lunatask.app/v1/".to_string()),
            ..raw_with_token()
        };
        assert!(matches!(
            validate_and_build(raw),
            Err(ConfigError::InsecureBaseUrl { .. })
        ));
    }

    #[test]
    fn bounds_are_enforced() {
        let cases: Vec<(RawConfig, &str)> = vec![
            (
                RawConfig {
                    rate_limit_rpm: Some(0),
                    ..raw_with_token()
                },
                "rate_limit_rpm",
            ),
            (
                RawConfig {
                    rate_limit_burst: Some(101),
                    ..raw_with_token()
                },
                "rate_limit_burst",
            ),
            (
                RawConfig {
                    http_retries: Some(6),
                    ..raw_with_token()
                },
                "http_retries",
            ),
            (
                RawConfig {
                    http_backoff_start_seconds: Some(0.05),
                    ..raw_with_token()
                },
                "http_backoff_start_seconds",
            ),
            (
                RawConfig {
                    timeout_read: Some(2.0),
                    ..raw_with_token()
                },
                "timeout_read",
            ),
        ];
        for (raw, expected) in cases {
            match validate_and_build(raw) {
                Err(ConfigError::OutOfRange { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected out of range for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut raw = RawConfig {
            rate_limit_rpm: Some(30),
            log_level: Some("ERROR".to_string()),
            ..raw_with_token()
        };
        raw.apply_overrides(&ConfigOverrides {
            log_level: Some("debug".to_string()),
            token: Some(BearerToken::new("cli-token")),
            rate_limit_rpm: Some(120),
            ..ConfigOverrides::default()
        });
        let config = validate_and_build(raw).expect("valid");
        assert_eq!(config.rate_limit_rpm, 120);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.bearer_token, BearerToken::new("cli-token"));
    }

    #[test]
    fn timezone_accepts_utc_and_offsets() {
        assert_eq!(parse_timezone("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_timezone("+05:30").unwrap().local_minus_utc(), 19_800);
        assert_eq!(parse_timezone("-08:00").unwrap().local_minus_utc(), -28_800);
        assert!(matches!(
            parse_timezone("Europe/Berlin"),
            Err(ConfigError::InvalidTimezone { .. })
        ));
    }
}
