//! Closed error taxonomy for LunaTask API calls.
//!
//! Classification is driven only by the HTTP status code or the transport
//! failure type. Messages are built from static text, status codes, methods
//! and endpoints, so the credential can never leak into them.

use super::transport::TransportError;
use reqwest::Method;
use std::fmt;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Statuses that indicate capacity, maintenance or gateway-timeout conditions.
const RETRYABLE_STATUS_CODES: [u16; 4] = [500, 502, 503, 524];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Auth,
    SubscriptionRequired,
    NotFound,
    Validation,
    RateLimited,
    Server,
    ServiceUnavailable,
    Timeout,
    Network,
    UnknownApi,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Auth => "auth",
            ErrorKind::SubscriptionRequired => "subscription_required",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Server => "server",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::UnknownApi => "unknown_api",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request{}: {message}", status_suffix(.status))]
    BadRequest { status: Option<u16>, message: String },
    #[error("authentication failed (status {status})")]
    Auth { status: u16 },
    #[error("subscription required, free plan limit reached (status {status})")]
    SubscriptionRequired { status: u16 },
    #[error("resource not found (status {status})")]
    NotFound { status: u16 },
    #[error("entity validation failed (status {status})")]
    Validation { status: u16 },
    #[error("rate limit exceeded{}", status_suffix(.status))]
    RateLimited { status: Option<u16> },
    #[error("server error (status {status})")]
    Server { status: u16 },
    #[error("service temporarily unavailable (status {status})")]
    ServiceUnavailable { status: u16 },
    #[error("request timed out{}", status_suffix(.status))]
    Timeout {
        status: Option<u16>,
        #[source]
        source: Option<BoxError>,
    },
    #[error("network error: {source}")]
    Network {
        #[source]
        source: BoxError,
    },
    #[error("LunaTask API error{}: {message}", status_suffix(.status))]
    UnknownApi {
        status: Option<u16>,
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" (status {code})"))
        .unwrap_or_default()
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::BadRequest { .. } => ErrorKind::BadRequest,
            ApiError::Auth { .. } => ErrorKind::Auth,
            ApiError::SubscriptionRequired { .. } => ErrorKind::SubscriptionRequired,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::RateLimited { .. } => ErrorKind::RateLimited,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::UnknownApi { .. } => ErrorKind::UnknownApi,
        }
    }

    /// HTTP status that produced this error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status }
            | ApiError::SubscriptionRequired { status }
            | ApiError::NotFound { status }
            | ApiError::Validation { status }
            | ApiError::Server { status }
            | ApiError::ServiceUnavailable { status } => Some(*status),
            ApiError::BadRequest { status, .. }
            | ApiError::RateLimited { status }
            | ApiError::Timeout { status, .. }
            | ApiError::UnknownApi { status, .. } => *status,
            ApiError::Network { .. } => None,
        }
    }

    /// Whether the outcome is transient. Independent of how many attempts remain.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout { status: None, .. } | ApiError::Network { .. } => true,
            other => other
                .status()
                .is_some_and(|code| RETRYABLE_STATUS_CODES.contains(&code)),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            status: None,
            message: message.into(),
        }
    }

    pub fn unknown_alias(alias: &str) -> Self {
        Self::bad_request(format!("unknown alias '{alias}'"))
    }

    pub fn missing_scope_id() -> Self {
        Self::bad_request("missing required parameter: area_id")
    }

    pub fn unsupported_param(name: &str) -> Self {
        Self::bad_request(format!("parameter '{name}' is not supported"))
    }

    pub fn empty_id(entity: &str) -> Self {
        Self::bad_request(format!("{entity} id must not be empty"))
    }

    pub fn parse(endpoint: &str, detail: impl Into<String>) -> Self {
        ApiError::UnknownApi {
            status: None,
            message: format!(
                "Failed to parse response from '{endpoint}': {}",
                detail.into()
            ),
            source: None,
        }
    }

    pub fn unexpected(method: &Method, endpoint: &str, source: impl Into<BoxError>) -> Self {
        ApiError::UnknownApi {
            status: None,
            message: format!("Unexpected error during {method} {endpoint}"),
            source: Some(source.into()),
        }
    }

    pub fn exhausted(method: &Method, url: &str) -> Self {
        ApiError::UnknownApi {
            status: None,
            message: format!("Exhausted retry attempts for {method} {url}"),
            source: None,
        }
    }

    pub fn client_init(source: impl Into<BoxError>) -> Self {
        ApiError::UnknownApi {
            status: None,
            message: "failed to initialise HTTP client".to_string(),
            source: Some(source.into()),
        }
    }
}

/// Map a non-2xx status onto the taxonomy.
pub fn classify_status(status: u16) -> ApiError {
    match status {
        400 => ApiError::BadRequest {
            status: Some(status),
            message: "invalid request parameters".to_string(),
        },
        401 => ApiError::Auth { status },
        402 => ApiError::SubscriptionRequired { status },
        404 => ApiError::NotFound { status },
        422 => ApiError::Validation { status },
        429 => ApiError::RateLimited {
            status: Some(status),
        },
        503 => ApiError::ServiceUnavailable { status },
        524 => ApiError::Timeout {
            status: Some(status),
            source: None,
        },
        500..=599 => ApiError::Server { status },
        _ => ApiError::UnknownApi {
            status: Some(status),
            message: "unmapped response status".to_string(),
            source: None,
        },
    }
}

pub(crate) fn classify_transport(error: TransportError, method: &Method, endpoint: &str) -> ApiError {
    match error {
        TransportError::Timeout(source) => ApiError::Timeout {
            status: None,
            source: Some(source),
        },
        TransportError::Connect(source) => ApiError::Network { source },
        TransportError::Other(source) => ApiError::unexpected(method, endpoint, source),
    }
}
