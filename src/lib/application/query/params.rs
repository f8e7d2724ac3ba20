//! Pre-transmission guardrails for list queries.

use crate::constants::MAX_LIST_LIMIT;
use crate::infrastructure::http::{ApiError, QueryParams};
use std::collections::BTreeMap;
use std::num::IntErrorKind;
use tracing::debug;

const UNSUPPORTED_PARAMS: [&str; 2] = ["expand", "verbose"];
const OPEN_STATUS: &str = "open";

/// Caller-facing list parameters before canonicalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    entries: BTreeMap<String, String>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.entries.insert(key.into(), value.to_string());
        self
    }

    pub fn with_limit(self, limit: u32) -> Self {
        self.with("limit", limit)
    }

    pub fn with_status(self, status: &str) -> Self {
        self.with("status", status)
    }

    pub fn with_area(self, area_id: &str) -> Self {
        self.with("area_id", area_id)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical upstream query plus the client-side work it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    pub query: QueryParams,
    /// `status=open` was requested; completed records must be dropped locally.
    pub open_only: bool,
}

/// Apply the list guardrails.
///
/// Expansion/verbosity parameters are rejected outright. An integer `limit`
/// above the upstream maximum is sent as the maximum; any other value is
/// passed through for the upstream to judge.
/// The composite `open` status has no upstream equivalent, so it is removed
/// from the query and applied after the fetch instead.
pub fn prepare(params: &ListParams) -> Result<PreparedQuery, ApiError> {
    if let Some(name) = UNSUPPORTED_PARAMS
        .iter()
        .find(|name| params.entries.contains_key(**name))
    {
        return Err(ApiError::unsupported_param(name));
    }

    let mut query = params.entries.clone();
    let open_only = query.get("status").map(String::as_str) == Some(OPEN_STATUS);
    if open_only {
        query.remove("status");
    }

    if let Some(raw) = query.get_mut("limit") {
        if exceeds_max_limit(raw) {
            debug!(requested = %raw, sent = MAX_LIST_LIMIT, "Clamping list limit");
            *raw = MAX_LIST_LIMIT.to_string();
        }
    }

    Ok(PreparedQuery { query, open_only })
}

fn exceeds_max_limit(raw: &str) -> bool {
    match raw.trim().parse::<i64>() {
        Ok(limit) => limit > i64::from(MAX_LIST_LIMIT),
        Err(err) => *err.kind() == IntErrorKind::PosOverflow,
    }
}
