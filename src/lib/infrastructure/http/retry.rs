//! Retry state machine for one outer request.
//!
//! The retry-or-raise choice is the pure function [`decide`]; [`RetryContext`]
//! tracks attempts and the doubling backoff, and the actual waiting goes through
//! an injectable [`Sleeper`].

use super::error::ApiError;
use async_trait::async_trait;
use reqwest::Method;
use std::time::Duration;
use tracing::{error, warn};

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    Attempting,
    BackingOff,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    Raise,
}

/// Retry only when the outcome is transient and another attempt is allowed.
pub fn decide(error: &ApiError, attempts_remaining: u32, backoff: Duration) -> RetryDecision {
    if error.is_retryable() && attempts_remaining > 0 {
        RetryDecision::Retry(backoff)
    } else {
        RetryDecision::Raise
    }
}

#[derive(Debug)]
pub struct RetryContext {
    method: Method,
    url: String,
    attempt: u32,
    max_attempts: u32,
    backoff: Duration,
    phase: RetryPhase,
}

impl RetryContext {
    pub fn new(method: Method, url: impl Into<String>, retries: u32, seed: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            attempt: 0,
            max_attempts: retries.saturating_add(1),
            backoff: seed,
            phase: RetryPhase::Attempting,
        }
    }

    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt)
    }

    /// Start the next attempt, returning its 1-based number, or `None` once the
    /// budget is spent.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        if self.attempt >= self.max_attempts {
            self.phase = RetryPhase::Exhausted;
            return None;
        }
        self.attempt += 1;
        self.phase = RetryPhase::Attempting;
        Some(self.attempt)
    }

    /// Record a failed attempt. `Ok` carries the delay to sleep before the next
    /// attempt; `Err` hands back the error to raise.
    pub fn on_failure(&mut self, err: ApiError) -> Result<Duration, ApiError> {
        match decide(&err, self.attempts_remaining(), self.backoff) {
            RetryDecision::Retry(delay) => {
                warn!(
                    method = %self.method,
                    url = %self.url,
                    attempt = self.attempt,
                    max_attempts = self.max_attempts,
                    backoff_ms = delay.as_millis() as u64,
                    status = ?err.status(),
                    kind = %err.kind(),
                    "Retrying LunaTask request after transient failure"
                );
                self.phase = RetryPhase::BackingOff;
                self.backoff = self.backoff.saturating_mul(2);
                Ok(delay)
            }
            RetryDecision::Raise => {
                error!(
                    method = %self.method,
                    url = %self.url,
                    attempt = self.attempt,
                    status = ?err.status(),
                    kind = %err.kind(),
                    "LunaTask request failed"
                );
                self.phase = RetryPhase::Exhausted;
                Err(err)
            }
        }
    }
}
