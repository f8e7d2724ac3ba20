//! Token bucket rate limiter.
//!
//! [`RateState`] is the pure bucket arithmetic, driven by explicit instants.
//! [`TokenBucketLimiter`] owns one bucket per client instance and suspends
//! callers cooperatively until a token is available.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LimiterError {
    #[error("rate limiter burst of {burst} is spent and refill is disabled (rpm = 0)")]
    Exhausted { burst: u32 },
}

/// Outcome of asking the bucket for one token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reservation {
    /// A token was consumed.
    Ready,
    /// No token yet; one will exist after this long.
    Wait(Duration),
    /// No token and none will ever be produced.
    Never,
}

#[derive(Debug, Clone)]
pub struct RateState {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
}

impl RateState {
    /// Starts full. `rpm = 0` means burst-only.
    pub fn new(rpm: u32, burst: u32, now: Instant) -> Self {
        let capacity = f64::from(burst);
        Self {
            capacity,
            refill_per_sec: f64::from(rpm) / 60.0,
            tokens: capacity,
            last_refill: now,
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Non-suspending acquisition.
    pub fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn reserve(&mut self, now: Instant) -> Reservation {
        if self.try_take(now) {
            return Reservation::Ready;
        }
        if self.refill_per_sec <= 0.0 {
            return Reservation::Never;
        }
        let missing = 1.0 - self.tokens;
        Reservation::Wait(Duration::from_secs_f64(missing / self.refill_per_sec))
    }

    /// Consume the token produced while waiting, without re-checking the level.
    pub fn settle_after_wait(&mut self, now: Instant) {
        self.refill(now);
        self.tokens = (self.tokens - 1.0).max(0.0);
    }
}

#[derive(Debug)]
pub struct TokenBucketLimiter {
    rpm: u32,
    burst: u32,
    state: Mutex<RateState>,
}

impl TokenBucketLimiter {
    pub fn new(rpm: u32, burst: u32) -> Self {
        debug!(rpm, burst, "Initialising token bucket limiter");
        Self {
            rpm,
            burst,
            state: Mutex::new(RateState::new(rpm, burst, Instant::now())),
        }
    }

    pub fn rpm(&self) -> u32 {
        self.rpm
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Suspend until one token is available, then consume it.
    ///
    /// The bucket stays locked across the refill wait, so concurrent callers on
    /// the same client queue behind each other. Dropping the future mid-wait
    /// consumes nothing.
    pub async fn acquire(&self) -> Result<(), LimiterError> {
        let mut state = self.state.lock().await;
        match state.reserve(Instant::now()) {
            Reservation::Ready => Ok(()),
            Reservation::Never => Err(LimiterError::Exhausted { burst: self.burst }),
            Reservation::Wait(wait) => {
                debug!(wait_ms = wait.as_millis() as u64, "Rate limiter waiting for token");
                sleep(wait).await;
                state.settle_after_wait(Instant::now());
                Ok(())
            }
        }
    }

    /// Take a token only if one is available right now.
    pub fn try_acquire(&self) -> bool {
        match self.state.try_lock() {
            Ok(mut state) => state.try_take(Instant::now()),
            Err(_) => false,
        }
    }

    pub async fn current_tokens(&self) -> f64 {
        let mut state = self.state.lock().await;
        state.refill(Instant::now());
        state.tokens()
    }
}
