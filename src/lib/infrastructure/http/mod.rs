//! Resilient HTTP layer: token bucket, retry loop, status classification.

pub mod error;
pub mod executor;
pub mod limiter;
pub mod retry;
pub mod secret;
pub mod transport;

pub use error::{ApiError, ErrorKind, classify_status};
pub use executor::{Executor, ExecutorSettings, JsonMap, QueryParams, RequestExecutor};
pub use limiter::{LimiterError, TokenBucketLimiter};
pub use retry::{RetryContext, RetryDecision, RetryPhase, Sleeper, TokioSleeper, decide};
pub use secret::BearerToken;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
