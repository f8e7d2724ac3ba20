//! Rate-limited, retrying request driver for the LunaTask REST API.

use super::error::{ApiError, classify_status, classify_transport};
use super::limiter::TokenBucketLimiter;
use super::retry::{RetryContext, Sleeper, TokioSleeper};
use super::secret::BearerToken;
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::config::ServerConfig;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub type JsonMap = Map<String, Value>;

/// Query parameters; the ordered map keeps keys canonically sorted on the wire.
pub type QueryParams = BTreeMap<String, String>;

const NO_CONTENT: u16 = 204;

#[async_trait]
pub trait Executor: Send + Sync {
    /// Perform one logical call. A no-content success yields an empty map.
    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        query: Option<&QueryParams>,
    ) -> Result<JsonMap, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub base_url: String,
    pub retries: u32,
    pub backoff_seed: Duration,
    pub min_mutation_interval: Duration,
}

impl ExecutorSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            retries: 2,
            backoff_seed: Duration::from_millis(250),
            min_mutation_interval: Duration::ZERO,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            retries: config.http_retries,
            backoff_seed: config.http_backoff_start,
            min_mutation_interval: config.http_min_mutation_interval,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_backoff_seed(mut self, seed: Duration) -> Self {
        self.backoff_seed = seed;
        self
    }

    pub fn with_min_mutation_interval(mut self, interval: Duration) -> Self {
        self.min_mutation_interval = interval;
        self
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

pub struct RequestExecutor {
    settings: ExecutorSettings,
    limiter: TokenBucketLimiter,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("settings", &self.settings)
            .field("rpm", &self.limiter.rpm())
            .field("burst", &self.limiter.burst())
            .field("authorization", &BearerToken::redacted_authorization())
            .finish()
    }
}

impl RequestExecutor {
    pub fn from_config(config: &ServerConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(
            config.bearer_token.clone(),
            &config.http_user_agent,
            config.timeout_connect,
            config.timeout_read,
        )
        .map_err(ApiError::client_init)?;
        Ok(Self::new(
            ExecutorSettings::from_config(config),
            TokenBucketLimiter::new(config.rate_limit_rpm, config.rate_limit_burst),
            Arc::new(transport),
        ))
    }

    pub fn new(
        settings: ExecutorSettings,
        limiter: TokenBucketLimiter,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            settings,
            limiter,
            transport,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub fn limiter(&self) -> &TokenBucketLimiter {
        &self.limiter
    }

    fn is_mutation(method: &Method) -> bool {
        *method == Method::POST
            || *method == Method::PATCH
            || *method == Method::DELETE
            || *method == Method::PUT
    }

    fn redacted_headers() -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("Authorization", BearerToken::redacted_authorization()),
            ("Content-Type", "application/json".to_string()),
        ])
    }

    fn interpret(
        method: &Method,
        endpoint: &str,
        response: HttpResponse,
    ) -> Result<JsonMap, ApiError> {
        if !response.is_success() {
            return Err(classify_status(response.status));
        }
        if response.status == NO_CONTENT {
            debug!(status = response.status, "Successful API response (no content)");
            return Ok(JsonMap::new());
        }
        let parsed: Value = serde_json::from_slice(&response.body)
            .map_err(|err| ApiError::unexpected(method, endpoint, err))?;
        debug!(status = response.status, "Successful API response");
        match parsed {
            Value::Object(map) => Ok(map),
            other => Err(ApiError::parse(
                endpoint,
                format!("expected a JSON object, got {}", json_type(&other)),
            )),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl Executor for RequestExecutor {
    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        query: Option<&QueryParams>,
    ) -> Result<JsonMap, ApiError> {
        let url = self.settings.url_for(endpoint);
        let query: Vec<(String, String)> = query
            .map(|params| {
                params
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let mut retry = RetryContext::new(
            method.clone(),
            url.clone(),
            self.settings.retries,
            self.settings.backoff_seed,
        );

        while let Some(attempt) = retry.begin_attempt() {
            if let Err(err) = self.limiter.acquire().await {
                warn!(method = %method, url = %url, error = %err, "Rate limiter refused request");
                return Err(ApiError::RateLimited { status: None });
            }
            if Self::is_mutation(&method) && !self.settings.min_mutation_interval.is_zero() {
                self.sleeper.sleep(self.settings.min_mutation_interval).await;
            }

            debug!(
                method = %method,
                url = %url,
                attempt,
                headers = ?Self::redacted_headers(),
                "Sending LunaTask API request"
            );
            let request = HttpRequest {
                method: method.clone(),
                url: url.clone(),
                query: query.clone(),
                body: body.clone(),
            };
            let outcome = match self.transport.send(request).await {
                Ok(response) => Self::interpret(&method, endpoint, response),
                Err(err) => Err(classify_transport(err, &method, endpoint)),
            };

            match outcome {
                Ok(map) => return Ok(map),
                Err(err) => {
                    let delay = retry.on_failure(err)?;
                    self.sleeper.sleep(delay).await;
                }
            }
        }

        let err = ApiError::exhausted(&method, &url);
        warn!(method = %method, url = %url, "{err}");
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http::error::ErrorKind;
    use crate::infrastructure::http::transport::TransportError;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Scripted = Result<HttpResponse, TransportError>;

    struct ScriptedTransport {
        responses: Mutex<VecDeque<Scripted>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(500, "script exhausted")))
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn executor(
        transport: Arc<ScriptedTransport>,
        retries: u32,
    ) -> (RequestExecutor, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let settings = ExecutorSettings::new("https://api.example.test/v1/")
            .with_retries(retries)
            .with_backoff_seed(Duration::from_millis(100));
        let executor = RequestExecutor::new(settings, TokenBucketLimiter::new(6000, 100), transport)
            .with_sleeper(sleeper.clone());
        (executor, sleeper)
    }

    fn ok(body: Value) -> Scripted {
        Ok(HttpResponse::json(200, &body))
    }

    #[tokio::test]
    async fn retryable_failures_then_success_follow_doubling_backoff() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::new(502, "")),
            Err(TransportError::Timeout("slow".into())),
            ok(json!({"tasks": []})),
        ]);
        let (executor, sleeper) = executor(transport.clone(), 3);

        let result = executor
            .execute(Method::GET, "tasks", None, None)
            .await
            .expect("success");

        assert_eq!(result.get("tasks"), Some(&json!([])));
        assert_eq!(transport.calls(), 4);
        assert_eq!(
            sleeper.sleeps(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
            ]
        );
    }

    #[tokio::test]
    async fn non_retryable_statuses_make_exactly_one_attempt() {
        let cases = [
            (400, ErrorKind::BadRequest),
            (401, ErrorKind::Auth),
            (402, ErrorKind::SubscriptionRequired),
            (404, ErrorKind::NotFound),
            (422, ErrorKind::Validation),
            (429, ErrorKind::RateLimited),
        ];
        for (status, kind) in cases {
            let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(status, ""))]);
            let (executor, sleeper) = executor(transport.clone(), 5);
            let err = executor
                .execute(Method::GET, "tasks", None, None)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), kind, "status {status}");
            assert_eq!(transport.calls(), 1, "status {status}");
            assert!(sleeper.sleeps().is_empty(), "status {status}");
        }
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_classified_error() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::new(503, "")),
        ]);
        let (executor, sleeper) = executor(transport.clone(), 2);
        let err = executor
            .execute(Method::GET, "tasks", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(err.status(), Some(503));
        assert_eq!(transport.calls(), 3);
        assert_eq!(sleeper.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn network_failures_are_retried_and_typed() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Connect("refused".into())),
            Err(TransportError::Connect("refused".into())),
        ]);
        let (executor, _) = executor(transport.clone(), 1);
        let err = executor
            .execute(Method::GET, "ping", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn no_content_yields_empty_map_without_parsing() {
        let transport =
            ScriptedTransport::new(vec![Ok(HttpResponse::new(204, "this is not json"))]);
        let (executor, _) = executor(transport, 0);
        let result = executor
            .execute(Method::DELETE, "tasks/abc", None, None)
            .await
            .expect("no content");
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_wrapped_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(200, "<html>"))]);
        let (executor, sleeper) = executor(transport.clone(), 3);
        let err = executor
            .execute(Method::GET, "tasks", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownApi);
        assert!(err.to_string().contains("GET tasks"));
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn non_object_body_is_a_parse_failure() {
        let transport = ScriptedTransport::new(vec![ok(json!([1, 2, 3]))]);
        let (executor, _) = executor(transport, 0);
        let err = executor
            .execute(Method::GET, "tasks", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownApi);
        assert!(err.to_string().contains("an array"));
    }

    #[tokio::test]
    async fn mutations_wait_the_minimum_interval_before_sending() {
        let transport = ScriptedTransport::new(vec![
            ok(json!({"task": {"id": "t1"}})),
            ok(json!({"tasks": []})),
        ]);
        let sleeper = Arc::new(RecordingSleeper::default());
        let settings = ExecutorSettings::new("https://api.example.test/v1")
            .with_min_mutation_interval(Duration::from_millis(750));
        let executor = RequestExecutor::new(settings, TokenBucketLimiter::new(600, 10), transport)
            .with_sleeper(sleeper.clone());

        executor
            .execute(Method::POST, "tasks", Some(json!({"name": "x"})), None)
            .await
            .expect("create");
        executor
            .execute(Method::GET, "tasks", None, None)
            .await
            .expect("list");

        assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(750)]);
    }

    #[tokio::test]
    async fn query_and_url_are_built_canonically() {
        let transport = ScriptedTransport::new(vec![ok(json!({"tasks": []}))]);
        let (executor, _) = executor(transport.clone(), 0);
        let query = QueryParams::from([
            ("status".to_string(), "open".to_string()),
            ("limit".to_string(), "25".to_string()),
            ("area_id".to_string(), "a1".to_string()),
        ]);
        executor
            .execute(Method::GET, "/tasks", None, Some(&query))
            .await
            .expect("list");

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].url, "https://api.example.test/v1/tasks");
        let keys: Vec<&str> = requests[0].query.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["area_id", "limit", "status"]);
    }

    #[tokio::test]
    async fn burst_only_limiter_maps_to_rate_limited_without_status() {
        let transport = ScriptedTransport::new(vec![ok(json!({})), ok(json!({}))]);
        let executor = RequestExecutor::new(
            ExecutorSettings::new("https://api.example.test/v1"),
            TokenBucketLimiter::new(0, 1),
            transport.clone(),
        )
        .with_sleeper(Arc::new(RecordingSleeper::default()));

        executor
            .execute(Method::GET, "ping", None, None)
            .await
            .expect("first call");
        let err = executor
            .execute(Method::GET, "ping", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.status(), None);
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn debug_output_is_redacted() {
        let transport = ScriptedTransport::new(vec![]);
        let (executor, _) = executor(transport, 0);
        let rendered = format!("{executor:?}");
        assert!(rendered.contains("***redacted***"));
    }
}
