//! Single-shot HTTP transport behind a trait so the executor can be driven
//! without a network.

use super::error::BoxError;
use super::secret::BearerToken;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const MAX_IDLE_CONNECTIONS: usize = 5;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(#[source] BoxError),
    #[error("connection failed: {0}")]
    Connect(#[source] BoxError),
    #[error("transport failure: {0}")]
    Other(#[source] BoxError),
}

impl TransportError {
    /// A body that breaks off mid-read is a connection failure, same as a
    /// refused connect.
    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout(Box::new(error))
        } else if error.is_connect()
            || error.is_request()
            || error.is_body()
            || error.is_decode()
        {
            TransportError::Connect(Box::new(error))
        } else {
            TransportError::Other(Box::new(error))
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport owning the connection pool and the credential.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
    token: BearerToken,
}

impl ReqwestTransport {
    pub fn new(
        token: BearerToken,
        user_agent: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .user_agent(user_agent)
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS)
            .build()?;
        Ok(Self { http, token })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut authorization = HeaderValue::from_str(&self.token.authorization_value())
            .map_err(|err| TransportError::Other(Box::new(err)))?;
        authorization.set_sensitive(true);

        let mut builder = self
            .http
            .request(request.method, &request.url)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(TransportError::from_reqwest)?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(TransportError::from_reqwest)?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
