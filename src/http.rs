use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::USER_AGENT;

/// HTTP methods used against the Kick and Discord APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    /// Full `Authorization` header value, e.g. `Bot <token>`.
    pub authorization: Option<String>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            authorization: None,
            body: None,
            timeout,
        }
    }

    pub fn post(url: impl Into<String>, body: Value, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            authorization: None,
            body: Some(body),
            timeout,
        }
    }

    pub fn patch(url: impl Into<String>, body: Value, timeout: Duration) -> Self {
        Self {
            method: Method::Patch,
            url: url.into(),
            authorization: None,
            body: Some(body),
            timeout,
        }
    }

    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }
}

/// A completed response: status, the `Retry-After` header (if any) and the raw body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub retry_after_header: Option<String>,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .with_context(|| format!("invalid JSON body (status {})", self.status))
    }

    /// Server-requested wait on a 429.
    ///
    /// The JSON body field `retry_after` wins over the `Retry-After` header.
    /// Both are seconds and may be fractional.
    pub fn retry_after(&self) -> Option<Duration> {
        let from_body = serde_json::from_str::<Value>(&self.body)
            .ok()
            .and_then(|v| v.get("retry_after").and_then(Value::as_f64));
        let secs = from_body.or_else(|| {
            self.retry_after_header
                .as_deref()
                .and_then(|h| h.trim().parse::<f64>().ok())
        })?;
        // Negative, NaN, or too large for a Duration reads as "no hint".
        Duration::try_from_secs_f64(secs).ok()
    }
}

/// Seam between the notifier logic and the network.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform the request. `Err` means no complete response was received
    /// (connect failure, timeout, truncated body); any HTTP status is `Ok`.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// `reqwest`-backed transport.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Patch => self.client.patch(&request.url),
        }
        .timeout(request.timeout);

        if let Some(auth) = &request.authorization {
            builder = builder.header(reqwest::header::AUTHORIZATION, auth);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let retry_after_header = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .context("failed to read response body")?;

        Ok(ApiResponse {
            status,
            retry_after_header,
            body,
        })
    }
}
