//! Request executor with retry and backoff.

use anyhow::{Context, Result as AnyResult};
use log::{debug, error, warn};
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER},
};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::classify::{classify_status, classify_transport};
use super::decode::decode_body;
use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::config::ApiKey;
use crate::error::{HuefyError, Result};

/// Client identifier sent with every request.
pub const USER_AGENT: &str = concat!("huefy-rust/", env!("HUEFY_VERSION"));

const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One logical API call: method, path below the base URL and optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub body: Option<Map<String, Value>>,
    /// Accept an empty success body as `{}`.
    pub allow_empty: bool,
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
            allow_empty: false,
        }
    }

    pub fn post(path: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
            allow_empty: false,
        }
    }

    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }
}

/// Connection settings fixed for the lifetime of an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientOptions {
    /// Options for `base_url` with a 30 second timeout and the default retry policy.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry = RetryPolicy::with_attempts(attempts);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Executes API calls, retrying transient failures with exponential backoff.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Builds a client that authenticates every request with `api_key`.
    pub fn new(api_key: &ApiKey, options: &ClientOptions) -> AnyResult<Self> {
        let mut headers = HeaderMap::new();
        let mut key_value =
            HeaderValue::from_str(api_key.expose()).context("API key is not a valid header value")?;
        key_value.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers);
        // Zero means no timeout
        if !options.timeout.is_zero() {
            builder = builder.timeout(options.timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        debug!(
            "Huefy client for {} (timeout {:?}, {} attempts)",
            options.base_url,
            options.timeout,
            options.retry.total_attempts()
        );

        Ok(Self {
            client,
            base_url: options.base_url.clone(),
            policy: options.retry,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replaces the backoff sleep, e.g. to observe delays in tests.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs one logical call to completion.
    pub async fn execute(&self, request: &RequestSpec) -> Result<Value> {
        self.execute_with_cancel(request, None).await
    }

    /// Runs one logical call, giving up early once `cancel` fires.
    ///
    /// The token is checked before every attempt and raced against every
    /// backoff sleep. An attempt already in flight runs to its own timeout.
    #[tracing::instrument(skip(self, request, cancel), fields(path = %request.path))]
    pub async fn execute_with_cancel(
        &self,
        request: &RequestSpec,
        cancel: Option<&CancellationToken>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, request.path);
        let total = self.policy.total_attempts();
        let mut attempt: u32 = 0;
        let mut last_error: Option<HuefyError> = None;

        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                debug!("{}: cancelled before attempt {}", request.path, attempt + 1);
                return Err(HuefyError::Cancelled {
                    attempts: attempt,
                    last: last_error.map(Box::new),
                });
            }

            debug!("{:?} {} (attempt {}/{})", request.method, url, attempt + 1, total);

            let err = match self.send_once(&url, request).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() {
                debug!("{}: non-retryable error: {}", request.path, err);
                return Err(err);
            }

            attempt += 1;

            if attempt >= total {
                if !self.policy.retries_enabled() {
                    return Err(err);
                }
                error!(
                    "Huefy API request to {} failed after {} attempts: {}",
                    request.path, attempt, err
                );
                return Err(HuefyError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                "Huefy API request to {} failed ({}), attempt {}/{}, retrying in {}ms",
                request.path,
                err,
                attempt,
                total,
                delay.as_millis()
            );

            let cancelled = match cancel {
                Some(token) => {
                    tokio::select! {
                        _ = self.sleeper.sleep(delay) => false,
                        _ = token.cancelled() => true,
                    }
                }
                None => {
                    self.sleeper.sleep(delay).await;
                    false
                }
            };

            if cancelled {
                debug!("{}: cancelled during backoff", request.path);
                return Err(HuefyError::Cancelled {
                    attempts: attempt,
                    last: Some(Box::new(err)),
                });
            }

            last_error = Some(err);
        }
    }

    /// Single HTTP attempt without retry.
    async fn send_once(&self, url: &str, request: &RequestSpec) -> Result<Value> {
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify_transport)?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(classify_transport)?;

        if status.is_success() {
            let allow_empty = request.allow_empty || status == StatusCode::NO_CONTENT;
            return decode_body(Some(status.as_u16()), &body, allow_empty);
        }

        Err(classify_status(status, retry_after.as_deref(), &body))
    }
}
