//! Resilient outbound HTTP client
//!
//! Requests name a service from a small [`ServiceRegistry`] instead of carrying
//! absolute URLs. Each call is validated up front and then executed with a
//! bounded, constant-delay retry policy:
//!
//! ```text
//! attempt 0 ──► 2xx/3xx ─► success
//!     │         4xx ─────► failure (never retried)
//!     │         5xx / transport error
//!     ▼
//! sleep(retry_delay) ─► attempt 1 ─► ... ─► attempt max_retries ─► failure
//! ```
//!
//! Attempts are strictly sequential. A failed call keeps the status code and
//! error text of its last attempt so callers can tell a 4xx from an exhausted
//! 5xx or an unreachable host.

pub mod error;
pub mod request;

pub use error::{FetchError, FetchResult};
pub use request::{DISCORD, Method, PreparedRequest, Request, ServiceRegistry};

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn};

use crate::util::redact_path;

/// Optional explicit header set for the convenience methods
pub type Headers = Option<BTreeMap<String, String>>;

/// Terminal result of one logical call, possibly after retries
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code of the last attempt, `None` if no response was received
    pub code: Option<u16>,
    pub success: bool,
    pub data: Vec<u8>,
    /// Number of transmissions made
    pub attempts: u32,
    /// Error of the last failed attempt
    pub error: Option<String>,
}

impl Response {
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.data)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Executes requests against registered services
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Validate and execute `request`.
    ///
    /// Returns `Err` only for validation failures; every network outcome,
    /// including exhausted retries, is a [`Response`].
    async fn fetch(&self, request: Request) -> FetchResult<Response>;

    async fn get(&self, service: &str, path: &str, headers: Headers) -> FetchResult<Response> {
        let mut request = Request::new(service, path, Method::Get);
        request.headers = headers;
        self.fetch(request).await
    }

    async fn post(
        &self,
        service: &str,
        path: &str,
        body: Option<serde_json::Value>,
        headers: Headers,
    ) -> FetchResult<Response> {
        let mut request = Request::new(service, path, Method::Post);
        request.headers = headers;
        request.body = body;
        self.fetch(request).await
    }

    async fn put(
        &self,
        service: &str,
        path: &str,
        body: Option<serde_json::Value>,
        headers: Headers,
    ) -> FetchResult<Response> {
        let mut request = Request::new(service, path, Method::Put);
        request.headers = headers;
        request.body = body;
        self.fetch(request).await
    }

    async fn delete(&self, service: &str, path: &str, headers: Headers) -> FetchResult<Response> {
        let mut request = Request::new(service, path, Method::Delete);
        request.headers = headers;
        self.fetch(request).await
    }

    async fn patch(
        &self,
        service: &str,
        path: &str,
        body: Option<serde_json::Value>,
        headers: Headers,
    ) -> FetchResult<Response> {
        let mut request = Request::new(service, path, Method::Patch);
        request.headers = headers;
        request.body = body;
        self.fetch(request).await
    }
}

/// Constant-delay retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(10),
        }
    }
}

/// Outcome of a single transmission
#[derive(Debug)]
enum Attempt {
    Completed { status: StatusCode, data: Vec<u8> },
    Failed { status: Option<StatusCode>, error: String },
}

impl Attempt {
    fn status(&self) -> Option<StatusCode> {
        match self {
            Attempt::Completed { status, .. } => Some(*status),
            Attempt::Failed { status, .. } => *status,
        }
    }

    fn is_success(&self) -> bool {
        matches!(self, Attempt::Completed { status, .. } if !status.is_client_error() && !status.is_server_error())
    }

    /// Client errors are final, retrying will not change the answer
    fn is_permanent(&self) -> bool {
        self.status().is_some_and(|status| status.is_client_error())
    }

    fn into_response(self, attempts: u32) -> Response {
        let success = self.is_success();
        match self {
            Attempt::Completed { status, data } => Response {
                code: Some(status.as_u16()),
                success,
                error: (!success).then(|| format!("HTTP error: {status}")),
                data,
                attempts,
            },
            Attempt::Failed { status, error } => Response {
                code: status.map(|status| status.as_u16()),
                success: false,
                data: Vec::new(),
                attempts,
                error: Some(error),
            },
        }
    }
}

/// [`Fetcher`] with validation against a service registry and bounded retry
#[derive(Debug, Clone)]
pub struct ResilientClient {
    client: reqwest::Client,
    registry: ServiceRegistry,
    policy: RetryPolicy,
    timeout: Duration,
}

impl ResilientClient {
    /// Create a client; a zero retry delay falls back to one second.
    pub fn new(
        registry: ServiceRegistry,
        mut policy: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        if policy.retry_delay.is_zero() {
            warn!("invalid retry delay provided, defaulting to 1 second");
            policy.retry_delay = Duration::from_secs(1);
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        info!(
            retries = policy.max_retries,
            retry_delay_ms = policy.retry_delay.as_millis() as u64,
            services = registry.len(),
            "outbound client initialized"
        );

        Ok(Self {
            client,
            registry,
            policy,
            timeout,
        })
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn execute(&self, request: &PreparedRequest) -> Attempt {
        // the body is consumed on send, so every attempt gets its own copy
        let mut builder = self
            .client
            .request(request.method.to_reqwest(), &request.url)
            .headers(request.headers.clone())
            .timeout(self.timeout);

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let started = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    duration_ms = started.elapsed().as_millis() as u64,
                    "request failed: {e}"
                );
                return Attempt::Failed {
                    status: None,
                    error: e.to_string(),
                };
            }
        };

        let status = response.status();
        debug!(
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "response received"
        );

        match response.bytes().await {
            Ok(data) => Attempt::Completed {
                status,
                data: data.to_vec(),
            },
            Err(e) => {
                error!(status = status.as_u16(), "failed to read response body: {e}");
                Attempt::Failed {
                    status: Some(status),
                    error: e.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl Fetcher for ResilientClient {
    #[instrument(skip_all, fields(service = %request.service, method = %request.method))]
    async fn fetch(&self, request: Request) -> FetchResult<Response> {
        let prepared = request.prepare(&self.registry).inspect_err(|e| {
            error!("request validation failed: {e}");
        })?;

        let path = redact_path(&prepared.path);
        debug!(%path, max_retries = self.policy.max_retries, "starting request execution");

        let mut attempt_no = 0;
        loop {
            if attempt_no > 0 {
                warn!(
                    %path,
                    retry_delay_ms = self.policy.retry_delay.as_millis() as u64,
                    "retrying request (attempt {attempt_no}/{})",
                    self.policy.max_retries
                );
                tokio::time::sleep(self.policy.retry_delay).await;
            }

            let attempt = self.execute(&prepared).await;
            let attempts = attempt_no + 1;

            if attempt.is_success() {
                debug!(%path, attempts, "request completed successfully");
                return Ok(attempt.into_response(attempts));
            }

            if attempt.is_permanent() {
                warn!(%path, status = ?attempt.status(), "client error, not retrying");
                return Ok(attempt.into_response(attempts));
            }

            if attempt_no >= self.policy.max_retries {
                error!(%path, attempts, "all request attempts failed");
                return Ok(attempt.into_response(attempts));
            }

            attempt_no += 1;
        }
    }
}
