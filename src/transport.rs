//! Request/response transport
//!
//! Producers and actions talk to the backend through the [`Transport`] trait,
//! an opaque `method + path (+ query, body) → JSON` capability that may fail.
//!
//! - [`HttpTransport`]: `reqwest`-backed implementation against a base URL
//! - [`ScriptedTransport`]: canned responses with optional latency, for demos
//!   and tests
//!
//! No timeout is applied unless one is configured with
//! [`HttpTransport::with_timeout`]; a hung request stays pending.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::OrchestratorError;

/// HTTP verb used by the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read.
    Get,
    /// Update.
    Put,
    /// Delete.
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Verb.
    pub method: Method,
    /// Path relative to the backend root, may carry its own query string.
    pub path: String,
    /// Extra query parameters.
    pub query: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl Request {
    /// Request with no query parameters and no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Append a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Asynchronous request/response capability.
///
/// Implementations must be thread-safe (Send + Sync); the trait is
/// object-safe so it can be shared as `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and decode the JSON response.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::Network`] if the request fails or the status is not 2xx
    /// - [`OrchestratorError::Parse`] if the body is not JSON
    async fn send(&self, request: Request) -> Result<Value, OrchestratorError>;

    /// `method path` with an optional body.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, OrchestratorError> {
        let mut request = Request::new(method, path);
        request.body = body;
        self.send(request).await
    }

    /// `GET path`.
    async fn get(&self, path: &str) -> Result<Value, OrchestratorError> {
        self.request(Method::Get, path, None).await
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// `reqwest`-backed transport rooted at a base URL.
///
/// # Example
///
/// ```no_run
/// use tokio_live_orchestrator::{HttpTransport, Transport};
///
/// # async fn demo() -> Result<(), tokio_live_orchestrator::OrchestratorError> {
/// let transport = HttpTransport::new("http://localhost:5000");
/// let stats = transport.get("/admin/api/estadisticas").await?;
/// println!("{stats}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Create a transport for `base_url` (trailing slashes are ignored).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: None,
        }
    }

    /// Fail requests that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Value, OrchestratorError> {
        let url = self.url_for(&request.path);
        let mut builder = self.client.request(request.method.into(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            OrchestratorError::network(format!("{} {} failed: {}", request.method, url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::status(
                status.as_u16(),
                format!("{} {}: {}", request.method, request.path, error_text),
            ));
        }

        let bytes = response.bytes().await.map_err(|e| {
            OrchestratorError::network(format!("reading body of {} failed: {}", request.path, e))
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            OrchestratorError::Parse(format!("{} returned invalid JSON: {}", request.path, e))
        })
    }
}

// ============================================================================
// Scripted
// ============================================================================

#[derive(Clone)]
struct Script {
    delay: Duration,
    response: Result<Value, OrchestratorError>,
}

/// Transport answering from a table of canned responses.
///
/// Routes are matched on method and path (query string ignored). Unknown
/// routes fail with a 404 [`OrchestratorError::Network`]. Every request is
/// recorded for inspection.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    routes: Arc<DashMap<(Method, String), Script>>,
    calls: Arc<Mutex<Vec<Request>>>,
}

impl ScriptedTransport {
    /// Empty route table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method path` with `body` immediately.
    pub fn respond(&self, method: Method, path: &str, body: Value) -> &Self {
        self.respond_after(method, path, Duration::ZERO, body)
    }

    /// Answer `method path` with `body` after `delay`.
    pub fn respond_after(&self, method: Method, path: &str, delay: Duration, body: Value) -> &Self {
        self.script(method, path, delay, Ok(body))
    }

    /// Fail `method path` with `error` after `delay`.
    pub fn fail_after(
        &self,
        method: Method,
        path: &str,
        delay: Duration,
        error: OrchestratorError,
    ) -> &Self {
        self.script(method, path, delay, Err(error))
    }

    fn script(
        &self,
        method: Method,
        path: &str,
        delay: Duration,
        response: Result<Value, OrchestratorError>,
    ) -> &Self {
        self.routes
            .insert((method, route_key(path)), Script { delay, response });
        self
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().clone()
    }

    /// Requests received for `path` (query string ignored).
    pub fn calls_to(&self, path: &str) -> Vec<Request> {
        let key = route_key(path);
        self.calls
            .lock()
            .iter()
            .filter(|r| route_key(&r.path) == key)
            .cloned()
            .collect()
    }
}

fn route_key(path: &str) -> String {
    path.split('?').next().unwrap_or(path).to_string()
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: Request) -> Result<Value, OrchestratorError> {
        let key = (request.method, route_key(&request.path));
        self.calls.lock().push(request.clone());
        let script = self.routes.get(&key).map(|s| s.clone());
        match script {
            Some(script) => {
                if !script.delay.is_zero() {
                    tokio::time::sleep(script.delay).await;
                }
                script.response
            }
            None => Err(OrchestratorError::status(
                404,
                format!("{} {}: no route", request.method, request.path),
            )),
        }
    }
}
