//! The transport seam and everything that talks HTTP.
//!
//! `Transport` is the trait that all HTTP access goes through. `HttpTransport` implements it with
//! `reqwest`, `TestTransport` implements it in memory. A `TransportChain` holds a primary
//! transport followed by fallbacks and is what the rest of the crate sends requests through.

mod endpoints;
mod http;
mod test_transport;

pub use endpoints::{probe, Candidate, Endpoints, ProbeKind, Resolution, Shape};
pub use http::HttpTransport;
pub use test_transport::{Reply, TestTransport};

use crate::error::SyncError;
use crate::{Config, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{trace, warn};

const CONTENT_TYPE: &str = "Content-Type";
const AUTHORIZATION: &str = "Authorization";
const APPLICATION_JSON: &str = "application/json";

/// Selects real HTTP or the in-memory fake backend.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Http,
    Testing,
}

impl Mode {
    /// `Mode::Testing` when `VICCOIN_SYNC_IN_TEST_MODE` is set and non-empty.
    pub fn from_env() -> Self {
        match std::env::var("VICCOIN_SYNC_IN_TEST_MODE") {
            Ok(v) if !v.is_empty() => Mode::Testing,
            _ => Mode::Http,
        }
    }
}

/// Builds the transport chain for `mode`: one `HttpTransport` per configured transport, or a
/// single `TestTransport` backed by the fake backend.
pub fn transport_chain(config: &Config, mode: Mode) -> Result<TransportChain> {
    match mode {
        Mode::Http => TransportChain::from_config(config),
        Mode::Testing => Ok(TransportChain::single(Arc::new(
            TestTransport::with_fake_backend(),
        ))),
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
}

serde_plain::derive_display_from_serialize!(Method);

/// One fully built request. Headers are explicit per call.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: vec![(CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string())],
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// A request with a JSON body.
    pub fn with_body(method: Method, url: impl Into<String>, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(method, url)
        }
    }

    /// Attaches `Authorization: Bearer <token>` when a token is given.
    pub fn bearer(mut self, token: Option<&str>) -> Self {
        if let Some(token) = token {
            self.headers
                .push((AUTHORIZATION.to_string(), format!("Bearer {token}")));
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_auth(&self) -> bool {
        self.header(AUTHORIZATION).is_some()
    }
}

/// What came back. The body is kept as text so that callers can report it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as JSON, or `None` when it is empty or not JSON.
    pub fn json(&self) -> Option<Value> {
        if self.body.trim().is_empty() {
            return None;
        }
        serde_json::from_str(&self.body).ok()
    }
}

/// A failure below HTTP: no status code was received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("The request timed out")]
    Timeout,
    #[error("{0}")]
    Failed(String),
}

/// Sends a request and reports what came back. Implementations must not retry.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Shows up in logs.
    fn name(&self) -> &str;

    async fn send(
        &self,
        request: &HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

/// A primary transport followed by fallbacks. A request only moves on to the next transport when
/// the current one failed below HTTP; any HTTP response, including a 500, is final. Only
/// mutations use the fallbacks: reads and probes go through `send_primary`.
#[derive(Clone)]
pub struct TransportChain {
    transports: Vec<Arc<dyn Transport>>,
}

impl TransportChain {
    pub fn new(transports: Vec<Arc<dyn Transport>>) -> Self {
        Self { transports }
    }

    pub fn single(transport: Arc<dyn Transport>) -> Self {
        Self::new(vec![transport])
    }

    /// One `HttpTransport` per entry in the config, in order.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transports = config
            .transports()
            .iter()
            .map(|settings| {
                HttpTransport::new(settings).map(|t| Arc::new(t) as Arc<dyn Transport>)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(transports))
    }

    pub fn names(&self) -> Vec<&str> {
        self.transports.iter().map(|t| t.name()).collect()
    }

    /// Sends through the primary, then each fallback in turn while the failures are below HTTP.
    pub async fn send(
        &self,
        request: &HttpRequest,
    ) -> std::result::Result<HttpResponse, SyncError> {
        send_through(&self.transports, request).await
    }

    /// Sends through the primary transport only.
    pub async fn send_primary(
        &self,
        request: &HttpRequest,
    ) -> std::result::Result<HttpResponse, SyncError> {
        send_through(self.transports.get(..1).unwrap_or_default(), request).await
    }
}

async fn send_through(
    transports: &[Arc<dyn Transport>],
    request: &HttpRequest,
) -> std::result::Result<HttpResponse, SyncError> {
    let mut last_error = SyncError::network("No transports are configured");
    for (ix, transport) in transports.iter().enumerate() {
        trace!(
            "{} {} via '{}'",
            request.method,
            request.url,
            transport.name()
        );
        match transport.send(request).await {
            Ok(response) => {
                trace!("'{}' answered {}", transport.name(), response.status);
                return Ok(response);
            }
            Err(e) => {
                if ix + 1 < transports.len() {
                    warn!(
                        "Transport '{}' failed for {} {}: {e}. Trying the next one",
                        transport.name(),
                        request.method,
                        request.url
                    );
                } else {
                    warn!(
                        "Transport '{}' failed for {} {}: {e}",
                        transport.name(),
                        request.method,
                        request.url
                    );
                }
                last_error = SyncError::network(e.to_string());
            }
        }
    }
    Err(last_error)
}

impl std::fmt::Debug for TransportChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportChain")
            .field("transports", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_headers() {
        let r = HttpRequest::get("http://x/api/").bearer(Some("abc"));
        assert_eq!(r.header("content-type"), Some("application/json"));
        assert_eq!(r.header("Authorization"), Some("Bearer abc"));
        assert!(!HttpRequest::get("http://x").bearer(None).has_auth());
    }

    #[test]
    fn test_response_json() {
        assert!(HttpResponse::new(200, "").json().is_none());
        assert!(HttpResponse::new(200, "<html>").json().is_none());
        assert_eq!(HttpResponse::new(201, "{\"a\":1}").json(), Some(json!({"a": 1})));
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
    }

    #[tokio::test]
    async fn test_chain_falls_back_on_network_error_only() {
        let primary = Arc::new(TestTransport::new("primary"));
        primary.on(Method::Get, "/down", Reply::Network("connection reset".into()));
        primary.on(Method::Get, "/broken", Reply::Status(500, json!({"message": "x"})));
        let alternate = Arc::new(TestTransport::new("alternate"));
        alternate.on(Method::Get, "/", Reply::Status(200, json!({"ok": true})));

        let chain = TransportChain::new(vec![
            primary.clone() as Arc<dyn Transport>,
            alternate.clone() as Arc<dyn Transport>,
        ]);

        let down = chain.send(&HttpRequest::get("http://x/down")).await.unwrap();
        assert_eq!(down.status, 200);
        assert_eq!(alternate.call_count(), 1);

        let broken = chain.send(&HttpRequest::get("http://x/broken")).await.unwrap();
        assert_eq!(broken.status, 500);
        assert_eq!(alternate.call_count(), 1);
        assert_eq!(primary.call_count(), 2);
    }

    #[tokio::test]
    async fn test_chain_reports_last_network_error() {
        let only = Arc::new(TestTransport::new("only"));
        only.on(Method::Post, "/", Reply::Network("dns failure".into()));
        let chain = TransportChain::single(only);
        let err = chain
            .send(&HttpRequest::with_body(Method::Post, "http://x/", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::network("dns failure"));
    }

    #[tokio::test]
    async fn test_empty_chain_is_network_error() {
        let chain = TransportChain::new(Vec::new());
        let err = chain.send(&HttpRequest::get("http://x")).await.unwrap_err();
        assert!(err.is_network());
        let err = chain.send_primary(&HttpRequest::get("http://x")).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_send_primary_skips_fallbacks() {
        let primary = Arc::new(TestTransport::new("primary"));
        primary.on(Method::Get, "/", Reply::Network("connection reset".into()));
        let alternate = Arc::new(TestTransport::new("alternate"));
        alternate.on(Method::Get, "/", Reply::Status(200, json!({"ok": true})));
        let chain = TransportChain::new(vec![
            primary.clone() as Arc<dyn Transport>,
            alternate.clone() as Arc<dyn Transport>,
        ]);

        let err = chain
            .send_primary(&HttpRequest::get("http://x/a"))
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::network("connection reset"));
        assert_eq!(primary.call_count(), 1);
        assert_eq!(alternate.call_count(), 0);
    }
}
