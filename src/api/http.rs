//! Implements the `Transport` trait with a `reqwest::Client`.

use crate::api::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use crate::config::TransportSettings;
use crate::Result;
use anyhow::Context;
use std::time::Duration;
use tracing::trace;

/// One configured `reqwest` client. Build one per `TransportSettings` entry.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    name: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if !settings.pooled {
            builder = builder.pool_max_idle_per_host(0);
        }
        if settings.http1_only {
            builder = builder.http1_only();
        }
        let client = builder
            .build()
            .with_context(|| format!("Unable to build the '{}' HTTP client", settings.name))?;
        Ok(Self {
            name: settings.name.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        request: &HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
        };

        let mut builder = self.client.request(method, &request.url).timeout(self.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| TransportError::Failed(format!("Unable to encode body: {e}")))?;
            builder = builder.body(bytes);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        trace!("{} {} -> {status}", request.method, request.url);
        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Failed(e.to_string())
    }
}
