//! HTTP transport used by credential providers and vault clients
//!
//! Everything that talks to the network goes through the [`HttpClient`]
//! trait, so tests can swap in a stub and the binary can share one
//! [`ReqwestClient`] (and its connection pool) across every caller.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Per-request timeout applied by [`ReqwestClient`] unless configured otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by the transport itself (no HTTP response was obtained)
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The underlying client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// Sending the request failed (connection refused, DNS, timeout, TLS...)
    #[error("request to {url} failed: {message}")]
    Request {
        /// Requested URL
        url: String,
        /// Error message from the transport
        message: String,
    },

    /// The response body could not be read
    #[error("failed to read response body from {url}: {message}")]
    Body {
        /// Requested URL
        url: String,
        /// Error message from the transport
        message: String,
    },
}

/// HTTP method subset needed by the vault and identity protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

/// A fully described outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method
    pub method: Method,
    /// Target URL, including the query string
    pub url: Url,
    /// Request headers in insertion order
    pub headers: Vec<(String, String)>,
    /// Already-encoded request body
    pub body: Option<String>,
}

impl HttpRequest {
    /// Create a `GET` request
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Create a `POST` request with an `application/x-www-form-urlencoded` body
    #[must_use]
    pub fn post_form(url: Url, fields: &[(&str, &str)]) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        Self {
            method: Method::Post,
            url,
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(body),
        }
    }

    /// Append a header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header value (case-insensitive)
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Decode the form body back into key/value pairs
    #[must_use]
    pub fn form_fields(&self) -> Vec<(String, String)> {
        self.body
            .as_deref()
            .map(|body| {
                url::form_urlencoded::parse(body.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A received response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: StatusCode,
    /// Body decoded as text
    pub body: String,
}

impl HttpResponse {
    /// Build a response from a status code and a body
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// `200 OK` with the given body
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body)
    }
}

/// "Send a request, receive a response"
///
/// Implementations must not retry and must not interpret the status code;
/// callers decide what a non-200 response means.
pub trait HttpClient: Send + Sync {
    /// Send the request and wait for the complete response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response could be obtained.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking [`HttpClient`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Create a client that enforces `timeout` on every request
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let inner = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vaultenv/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.to_string();
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.inner.request(method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().map_err(|e| TransportError::Request {
            url: url.clone(),
            message: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().map_err(|e| TransportError::Body {
            url,
            message: e.to_string(),
        })?;

        tracing::trace!(status = %status, "received HTTP response");
        Ok(HttpResponse { status, body })
    }
}
