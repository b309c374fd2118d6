#![warn(missing_docs)]
//! # spamguard-dispatch
//!
//! ## Purpose
//! Single choke point through which every outbound request to the spam
//! service passes.
//!
//! ## Responsibilities
//! - Attach the bearer credential from the [`SessionStore`] when present.
//! - Apply JSON content negotiation and merge caller headers, with the
//!   authorization header always winning.
//! - Parse every response body as JSON, including error responses.
//! - Normalize failures into [`DispatchError`].
//!
//! ## Data flow
//! Client call -> [`RequestDispatcher::call`] builds a [`TransportRequest`] ->
//! [`HttpTransport::send`] -> [`TransportResponse`] -> JSON value or error.
//!
//! ## Ownership and lifetimes
//! The dispatcher owns `Arc` handles to its transport and session store, so
//! clones are cheap and can move into spawned refresh tasks.
//!
//! ## Error model
//! Nothing is recovered here. Transport failures become
//! [`DispatchError::Network`]; non-2xx statuses become
//! [`DispatchError::Http`] with the body's `error` field or
//! [`GENERIC_ERROR_MESSAGE`]. No schema validation is performed on success.
//!
//! ## Security and privacy notes
//! Header values and bodies are never logged; the authorization header is
//! marked sensitive.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use spamguard_session::SessionStore;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Base URL used when `API_URL` is not configured.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Message used when an error response carries no `error` field.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Liveness probe path, relative to the base URL.
pub const HEALTH_PATH: &str = "/health";

const JSON_MEDIA_TYPE: &str = "application/json";

/// Fully-built request handed to a transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL including query string.
    pub url: Url,
    /// Final header set.
    pub headers: HeaderMap,
    /// Serialized JSON body.
    pub body: Option<Vec<u8>>,
}

/// Raw response returned by a transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// Response status.
    pub status: StatusCode,
    /// Undecoded body bytes.
    pub body: Vec<u8>,
}

/// Transport failure: no response was obtained.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Abstract HTTP transport used by the dispatcher.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends one request and returns the raw response.
    ///
    /// # Errors
    /// Returns [`TransportError`] for DNS, connection or I/O failures.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default client. No timeout is configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a preconfigured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| TransportError(error.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|error| TransportError(error.to_string()))?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Per-call options: method, query, extra headers and JSON body.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    method: Method,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Value>,
}

impl RequestOptions {
    /// `GET` without body.
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    /// `POST` with a JSON body.
    pub fn post(body: Value) -> Self {
        Self::new(Method::POST).with_body(body)
    }

    /// `DELETE` without body.
    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Options for an arbitrary method.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Appends one query parameter, forwarded verbatim.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Adds a caller header. An `Authorization` header set here is replaced
    /// whenever a session token is present.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the configured method.
    pub fn method(&self) -> &Method {
        &self.method
    }
}

/// Uniform request wrapper: credentials, JSON parsing, error normalization.
#[derive(Clone)]
pub struct RequestDispatcher {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
    session: Arc<dyn SessionStore>,
}

impl RequestDispatcher {
    /// Creates a dispatcher for a validated base URL.
    ///
    /// # Errors
    /// Returns [`DispatchError::InvalidEndpoint`] when `base_url` is not an
    /// absolute `http`/`https` URL.
    pub fn new(
        base_url: &str,
        transport: Arc<dyn HttpTransport>,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self, DispatchError> {
        Ok(Self {
            base_url: validate_base_url(base_url)?,
            transport,
            session,
        })
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the shared session store.
    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// Issues one request and returns the parsed JSON body verbatim.
    ///
    /// # Errors
    /// - [`DispatchError::Network`] when no response was obtained.
    /// - [`DispatchError::Http`] for non-2xx statuses.
    /// - [`DispatchError::Decode`] when a 2xx body is not JSON.
    pub async fn call(&self, endpoint: &str, options: RequestOptions) -> Result<Value, DispatchError> {
        let request = self.build_request(endpoint, options)?;
        let method = request.method.clone();
        let path = request.url.path().to_string();
        debug!(stage = "dispatch", action = "send", %method, %path, "dispatching request");

        let response = self.transport.send(request).await.map_err(|error| {
            warn!(stage = "dispatch", action = "network_failure", %method, %path, "transport failed");
            DispatchError::Network(error.0)
        })?;

        let status = response.status;
        let parsed = serde_json::from_slice::<Value>(&response.body);
        debug!(stage = "dispatch", action = "receive", %method, %path, status = status.as_u16(), "response received");

        if !status.is_success() {
            let message = parsed
                .ok()
                .as_ref()
                .and_then(|body| body.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());
            return Err(DispatchError::Http {
                status: status.as_u16(),
                message,
            });
        }

        parsed.map_err(|error| DispatchError::Decode(error.to_string()))
    }

    /// Probes `GET /health` without credentials.
    ///
    /// Returns `true` only for a 2xx response; every failure maps to `false`.
    pub async fn health(&self) -> bool {
        let Ok(url) = self.endpoint_url(HEALTH_PATH) else {
            return false;
        };

        let request = TransportRequest {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
        };

        match self.transport.send(request).await {
            Ok(response) => response.status.is_success(),
            Err(error) => {
                debug!(stage = "dispatch", action = "health", %error, "health probe failed");
                false
            }
        }
    }

    fn build_request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<TransportRequest, DispatchError> {
        let mut url = self.endpoint_url(endpoint)?;
        if !options.query.is_empty() {
            url.query_pairs_mut().extend_pairs(options.query.iter());
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MEDIA_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
        for (name, value) in &options.headers {
            headers.insert(name.clone(), value.clone());
        }

        // Invariant: caller headers never override or drop the credential.
        if let Some(token) = self.session.token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                DispatchError::InvalidHeader("session token is not a valid header value".to_string())
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let body = options
            .body
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|error| DispatchError::Encode(error.to_string()))?;

        Ok(TransportRequest {
            method: options.method,
            url,
            headers,
            body,
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, DispatchError> {
        let joined = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), endpoint);
        Url::parse(&joined)
            .map_err(|error| DispatchError::InvalidEndpoint(format!("{endpoint}: {error}")))
    }
}

/// Validates and normalizes the service base URL.
///
/// # Errors
/// Returns [`DispatchError::InvalidEndpoint`] for unparsable URLs, schemes
/// other than `http`/`https`, missing hosts, or URLs carrying a query or
/// fragment.
pub fn validate_base_url(raw: &str) -> Result<Url, DispatchError> {
    let parsed = Url::parse(raw.trim().trim_end_matches('/'))
        .map_err(|error| DispatchError::InvalidEndpoint(format!("invalid base url: {error}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DispatchError::InvalidEndpoint(
            "base url must use http or https".to_string(),
        ));
    }

    if parsed.host_str().is_none() {
        return Err(DispatchError::InvalidEndpoint(
            "base url must include a host".to_string(),
        ));
    }

    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(DispatchError::InvalidEndpoint(
            "base url must not carry a query or fragment".to_string(),
        ));
    }

    Ok(parsed)
}

/// Returns `true` when `url` uses HTTPS.
pub fn is_https(url: &Url) -> bool {
    url.scheme() == "https"
}

/// Returns `true` when `url` points at the local machine.
pub fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
        Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}

/// Dispatcher failures.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Transport failed before any response was obtained.
    #[error("network error: {0}")]
    Network(String),
    /// Non-success response; `message` comes from the body or the fallback.
    #[error("{message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Server-supplied or fallback message.
        message: String,
    },
    /// A success response body was not valid JSON.
    #[error("response decode failure: {0}")]
    Decode(String),
    /// The request body could not be serialized.
    #[error("request encode failure: {0}")]
    Encode(String),
    /// Endpoint or base URL is malformed.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// A header value could not be built.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

impl DispatchError {
    /// HTTP status for [`DispatchError::Http`], `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
