//! Shared session context for endpoint trees.
//!
//! A [`RestClient`] bundles the HTTP transport with the credential material
//! and custom headers every request carries. Endpoints hold it by cheap
//! clone; the whole tree shares one connection pool.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Url};

use crate::error::{Error, Result};

struct ClientInner {
    http: Client,
    bearer_token: Option<String>,
    custom_headers: Vec<(String, String)>,
}

/// Shared HTTP session context: transport, credentials, and custom headers.
///
/// Cloning is cheap and shares the underlying connection pool. Transport
/// policy (timeouts, TLS, pooling) lives here and in the underlying
/// `reqwest` client; the endpoint engine itself carries none.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<ClientInner>,
}

impl RestClient {
    /// Create a session context with default transport settings and no
    /// credentials.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http: Client::new(),
                bearer_token: None,
                custom_headers: Vec::new(),
            }),
        }
    }

    /// Start building a session context with explicit transport settings.
    pub fn builder() -> RestClientBuilder {
        RestClientBuilder::default()
    }

    /// Build a request for the given method and URL with the session's
    /// credentials and custom headers applied.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self.inner.http.request(method, url);
        if let Some(token) = &self.inner.bearer_token {
            builder = builder.bearer_auth(token);
        }
        for (key, value) in &self.inner.custom_headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder
    }

    pub(crate) async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        self.inner.http.execute(request).await.map_err(Error::from)
    }
}

impl Default for RestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("has_bearer_token", &self.inner.bearer_token.is_some())
            .field("custom_headers", &self.inner.custom_headers.len())
            .finish()
    }
}

/// Builder for [`RestClient`].
#[derive(Debug, Default)]
pub struct RestClientBuilder {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    bearer_token: Option<String>,
    custom_headers: Vec<(String, String)>,
    accept_invalid_certs: bool,
}

impl RestClientBuilder {
    /// Overall request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Connection establishment timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Bearer token sent as `Authorization: Bearer <token>` on every
    /// request. Token acquisition is the caller's concern.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Add a custom header sent on every request.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((key.into(), value.into()));
        self
    }

    /// Accept self-signed TLS certificates.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Build the session context.
    pub fn build(self) -> Result<RestClient> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(RestClient {
            inner: Arc::new(ClientInner {
                http,
                bearer_token: self.bearer_token,
                custom_headers: self.custom_headers,
            }),
        })
    }
}
