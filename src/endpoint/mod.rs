//! Endpoint base: typed handles to HTTP resources.
//!
//! An [`Endpoint`] pairs one immutable resource URI with a shared
//! [`RestClient`] session context. Endpoints form a tree: children are
//! constructed by resolving a relative reference against their referrer,
//! inheriting the referrer's session. Construction is cheap and performs
//! no I/O.
//!
//! Every request an endpoint issues passes through one choke point
//! ([`Endpoint::send`]) which refreshes the endpoint's observed links,
//! link templates, and allowed-method set from the response before any
//! error classification, so that state always reflects the latest
//! response no matter which operation triggered it.

mod collection;
mod element;
mod streaming;

pub use collection::CollectionEndpoint;
pub use element::ElementEndpoint;
pub use streaming::StreamingCollectionEndpoint;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use reqwest::header::{self, HeaderMap};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::client::RestClient;
use crate::error::{classify, Error, Result};
use crate::link::{self, join_relative, Link, LinkExtraction};
use crate::range::ContentRange;
use crate::template;

/// State observed from the most recent response, replaced wholesale after
/// every request so concurrent readers only ever see a complete snapshot.
#[derive(Debug, Default)]
struct ObservedState {
    links: HashMap<String, Vec<Link>>,
    templates: HashMap<String, String>,
    /// Allowed methods from the `Allow` header; `None` while unknown.
    allow: Option<HashSet<Method>>,
}

/// A typed handle to one HTTP resource URI plus shared session context.
#[derive(Debug, Clone)]
pub struct Endpoint {
    uri: Url,
    client: RestClient,
    state: Arc<RwLock<Arc<ObservedState>>>,
    default_links: HashMap<String, Vec<Link>>,
    default_templates: HashMap<String, String>,
}

impl Endpoint {
    /// Create a root endpoint for an absolute URI.
    pub fn new(client: RestClient, uri: Url) -> Self {
        Self {
            uri,
            client,
            state: Arc::new(RwLock::new(Arc::new(ObservedState::default()))),
            default_links: HashMap::new(),
            default_templates: HashMap::new(),
        }
    }

    /// Create a child endpoint by resolving `relative` against this
    /// endpoint's URI. The child shares the session context but starts
    /// with fresh link state. No I/O.
    pub fn child(&self, relative: &str) -> Result<Endpoint> {
        Ok(self.at(join_relative(&self.uri, relative)?))
    }

    /// Create a sibling endpoint at an already-resolved URI, sharing this
    /// endpoint's session context.
    pub fn at(&self, uri: Url) -> Endpoint {
        Endpoint::new(self.client.clone(), uri)
    }

    /// The resource URI. Immutable for the lifetime of the endpoint.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// The shared session context.
    pub fn client(&self) -> &RestClient {
        &self.client
    }

    /// Register a default link used when the server has not advertised one
    /// for `rel`. Defaults are fixed at construction time.
    pub fn with_default_link(mut self, rel: &str, href: &str) -> Result<Self> {
        let target = join_relative(&self.uri, href)?;
        self.default_links
            .entry(rel.to_owned())
            .or_default()
            .push(Link {
                href: target,
                title: None,
            });
        Ok(self)
    }

    /// Register a default link template used when the server has not
    /// advertised one for `rel`.
    pub fn with_default_template(mut self, rel: &str, template: &str) -> Self {
        self.default_templates
            .insert(rel.to_owned(), template.to_owned());
        self
    }

    // --- Link resolution ---

    /// All currently known links for a relation type: links observed from
    /// the last response, falling back to the defaults, else empty.
    /// Never performs I/O.
    pub fn get_links(&self, rel: &str) -> Vec<Link> {
        let state = self.snapshot();
        if let Some(links) = state.links.get(rel) {
            return links.clone();
        }
        self.default_links.get(rel).cloned().unwrap_or_default()
    }

    /// The currently known link template for a relation type, observed or
    /// default. Never performs I/O.
    pub fn get_link_template(&self, rel: &str) -> Option<String> {
        let state = self.snapshot();
        state
            .templates
            .get(rel)
            .or_else(|| self.default_templates.get(rel))
            .cloned()
    }

    /// Resolve the first link for a relation type to its target URI.
    ///
    /// If no link is known, issues exactly one lazy `HEAD` request against
    /// this endpoint's own URI to populate the link cache, then retries
    /// the lookup once. Fails with [`Error::LinkNotFound`] if the relation
    /// type is still absent.
    pub async fn resolve_link(&self, rel: &str) -> Result<Url> {
        if let Some(link) = self.get_links(rel).into_iter().next() {
            return Ok(link.href);
        }
        self.discover().await?;
        self.get_links(rel)
            .into_iter()
            .next()
            .map(|link| link.href)
            .ok_or_else(|| Error::LinkNotFound { rel: rel.to_owned() })
    }

    /// Resolve the link template for a relation type, expanding it with
    /// `variables` and joining the result against this endpoint's URI.
    ///
    /// Performs the same single lazy `HEAD` discovery as
    /// [`Endpoint::resolve_link`] when no template is known.
    pub async fn resolve_template(&self, rel: &str, variables: &[(&str, &str)]) -> Result<Url> {
        let template = match self.get_link_template(rel) {
            Some(template) => template,
            None => {
                self.discover().await?;
                self.get_link_template(rel)
                    .ok_or_else(|| Error::LinkNotFound { rel: rel.to_owned() })?
            }
        };
        join_relative(&self.uri, &template::expand(&template, variables)?)
    }

    /// Lazy link discovery: one `HEAD` against our own URI, through the
    /// choke point so it refreshes the observed state.
    async fn discover(&self) -> Result<()> {
        debug!(uri = %self.uri, "lazy HEAD link discovery");
        self.send(self.request(Method::HEAD)).await.map(|_| ())
    }

    // --- Capability flags ---

    /// Whether the server allows a method on this resource, according to
    /// the `Allow` header of the most recent response. `None` means
    /// unknown: no response yet, or the server omitted the header.
    /// Consumers should treat unknown as "try it", not as `false`.
    pub fn is_method_allowed(&self, method: &Method) -> Option<bool> {
        self.snapshot()
            .allow
            .as_ref()
            .map(|allow| allow.contains(method))
    }

    // --- Request handling ---

    /// Build a request against this endpoint's URI with the session's
    /// credentials applied.
    pub fn request(&self, method: Method) -> RequestBuilder {
        self.client.request(method, self.uri.clone())
    }

    /// The single choke point every request passes through.
    ///
    /// Sends the request, buffers the body, atomically replaces the
    /// observed link/template/allow state from the response, and
    /// classifies error statuses. 304 is not an error; it answers
    /// conditional reads.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<RestResponse> {
        let request = request.build()?;
        debug!(method = %request.method(), url = %request.url(), "sending request");
        let response = self.client.execute(request).await?;
        self.handle(response).await
    }

    async fn handle(&self, response: reqwest::Response) -> Result<RestResponse> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(Error::from)?;
        debug!(status = %status, uri = %self.uri, "handling response");

        let extracted = link::extract(&self.uri, &headers, &body);
        self.install_state(extracted, parse_allow(&headers));

        if !status.is_success() && status != StatusCode::NOT_MODIFIED {
            return Err(classify(status, &body));
        }

        Ok(RestResponse {
            status,
            headers,
            body,
        })
    }

    /// Atomically replace the whole observed state.
    fn install_state(&self, extracted: LinkExtraction, allow: Option<HashSet<Method>>) {
        let state = Arc::new(ObservedState {
            links: extracted.links,
            templates: extracted.templates,
            allow,
        });
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn snapshot(&self) -> Arc<ObservedState> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn parse_allow(headers: &HeaderMap) -> Option<HashSet<Method>> {
    let value = headers.get(header::ALLOW)?.to_str().ok()?;
    Some(
        value
            .split(',')
            .filter_map(|token| token.trim().parse::<Method>().ok())
            .collect(),
    )
}

/// A fully buffered response as handed out by the choke point.
#[derive(Debug, Clone)]
pub(crate) struct RestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RestResponse {
    pub fn etag(&self) -> Option<&str> {
        self.headers.get(header::ETAG)?.to_str().ok()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE)?.to_str().ok()
    }

    pub fn content_range(&self, unit: &str) -> Option<ContentRange> {
        let value = self.headers.get(header::CONTENT_RANGE)?.to_str().ok()?;
        ContentRange::parse(value, unit)
    }

    /// The `Location` header resolved against the request URI.
    pub fn location(&self, base: &Url) -> Result<Option<Url>> {
        let Some(value) = self.headers.get(header::LOCATION) else {
            return Ok(None);
        };
        let value = value.to_str().map_err(|e| Error::Transport {
            status: Some(self.status.as_u16()),
            message: format!("invalid Location header: {e}"),
        })?;
        join_relative(base, value).map(Some)
    }

    /// Deserialize the body, or `None` when the server sent none.
    pub fn json_optional<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if self.body.is_empty() || self.status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&self.body)?))
    }
}
