//! Endpoint for a collection of elements.
//!
//! Supports whole-collection reads (cached like element reads), ranged
//! reads for pagination, element creation, bulk writes, and navigation to
//! individual element endpoints via the `child` link template.

use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;

use reqwest::header::{IF_MATCH, RANGE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{cached_get, CacheSlot};
use crate::endpoint::{ElementEndpoint, Endpoint};
use crate::error::{Error, Result};
use crate::range::{ElementRange, PartialResponse};

/// Relation type of the element-addressing link template.
const CHILD_REL: &str = "child";

/// Range unit used when none is configured.
const DEFAULT_RANGE_UNIT: &str = "elements";

/// Endpoint for a collection of `T` elements whose individual elements are
/// exposed as endpoints of type `E`.
///
/// `E` is produced by a factory supplied at construction time, so derived
/// element endpoint types plug in without any runtime type lookup.
pub struct CollectionEndpoint<T, E = ElementEndpoint<T>> {
    endpoint: Endpoint,
    cache: Arc<CacheSlot>,
    element_factory: Arc<dyn Fn(Endpoint) -> E + Send + Sync>,
    range_unit: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T, E> Clone for CollectionEndpoint<T, E> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            cache: Arc::clone(&self.cache),
            element_factory: Arc::clone(&self.element_factory),
            range_unit: self.range_unit.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T, E> std::fmt::Debug for CollectionEndpoint<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionEndpoint")
            .field("uri", self.endpoint.uri())
            .field("range_unit", &self.range_unit)
            .finish()
    }
}

impl<T: 'static> CollectionEndpoint<T> {
    /// Wrap an endpoint as a collection of `T` with plain
    /// [`ElementEndpoint`] elements.
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_element_factory(endpoint, ElementEndpoint::new)
    }
}

impl<T, E> CollectionEndpoint<T, E> {
    /// Wrap an endpoint as a collection whose element endpoints are built
    /// by `factory`. Unless the endpoint already carries a `child`
    /// template, elements are addressed as `./{id}` below the collection
    /// URI.
    pub fn with_element_factory<F>(endpoint: Endpoint, factory: F) -> Self
    where
        F: Fn(Endpoint) -> E + Send + Sync + 'static,
    {
        let endpoint = if endpoint.get_link_template(CHILD_REL).is_none() {
            endpoint.with_default_template(CHILD_REL, "./{id}")
        } else {
            endpoint
        };
        Self {
            endpoint,
            cache: Arc::new(CacheSlot::default()),
            element_factory: Arc::new(factory),
            range_unit: DEFAULT_RANGE_UNIT.to_owned(),
            _entity: PhantomData,
        }
    }

    /// Use a different range unit token for `Range`/`Content-Range`.
    pub fn with_range_unit(mut self, unit: impl Into<String>) -> Self {
        self.range_unit = unit.into();
        self
    }

    /// The underlying endpoint, for navigation and capability queries.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether the server allows creating elements here. `None` = unknown.
    pub fn create_allowed(&self) -> Option<bool> {
        self.endpoint.is_method_allowed(&Method::POST)
    }

    /// Whether the server allows replacing the whole collection.
    /// `None` = unknown.
    pub fn set_all_allowed(&self) -> Option<bool> {
        self.endpoint.is_method_allowed(&Method::PUT)
    }

    /// Whether the server allows bulk upserts. `None` = unknown.
    pub fn create_all_allowed(&self) -> Option<bool> {
        self.endpoint.is_method_allowed(&Method::PATCH)
    }

    /// The element endpoint for the element with the given ID, addressed
    /// through the `child` link template. Performs no I/O unless the
    /// server overrode the template and it has not been discovered yet.
    pub async fn get(&self, id: impl Display) -> Result<E> {
        let id = id.to_string();
        let uri = self
            .endpoint
            .resolve_template(CHILD_REL, &[("id", &id)])
            .await?;
        Ok((self.element_factory)(self.endpoint.at(uri)))
    }
}

impl<T, E> CollectionEndpoint<T, E>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Read all elements. Conditional when a cached snapshot exists.
    pub async fn read_all(&self) -> Result<Vec<T>> {
        let bytes = cached_get(&self.endpoint, &self.cache).await?;
        serde_json::from_slice(&bytes).map_err(Error::from)
    }

    /// Read a range of elements.
    ///
    /// The returned [`PartialResponse`] carries the server-reported
    /// content range; it is `None` when the server ignored range
    /// semantics. An unsatisfiable range fails with
    /// [`Error::RangeNotSatisfiable`], which callers like the streaming
    /// loop can distinguish from "truly missing".
    pub async fn read_range(&self, range: ElementRange) -> Result<PartialResponse<T>> {
        let request = self
            .endpoint
            .request(Method::GET)
            .header(RANGE, range.to_header(&self.range_unit));
        let response = self.endpoint.send(request).await?;
        let elements = serde_json::from_slice(&response.body)?;
        Ok(PartialResponse {
            elements,
            range: response.content_range(&self.range_unit),
        })
    }

    /// Create a new element in the collection.
    ///
    /// Returns an element endpoint for the created element when the
    /// server reports its address in a `Location` header.
    pub async fn create(&self, entity: &T) -> Result<Option<E>> {
        self.cache.clear();
        let request = self.endpoint.request(Method::POST).json(entity);
        let response = self.endpoint.send(request).await?;
        Ok(response
            .location(self.endpoint.uri())?
            .map(|uri| (self.element_factory)(self.endpoint.at(uri))))
    }

    /// Bulk create-or-update: adds the given elements to the collection
    /// without replacing the ones not mentioned.
    pub async fn create_all(&self, entities: &[T]) -> Result<()> {
        self.cache.clear();
        let request = self.endpoint.request(Method::PATCH).json(&entities);
        self.endpoint.send(request).await.map(|_| ())
    }

    /// Replace the entire collection.
    ///
    /// Guarded by the cached validator from a prior [`Self::read_all`]
    /// the same way element writes are; a lost update fails with
    /// [`Error::Conflict`].
    pub async fn set_all(&self, entities: &[T]) -> Result<()> {
        let validator = self.cache.take_validator();
        let mut request = self.endpoint.request(Method::PUT).json(&entities);
        if let Some(etag) = validator {
            request = request.header(IF_MATCH, etag);
        }
        self.endpoint.send(request).await.map(|_| ())
    }
}
