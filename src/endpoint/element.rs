//! Endpoint for an individual resource element.
//!
//! Layers validator-based caching on top of the endpoint base: reads are
//! conditional (`If-None-Match`), writes are guarded (`If-Match`) so a
//! lost update surfaces as [`Error::Conflict`] instead of silently
//! clobbering someone else's change.

use std::marker::PhantomData;
use std::sync::Arc;

use reqwest::header::IF_MATCH;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::cache::{cached_get, CacheSlot};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

/// Default bound for [`ElementEndpoint::update`] retries on conflict.
const DEFAULT_UPDATE_RETRIES: usize = 3;

/// Endpoint for an individual resource element of type `T`.
pub struct ElementEndpoint<T> {
    endpoint: Endpoint,
    cache: Arc<CacheSlot>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for ElementEndpoint<T> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            cache: Arc::clone(&self.cache),
            _entity: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for ElementEndpoint<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementEndpoint")
            .field("uri", self.endpoint.uri())
            .finish()
    }
}

impl<T> ElementEndpoint<T> {
    /// Wrap an endpoint as an element endpoint.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            cache: Arc::new(CacheSlot::default()),
            _entity: PhantomData,
        }
    }

    /// Create an element endpoint relative to a referrer.
    pub fn from_referrer(referrer: &Endpoint, relative: &str) -> Result<Self> {
        Ok(Self::new(referrer.child(relative)?))
    }

    /// The underlying endpoint, for navigation and capability queries.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether the server allows replacing this element, according to the
    /// latest `Allow` header. `None` = unknown.
    pub fn set_allowed(&self) -> Option<bool> {
        self.endpoint.is_method_allowed(&Method::PUT)
    }

    /// Whether the server allows partial updates. `None` = unknown.
    pub fn merge_allowed(&self) -> Option<bool> {
        self.endpoint.is_method_allowed(&Method::PATCH)
    }

    /// Whether the server allows deleting this element. `None` = unknown.
    pub fn delete_allowed(&self) -> Option<bool> {
        self.endpoint.is_method_allowed(&Method::DELETE)
    }
}

impl<T> ElementEndpoint<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Read the element. Conditional when a cached snapshot exists: a 304
    /// answer is served from the cache without re-transferring the body.
    pub async fn read(&self) -> Result<T> {
        let bytes = cached_get(&self.endpoint, &self.cache).await?;
        serde_json::from_slice(&bytes).map_err(Error::from)
    }

    /// Whether the element currently exists, probed with a `HEAD` request.
    pub async fn exists(&self) -> Result<bool> {
        match self.endpoint.send(self.endpoint.request(Method::HEAD)).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Replace the element.
    ///
    /// When a cached snapshot exists its validator is sent as `If-Match`,
    /// so the write fails with [`Error::Conflict`] if the element changed
    /// since it was read. The snapshot is cleared before the request goes
    /// out; a failed write never leaves a stale cache behind.
    ///
    /// Returns the server's representation of the stored entity when the
    /// response carries one.
    pub async fn set(&self, entity: &T) -> Result<Option<T>> {
        let validator = self.cache.take_validator();
        let mut request = self.endpoint.request(Method::PUT).json(entity);
        if let Some(etag) = validator {
            request = request.header(IF_MATCH, etag);
        }
        let response = self.endpoint.send(request).await?;
        response.json_optional()
    }

    /// Apply a partial update (`PATCH`). Not guarded: the payload states
    /// only the fields to change.
    pub async fn merge(&self, entity: &T) -> Result<Option<T>> {
        self.cache.clear();
        let request = self.endpoint.request(Method::PATCH).json(entity);
        let response = self.endpoint.send(request).await?;
        response.json_optional()
    }

    /// Delete the element, guarded by the cached validator like
    /// [`ElementEndpoint::set`].
    pub async fn delete(&self) -> Result<()> {
        let validator = self.cache.take_validator();
        let mut request = self.endpoint.request(Method::DELETE);
        if let Some(etag) = validator {
            request = request.header(IF_MATCH, etag);
        }
        self.endpoint.send(request).await.map(|_| ())
    }

    /// Read-modify-write with optimistic concurrency, retried up to 3
    /// times on conflict.
    pub async fn update<F>(&self, modify: F) -> Result<Option<T>>
    where
        F: Fn(&mut T) + Send + Sync,
    {
        self.update_with_retries(modify, DEFAULT_UPDATE_RETRIES).await
    }

    /// Read-modify-write with optimistic concurrency.
    ///
    /// Reads the element, applies `modify`, and writes the result back
    /// guarded by the validator from the read. On [`Error::Conflict`] the
    /// cycle restarts from a fresh read, up to `max_retries` times. No
    /// other error kind is retried.
    pub async fn update_with_retries<F>(&self, modify: F, max_retries: usize) -> Result<Option<T>>
    where
        F: Fn(&mut T) + Send + Sync,
    {
        let mut retries = 0;
        loop {
            let mut entity = self.read().await?;
            modify(&mut entity);
            match self.set(&entity).await {
                Err(Error::Conflict { .. }) if retries < max_retries => {
                    retries += 1;
                    warn!(
                        uri = %self.endpoint.uri(),
                        retries,
                        max_retries,
                        "conflicting update, retrying from a fresh read"
                    );
                }
                result => return result,
            }
        }
    }
}
