//! Validator-based response caching.
//!
//! A [`ResponseCache`] is an immutable snapshot of one successful response:
//! its entity tag, content type, and body bytes. The snapshot doubles as
//! the conditional-re-fetch token (`If-None-Match`) and as the
//! optimistic-concurrency proof for guarded writes (`If-Match`). It is
//! never mutated in place, only replaced or cleared, so concurrent readers
//! always see a consistent (if slightly stale) snapshot.

use std::sync::{Arc, RwLock};

use bytes::Bytes;
use reqwest::header::IF_NONE_MATCH;
use reqwest::{Method, StatusCode};

use crate::endpoint::{Endpoint, RestResponse};
use crate::error::{Error, Result};

/// Immutable snapshot of a cached response.
#[derive(Debug, Clone)]
pub(crate) struct ResponseCache {
    etag: String,
    content_type: Option<String>,
    body: Bytes,
}

impl ResponseCache {
    /// Capture a snapshot from a response. Responses without a validator
    /// are not cacheable and yield `None`.
    fn capture(response: &RestResponse) -> Option<Self> {
        Some(Self {
            etag: response.etag()?.to_owned(),
            content_type: response.content_type().map(str::to_owned),
            body: response.body.clone(),
        })
    }

    pub(crate) fn etag(&self) -> &str {
        &self.etag
    }

    #[allow(dead_code)]
    pub(crate) fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// A fresh view of the cached bytes. `Bytes` clones share the
    /// underlying immutable buffer, so callers cannot corrupt the
    /// snapshot.
    fn body(&self) -> Bytes {
        self.body.clone()
    }
}

/// One endpoint's cache state: `Empty` or `Cached(snapshot)`, updated only
/// by wholesale replacement.
#[derive(Debug, Default)]
pub(crate) struct CacheSlot {
    current: RwLock<Option<Arc<ResponseCache>>>,
}

impl CacheSlot {
    pub(crate) fn get(&self) -> Option<Arc<ResponseCache>> {
        self.read_lock().clone()
    }

    /// Spend the cached validator for a guarded write. Clears the slot, so
    /// a failed write can never be retried against a stale snapshot.
    pub(crate) fn take_validator(&self) -> Option<String> {
        self.write_lock().take().map(|c| c.etag.clone())
    }

    pub(crate) fn clear(&self) {
        self.write_lock().take();
    }

    /// Replace the snapshot from a fresh response; clears instead when the
    /// response carries no validator.
    fn replace_from(&self, response: &RestResponse) {
        *self.write_lock() = ResponseCache::capture(response).map(Arc::new);
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, Option<Arc<ResponseCache>>> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Option<Arc<ResponseCache>>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Conditional GET through the endpoint's choke point.
///
/// Sends `If-None-Match` when a snapshot exists; a 304 hands back the
/// cached bytes unchanged, any other success replaces the snapshot, and an
/// error clears it.
pub(crate) async fn cached_get(endpoint: &Endpoint, slot: &CacheSlot) -> Result<Bytes> {
    let cached = slot.get();

    let mut request = endpoint.request(Method::GET);
    if let Some(cache) = &cached {
        request = request.header(IF_NONE_MATCH, cache.etag());
    }

    match endpoint.send(request).await {
        Ok(response) if response.status == StatusCode::NOT_MODIFIED => match cached {
            Some(cache) => Ok(cache.body()),
            // A 304 can only answer a conditional request, and we only send
            // one while holding a snapshot.
            None => Err(Error::Transport {
                status: Some(StatusCode::NOT_MODIFIED.as_u16()),
                message: "304 Not Modified without a cached representation".into(),
            }),
        },
        Ok(response) => {
            slot.replace_from(&response);
            Ok(response.body)
        }
        Err(e) => {
            slot.clear();
            Err(e)
        }
    }
}
