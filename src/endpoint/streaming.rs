//! Long-poll streaming over range pagination.
//!
//! Turns a paginated collection into a push-like element stream without
//! any server support for long-lived connections: keep issuing open-ended
//! range reads, treat "range not satisfiable" as "no new data yet", and
//! advance the cursor past the last served element.

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::endpoint::{CollectionEndpoint, ElementEndpoint};
use crate::error::{Error, Result};
use crate::range::ElementRange;

/// Poll delay used when the server has no new data yet.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Endpoint producing unbounded element streams from a paginated
/// collection.
pub struct StreamingCollectionEndpoint<T, E = ElementEndpoint<T>> {
    collection: CollectionEndpoint<T, E>,
    poll_interval: Duration,
}

impl<T, E> Clone for StreamingCollectionEndpoint<T, E> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            poll_interval: self.poll_interval,
        }
    }
}

impl<T, E> std::fmt::Debug for StreamingCollectionEndpoint<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingCollectionEndpoint")
            .field("uri", self.collection.endpoint().uri())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl<T, E> StreamingCollectionEndpoint<T, E> {
    /// Stream elements from the given collection endpoint.
    pub fn new(collection: CollectionEndpoint<T, E>) -> Self {
        Self {
            collection,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Delay between polls while the server reports no new data.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The underlying collection endpoint.
    pub fn collection(&self) -> &CollectionEndpoint<T, E> {
        &self.collection
    }
}

struct StreamState<T, E> {
    collection: CollectionEndpoint<T, E>,
    poll_interval: Duration,
    cursor: i64,
    pending: VecDeque<T>,
    done: bool,
}

impl<T, E> StreamingCollectionEndpoint<T, E>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    E: 'static,
{
    /// Produce a lazy, cancellable, unbounded stream of elements.
    ///
    /// `start_index >= 0` starts at that absolute offset;
    /// `start_index < 0` starts at the last `|start_index|` elements.
    /// Every call starts its own independent cursor; a consumed stream is
    /// not restartable. Dropping the stream cancels it; the loop yields to
    /// the runtime between polls, so cancellation is observed before each
    /// re-poll.
    ///
    /// An unsatisfiable range means "no new data yet": the stream sleeps
    /// for the poll interval and asks again. Any other error is emitted
    /// and ends the stream. The stream completes normally when the server
    /// stops reporting a content range, or when it reports a known total
    /// length that has been fully delivered.
    pub fn get_stream(&self, start_index: i64) -> BoxStream<'static, Result<T>> {
        let state = StreamState {
            collection: self.collection.clone(),
            poll_interval: self.poll_interval,
            cursor: start_index,
            pending: VecDeque::new(),
            done: false,
        };

        stream::try_unfold(state, |mut state| async move {
            loop {
                if let Some(element) = state.pending.pop_front() {
                    return Ok(Some((element, state)));
                }
                if state.done {
                    return Ok(None);
                }

                let range = if state.cursor >= 0 {
                    ElementRange::open(state.cursor as u64)
                } else {
                    ElementRange::tail(state.cursor.unsigned_abs())
                };

                match state.collection.read_range(range).await {
                    Ok(partial) => {
                        match partial.range {
                            // The server ignored range semantics or left
                            // the upper bound open: nothing to advance
                            // from, so the stream ends after this batch.
                            None => state.done = true,
                            Some(range) => match (range.to, range.length) {
                                (Some(to), Some(length)) if to + 1 >= length => {
                                    state.done = true;
                                }
                                (Some(to), _) => {
                                    // Advance past the last element the
                                    // server actually served, which may be
                                    // fewer than requested.
                                    state.cursor = (to + 1) as i64;
                                }
                                (None, _) => state.done = true,
                            },
                        }
                        state.pending.extend(partial.elements);
                    }
                    Err(Error::RangeNotSatisfiable { .. }) => {
                        debug!(
                            uri = %state.collection.endpoint().uri(),
                            cursor = state.cursor,
                            "no new elements yet, polling again"
                        );
                        tokio::time::sleep(state.poll_interval).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
        .boxed()
    }
}
