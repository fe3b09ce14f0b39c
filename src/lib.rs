//! typed-rest - typed endpoint handles for hypermedia-driven REST APIs.
//!
//! This crate replaces raw URL strings and ad-hoc request building with
//! strongly-typed resource handles ("endpoints"): navigate a service
//! through the links and link templates it advertises, read and write
//! entities with validator-based caching and optimistic-concurrency
//! protection, paginate collections with element ranges, and consume
//! growing collections as long-poll streams.
//!
//! The engine delegates transport concerns (TLS, pooling, timeouts) to
//! `reqwest` and serialization to `serde`; it owns the protocol layer in
//! between: link resolution with lazy discovery, capability detection
//! from `Allow` headers, conditional reads and guarded writes, range
//! pagination, and error classification.
//!
//! ```no_run
//! use typed_rest::{CollectionEndpoint, Endpoint, RestClient};
//! # use serde::{Deserialize, Serialize};
//! # #[derive(Serialize, Deserialize)]
//! # struct Contact { id: u64, name: String }
//!
//! # async fn example() -> typed_rest::Result<()> {
//! let client = RestClient::builder().bearer_token("token").build()?;
//! let entry = Endpoint::new(client, "https://api.example.com/".parse()?);
//! let contacts: CollectionEndpoint<Contact> =
//!     CollectionEndpoint::new(entry.child("contacts")?);
//!
//! let all = contacts.read_all().await?;
//! let alice = contacts.get("alice").await?;
//! let entity = alice.read().await?;
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod link;
pub mod range;

mod cache;
mod template;

// Re-export key types
pub use capability::{BulkWritable, RangeReadable, Readable, Writable};
pub use client::{RestClient, RestClientBuilder};
pub use endpoint::{CollectionEndpoint, ElementEndpoint, Endpoint, StreamingCollectionEndpoint};
pub use error::{Error, Result};
pub use link::Link;
pub use range::{ContentRange, ElementRange, PartialResponse};
