//! Capability traits composed by endpoint types.
//!
//! Instead of a combinatorial hierarchy of collection/element/bulk/paged
//! interfaces, each endpoint kind implements exactly the small capability
//! traits its resource supports. Generic consumers (sync jobs, view
//! models) can then accept `impl Readable<T>` and friends.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::endpoint::{CollectionEndpoint, ElementEndpoint};
use crate::error::Result;
use crate::range::{ElementRange, PartialResponse};

/// A resource whose current state can be read.
#[async_trait]
pub trait Readable<T> {
    /// Read the resource's current state.
    async fn read(&self) -> Result<T>;
}

/// A resource that can be replaced with a new state.
#[async_trait]
pub trait Writable<T> {
    /// Replace the resource, returning the server's representation of the
    /// stored state when the response carries one.
    async fn set(&self, entity: &T) -> Result<Option<T>>;
}

/// A collection resource supporting ranged reads.
#[async_trait]
pub trait RangeReadable<T> {
    /// Read a sub-range of the collection's elements.
    async fn read_range(&self, range: ElementRange) -> Result<PartialResponse<T>>;
}

/// A collection resource supporting bulk writes.
#[async_trait]
pub trait BulkWritable<T> {
    /// Add or update elements without touching the rest.
    async fn create_all(&self, entities: &[T]) -> Result<()>;

    /// Replace the entire collection.
    async fn set_all(&self, entities: &[T]) -> Result<()>;
}

#[async_trait]
impl<T> Readable<T> for ElementEndpoint<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn read(&self) -> Result<T> {
        ElementEndpoint::read(self).await
    }
}

#[async_trait]
impl<T> Writable<T> for ElementEndpoint<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn set(&self, entity: &T) -> Result<Option<T>> {
        ElementEndpoint::set(self, entity).await
    }
}

#[async_trait]
impl<T, E> Readable<Vec<T>> for CollectionEndpoint<T, E>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn read(&self) -> Result<Vec<T>> {
        self.read_all().await
    }
}

#[async_trait]
impl<T, E> RangeReadable<T> for CollectionEndpoint<T, E>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn read_range(&self, range: ElementRange) -> Result<PartialResponse<T>> {
        CollectionEndpoint::read_range(self, range).await
    }
}

#[async_trait]
impl<T, E> BulkWritable<T> for CollectionEndpoint<T, E>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn create_all(&self, entities: &[T]) -> Result<()> {
        CollectionEndpoint::create_all(self, entities).await
    }

    async fn set_all(&self, entities: &[T]) -> Result<()> {
        CollectionEndpoint::set_all(self, entities).await
    }
}
