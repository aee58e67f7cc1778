//! Abstract document store consumed by the engine.
//!
//! The engine never implements persistence itself. It drives whichever
//! backend provides these five primitives, and relies on them for every
//! correctness-sensitive write: counter movement goes through
//! [`DocumentStore::atomic_increment`], guarded state changes through
//! [`DocumentStore::compare_and_set`], and idempotency gates through
//! [`DocumentStore::insert`]. Caller-side read-modify-write of counters is
//! a lost-update hazard and is never used.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use bson::{Bson, Document};

/// Errors produced by store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No document with this id in the collection
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Insert hit an existing document (the idempotency-gate signal)
    #[error("document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    /// Compare-and-set precondition failed
    #[error("conflict on {collection}/{id}.{field}")]
    Conflict {
        collection: String,
        id: String,
        field: String,
    },

    /// Backend failure (connectivity, timeout); transient and retryable
    #[error("backend error: {0}")]
    Backend(String),
}

/// Minimal persistence contract, implementable by any document or
/// relational store with single-document atomicity.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Insert a document if absent; `AlreadyExists` otherwise.
    async fn insert(
        &self,
        collection: &str,
        id: &str,
        record: Document,
    ) -> Result<(), StoreError>;

    /// Server-side atomic add of signed deltas to numeric fields.
    /// Absent fields are treated as zero.
    async fn atomic_increment(
        &self,
        collection: &str,
        id: &str,
        deltas: Document,
    ) -> Result<(), StoreError>;

    /// Set `field` to `new` only if it currently equals `expected`.
    async fn compare_and_set(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: Bson,
        new: Bson,
    ) -> Result<(), StoreError>;

    /// All documents whose top-level fields equal the filter's values.
    async fn query(&self, collection: &str, filter: Document) -> Result<Vec<Document>, StoreError>;
}
