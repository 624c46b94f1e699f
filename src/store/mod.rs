//! Document store adapter
//!
//! The cascade engine never talks to MongoDB directly; it goes through the
//! `DocumentStore` trait so the same scan/policy/cleanup logic runs against
//! the production database and the in-memory store used in dev mode and tests.
//!
//! The trait mirrors the primitives the hosted store actually offers: read
//! queries, single-document patches, single-document deletes, and batched
//! multi-document transactions with a hard mutation-count ceiling. There is
//! no cascading-delete primitive - that is what `crate::cascade` exists for.

pub mod memory;
pub mod mongo_store;

use async_trait::async_trait;
use bson::{doc, Document};

use crate::types::Result;

pub use memory::MemoryStore;
pub use mongo_store::MongoStore;

/// Hard ceiling on mutations per store transaction
pub const TXN_MAX_MUTATIONS: usize = 200;

/// Deletes are not transactional; they are chunked at this size and each
/// chunk's deletes issued as parallel individual calls
pub const DELETE_CHUNK_SIZE: usize = 50;

/// Maximum number of ids passed to a single `$in` query
pub const QUERY_ID_CHUNK_SIZE: usize = 50;

/// A single write against the store
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Apply an update document (`$set` / `$unset`) to one document
    Patch {
        collection: &'static str,
        id: String,
        update: Document,
    },
    /// Remove one document
    Delete {
        collection: &'static str,
        id: String,
    },
}

impl Mutation {
    pub fn is_delete(&self) -> bool {
        matches!(self, Mutation::Delete { .. })
    }

    pub fn target_id(&self) -> &str {
        match self {
            Mutation::Patch { id, .. } => id,
            Mutation::Delete { id, .. } => id,
        }
    }
}

/// Storage primitives the cascade engine is written against
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a read query against one collection
    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>>;

    /// Fetch a single document by id
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let mut hits = self.find(collection, doc! { "_id": id }).await?;
        Ok(hits.pop())
    }

    /// Patch one document. Returns false if no document matched.
    async fn patch_one(&self, collection: &str, id: &str, update: Document) -> Result<bool>;

    /// Delete one document. Returns false if no document matched.
    ///
    /// Implementations backed by a store with native reference integrity
    /// return `WardenError::ReferenceConflict` when surviving documents still
    /// point at the target.
    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool>;

    /// Commit a batch of mutations as one transaction.
    ///
    /// Fails with `WardenError::BatchTooLarge` above `TXN_MAX_MUTATIONS`.
    /// The batch commits or fails as a unit; callers chunk and tolerate
    /// per-batch failure (see `cascade::batch`).
    async fn commit_batch(&self, mutations: &[Mutation]) -> Result<()>;
}
