//! Batch executor
//!
//! Splits an arbitrarily large mutation list into chunks the store will
//! accept: patches go through size-limited transactions (at most
//! `TXN_MAX_MUTATIONS` per commit), deletes are not transactional in this
//! store and are chunked at `DELETE_CHUNK_SIZE` with each chunk's deletes
//! issued as parallel individual calls.
//!
//! Chunks commit independently. A failed chunk is recorded by index and the
//! run continues - the cascade's cleanup is best-effort per batch, and a
//! failed cosmetic cleanup (say, a stale pin) must never stop the cascade
//! from reaching the terminal delete.

use futures::future::join_all;
use tracing::warn;

use crate::store::{DocumentStore, Mutation, DELETE_CHUNK_SIZE, TXN_MAX_MUTATIONS};

/// Result of one executor run
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Mutations successfully committed
    pub committed: usize,
    /// Indices (within this run) of chunks that failed
    pub failed_chunks: Vec<usize>,
    /// Total chunks submitted
    pub chunk_count: usize,
}

/// Commits mutation lists against a store in independent chunks
pub struct BatchExecutor<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Execute all mutations. Never fails as a whole; per-chunk failures are
    /// reported in the outcome.
    pub async fn execute(&self, mutations: Vec<Mutation>) -> BatchOutcome {
        let (deletes, patches): (Vec<Mutation>, Vec<Mutation>) =
            mutations.into_iter().partition(|m| m.is_delete());

        let mut outcome = BatchOutcome::default();

        for chunk in patches.chunks(TXN_MAX_MUTATIONS) {
            let index = outcome.chunk_count;
            outcome.chunk_count += 1;
            match self.store.commit_batch(chunk).await {
                Ok(()) => outcome.committed += chunk.len(),
                Err(e) => {
                    warn!(chunk = index, size = chunk.len(), error = %e, "Patch chunk failed");
                    outcome.failed_chunks.push(index);
                }
            }
        }

        for chunk in deletes.chunks(DELETE_CHUNK_SIZE) {
            let index = outcome.chunk_count;
            outcome.chunk_count += 1;

            let results = join_all(chunk.iter().map(|m| async move {
                match m {
                    Mutation::Delete { collection, id } => {
                        self.store.delete_one(collection, id).await
                    }
                    // Partition guarantees deletes only
                    Mutation::Patch { .. } => unreachable!("patch in delete chunk"),
                }
            }))
            .await;

            let mut chunk_failed = false;
            for (m, result) in chunk.iter().zip(results) {
                match result {
                    Ok(_) => outcome.committed += 1,
                    Err(e) => {
                        warn!(chunk = index, id = m.target_id(), error = %e, "Delete failed");
                        chunk_failed = true;
                    }
                }
            }
            if chunk_failed {
                outcome.failed_chunks.push(index);
            }
        }

        outcome
    }
}

/// Number of chunks needed for `total` items at `size` per chunk
pub fn chunk_count(total: usize, size: usize) -> usize {
    total.div_ceil(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{Result, WardenError};
    use async_trait::async_trait;
    use bson::{doc, Document};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn patch(id: &str) -> Mutation {
        Mutation::Patch {
            collection: "tasks",
            id: id.to_string(),
            update: doc! { "$set": { "isArchived": true } },
        }
    }

    fn delete(id: &str) -> Mutation {
        Mutation::Delete {
            collection: "tasks",
            id: id.to_string(),
        }
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(0, 200), 0);
        assert_eq!(chunk_count(1, 200), 1);
        assert_eq!(chunk_count(200, 200), 1);
        assert_eq!(chunk_count(201, 200), 2);
        assert_eq!(chunk_count(450, 200), 3);
        assert_eq!(chunk_count(120, 50), 3);
    }

    #[tokio::test]
    async fn test_patches_split_at_transaction_ceiling() {
        let store = MemoryStore::new();
        for i in 0..450 {
            store.insert("tasks", doc! { "_id": format!("t{i}"), "name": "chore" });
        }

        let mutations: Vec<Mutation> = (0..450).map(|i| patch(&format!("t{i}"))).collect();
        let outcome = BatchExecutor::new(&store).execute(mutations).await;

        assert_eq!(outcome.chunk_count, 3);
        assert_eq!(outcome.committed, 450);
        assert!(outcome.failed_chunks.is_empty());
        assert!(store.get("tasks", "t449").unwrap().get_bool("isArchived").unwrap());
    }

    #[tokio::test]
    async fn test_deletes_chunk_at_fifty() {
        let store = MemoryStore::new();
        for i in 0..120 {
            store.insert("tasks", doc! { "_id": format!("t{i}"), "name": "chore" });
        }

        let mutations: Vec<Mutation> = (0..120).map(|i| delete(&format!("t{i}"))).collect();
        let outcome = BatchExecutor::new(&store).execute(mutations).await;

        assert_eq!(outcome.chunk_count, 3);
        assert_eq!(outcome.committed, 120);
        assert_eq!(store.count("tasks"), 0);
    }

    /// Wraps a real store and fails chosen commit calls, by call order
    struct FlakyStore {
        inner: MemoryStore,
        commits: AtomicUsize,
        fail_commit: usize,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>> {
            self.inner.find(collection, filter).await
        }
        async fn patch_one(&self, collection: &str, id: &str, update: Document) -> Result<bool> {
            self.inner.patch_one(collection, id, update).await
        }
        async fn delete_one(&self, collection: &str, id: &str) -> Result<bool> {
            self.inner.delete_one(collection, id).await
        }
        async fn commit_batch(&self, mutations: &[Mutation]) -> Result<()> {
            let call = self.commits.fetch_add(1, Ordering::SeqCst);
            if call == self.fail_commit {
                return Err(WardenError::Database("transaction aborted".to_string()));
            }
            self.inner.commit_batch(mutations).await
        }
    }

    #[tokio::test]
    async fn test_failed_chunk_does_not_stop_later_chunks() {
        let inner = MemoryStore::new();
        for i in 0..450 {
            inner.insert("tasks", doc! { "_id": format!("t{i}"), "name": "chore" });
        }
        let store = FlakyStore {
            inner,
            commits: AtomicUsize::new(0),
            fail_commit: 1, // second chunk fails
        };

        let mutations: Vec<Mutation> = (0..450).map(|i| patch(&format!("t{i}"))).collect();
        let outcome = BatchExecutor::new(&store).execute(mutations).await;

        assert_eq!(outcome.chunk_count, 3);
        assert_eq!(outcome.failed_chunks, vec![1]);
        // Chunks 0 and 2 still committed: 200 + 50
        assert_eq!(outcome.committed, 250);
        // First chunk applied, second did not, third did
        assert!(store.inner.get("tasks", "t0").unwrap().get_bool("isArchived").unwrap());
        assert!(store.inner.get("tasks", "t250").unwrap().get_bool("isArchived").is_err());
        assert!(store.inner.get("tasks", "t449").unwrap().get_bool("isArchived").unwrap());
    }

    #[tokio::test]
    async fn test_mixed_mutations_patches_before_deletes() {
        let store = MemoryStore::new();
        store.insert("tasks", doc! { "_id": "t1", "name": "keep" });
        store.insert("tasks", doc! { "_id": "t2", "name": "drop" });

        let outcome = BatchExecutor::new(&store)
            .execute(vec![patch("t1"), delete("t2")])
            .await;

        assert_eq!(outcome.chunk_count, 2);
        assert_eq!(outcome.committed, 2);
        assert!(store.get("tasks", "t2").is_none());
        assert!(store.get("tasks", "t1").unwrap().get_bool("isArchived").unwrap());
    }
}
