//! In-memory document store
//!
//! Used in dev mode (no MongoDB required) and as the test double for the
//! cascade engine. Implements the subset of query/update operators the
//! engine emits: path equality with array traversal, `$or`, `$in`, `$ne`,
//! `$exists` for filters, and `$set` / `$unset` for updates.
//!
//! Unlike MongoDB, this store enforces reference integrity on deletes the
//! way the workspace's original hosted store did: `delete_one` refuses to
//! remove a document that other documents still point at, reporting the
//! offending holder ids.

use async_trait::async_trait;
use bson::{Bson, Document};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::store::{DocumentStore, Mutation, TXN_MAX_MUTATIONS};
use crate::types::{Result, WardenError};

type Collections = HashMap<String, HashMap<String, Document>>;

/// In-memory document store keyed by collection name and document id
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document. The document must carry a string `_id`.
    pub fn insert(&self, collection: &str, doc: Document) {
        let id = doc
            .get_str("_id")
            .expect("MemoryStore documents require a string _id")
            .to_string();
        let mut collections = self.collections.write().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, doc);
    }

    /// Fetch a document by id without going through the async trait
    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        let collections = self.collections.read().unwrap();
        collections.get(collection).and_then(|c| c.get(id)).cloned()
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        let collections = self.collections.read().unwrap();
        collections.get(collection).map(|c| c.len()).unwrap_or(0)
    }

    /// Ids of documents that hold a reference to `id`, in any field, in any
    /// collection. Matches both loose shapes (bare id strings and documents
    /// with an `id` field) because `refers_to` compares raw values.
    fn referencing_ids(&self, collections: &Collections, id: &str) -> Vec<String> {
        let mut holders = Vec::new();
        for docs in collections.values() {
            for (holder_id, doc) in docs {
                if holder_id == id {
                    continue;
                }
                let holds_ref = doc
                    .iter()
                    .any(|(key, value)| key != "_id" && refers_to(value, id));
                if holds_ref {
                    holders.push(holder_id.clone());
                }
            }
        }
        holders.sort();
        holders
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>> {
        let collections = self.collections.read().unwrap();
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<Document> = docs
            .values()
            .filter(|doc| matches_filter(doc, &filter))
            .cloned()
            .collect();
        // Deterministic order for tests
        hits.sort_by(|a, b| a.get_str("_id").unwrap_or("").cmp(b.get_str("_id").unwrap_or("")));
        Ok(hits)
    }

    async fn patch_one(&self, collection: &str, id: &str, update: Document) -> Result<bool> {
        let mut collections = self.collections.write().unwrap();
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
        else {
            return Ok(false);
        };
        apply_update(doc, &update);
        Ok(true)
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool> {
        let mut collections = self.collections.write().unwrap();

        let exists = collections
            .get(collection)
            .map(|c| c.contains_key(id))
            .unwrap_or(false);
        if !exists {
            return Ok(false);
        }

        let holders = self.referencing_ids(&collections, id);
        if !holders.is_empty() {
            return Err(WardenError::ReferenceConflict {
                referencing_ids: holders,
            });
        }

        collections
            .get_mut(collection)
            .map(|c| c.remove(id).is_some())
            .map(Ok)
            .unwrap_or(Ok(false))
    }

    async fn commit_batch(&self, mutations: &[Mutation]) -> Result<()> {
        if mutations.len() > TXN_MAX_MUTATIONS {
            return Err(WardenError::BatchTooLarge {
                size: mutations.len(),
                limit: TXN_MAX_MUTATIONS,
            });
        }

        // Apply against a copy, swap on success - the batch commits as a unit
        let mut collections = self.collections.write().unwrap();
        let mut staged = collections.clone();

        for mutation in mutations {
            match mutation {
                Mutation::Patch {
                    collection,
                    id,
                    update,
                } => {
                    if let Some(doc) = staged
                        .get_mut(*collection)
                        .and_then(|c| c.get_mut(id.as_str()))
                    {
                        apply_update(doc, update);
                    }
                }
                Mutation::Delete { collection, id } => {
                    if let Some(c) = staged.get_mut(*collection) {
                        c.remove(id.as_str());
                    }
                }
            }
        }

        *collections = staged;
        Ok(())
    }
}

/// True when `value` (possibly nested) references the given id
fn refers_to(value: &Bson, id: &str) -> bool {
    match value {
        Bson::String(s) => s == id,
        Bson::Array(items) => items.iter().any(|v| refers_to(v, id)),
        Bson::Document(d) => d.iter().any(|(k, v)| k != "_id" && refers_to(v, id)),
        _ => false,
    }
}

// =============================================================================
// Filter matching
// =============================================================================

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$or" => match condition {
            Bson::Array(branches) => branches.iter().any(|branch| match branch {
                Bson::Document(f) => matches_filter(doc, f),
                _ => false,
            }),
            _ => false,
        },
        path => matches_condition(doc, path, condition),
    })
}

fn matches_condition(doc: &Document, path: &str, condition: &Bson) -> bool {
    let segments: Vec<&str> = path.split('.').collect();
    let mut candidates = Vec::new();
    let root = Bson::Document(doc.clone());
    resolve_path(&root, &segments, &mut candidates);

    if let Bson::Document(ops) = condition {
        if ops.keys().any(|k| k.starts_with('$')) {
            return ops.iter().all(|(op, operand)| match op.as_str() {
                "$in" => match operand {
                    Bson::Array(values) => values
                        .iter()
                        .any(|v| candidates.iter().any(|c| value_equals(c, v))),
                    _ => false,
                },
                "$ne" => !candidates.iter().any(|c| value_equals(c, operand)),
                "$exists" => {
                    let wants = operand.as_bool().unwrap_or(false);
                    wants == !candidates.is_empty()
                }
                // Unsupported operator: fail closed
                _ => false,
            });
        }
    }

    candidates.iter().any(|c| value_equals(c, condition))
}

/// Walk a dotted path, flattening arrays the way MongoDB does
fn resolve_path<'a>(value: &'a Bson, path: &[&str], out: &mut Vec<&'a Bson>) {
    if path.is_empty() {
        out.push(value);
        return;
    }
    match value {
        Bson::Document(d) => {
            if let Some(next) = d.get(path[0]) {
                resolve_path(next, &path[1..], out);
            }
        }
        Bson::Array(items) => {
            for item in items {
                resolve_path(item, path, out);
            }
        }
        _ => {}
    }
}

/// Equality with MongoDB's array-membership semantics
fn value_equals(candidate: &Bson, value: &Bson) -> bool {
    if candidate == value {
        return true;
    }
    if let Bson::Array(items) = candidate {
        return items.iter().any(|item| item == value);
    }
    false
}

// =============================================================================
// Update application
// =============================================================================

fn apply_update(doc: &mut Document, update: &Document) {
    for (op, operand) in update {
        let Bson::Document(fields) = operand else {
            continue;
        };
        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    set_path(doc, path, value.clone());
                }
            }
            "$unset" => {
                for (path, _) in fields {
                    unset_path(doc, path);
                }
            }
            _ => {}
        }
    }
}

fn set_path(doc: &mut Document, path: &str, value: Bson) {
    let mut segments = path.split('.').peekable();
    let mut current = doc;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment, value);
            return;
        }
        if !matches!(current.get(segment), Some(Bson::Document(_))) {
            current.insert(segment, Document::new());
        }
        let Some(Bson::Document(next)) = current.get_mut(segment) else {
            unreachable!("intermediate path segment was just inserted")
        };
        current = next;
    }
}

fn unset_path(doc: &mut Document, path: &str) {
    let mut segments = path.split('.').peekable();
    let mut current = doc;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.remove(segment);
            return;
        }
        match current.get_mut(segment) {
            Some(Bson::Document(next)) => current = next,
            _ => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn store_with_team() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert(
            "teams",
            doc! {
                "_id": "team1",
                "name": "Platform",
                "manager": "u1",
                "members": ["u1", { "id": "u2" }],
            },
        );
        store
    }

    #[tokio::test]
    async fn test_find_scalar_equality() {
        let store = store_with_team();
        let hits = store.find("teams", doc! { "manager": "u1" }).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(store
            .find("teams", doc! { "manager": "u2" })
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_find_array_membership_and_loose_shape() {
        let store = store_with_team();
        // Bare id element
        assert_eq!(
            store
                .find("teams", doc! { "members": "u1" })
                .await
                .unwrap()
                .len(),
            1
        );
        // Object element, matched via the `.id` path
        assert_eq!(
            store
                .find("teams", doc! { "members.id": "u2" })
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_find_or_and_in() {
        let store = store_with_team();
        let filter = doc! { "$or": [ { "manager": "u9" }, { "members": "u1" } ] };
        assert_eq!(store.find("teams", filter).await.unwrap().len(), 1);

        let filter = doc! { "_id": { "$in": ["team1", "team9"] } };
        assert_eq!(store.find("teams", filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_patch_set_and_unset() {
        let store = store_with_team();
        store
            .patch_one(
                "teams",
                "team1",
                doc! { "$set": { "members": ["u2"] }, "$unset": { "manager": "" } },
            )
            .await
            .unwrap();

        let team = store.get("teams", "team1").unwrap();
        assert!(team.get("manager").is_none());
        assert_eq!(
            team.get_array("members").unwrap(),
            &vec![Bson::String("u2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_set_nested_path() {
        let store = MemoryStore::new();
        store.insert("reports", doc! { "_id": "r1", "name": "Weekly" });
        store
            .patch_one("reports", "r1", doc! { "$set": { "filters.users": ["u2"] } })
            .await
            .unwrap();

        let report = store.get("reports", "r1").unwrap();
        let filters = report.get_document("filters").unwrap();
        assert_eq!(
            filters.get_array("users").unwrap(),
            &vec![Bson::String("u2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_delete_refused_while_referenced() {
        let store = store_with_team();
        store.insert("people", doc! { "_id": "u1", "name": "Ada" });

        let err = store.delete_one("people", "u1").await.unwrap_err();
        match err {
            WardenError::ReferenceConflict { referencing_ids } => {
                assert_eq!(referencing_ids, vec!["team1".to_string()]);
            }
            other => panic!("expected ReferenceConflict, got {other:?}"),
        }

        // Clear the references; delete now succeeds
        store
            .patch_one(
                "teams",
                "team1",
                doc! { "$set": { "members": [{ "id": "u2" }] }, "$unset": { "manager": "" } },
            )
            .await
            .unwrap();
        assert!(store.delete_one("people", "u1").await.unwrap());
        assert!(!store.delete_one("people", "u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_batch_ceiling() {
        let store = MemoryStore::new();
        let mutations: Vec<Mutation> = (0..TXN_MAX_MUTATIONS + 1)
            .map(|i| Mutation::Delete {
                collection: "tasks",
                id: format!("t{i}"),
            })
            .collect();

        let err = store.commit_batch(&mutations).await.unwrap_err();
        assert!(matches!(err, WardenError::BatchTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_commit_batch_applies_all() {
        let store = store_with_team();
        store.insert("teams", doc! { "_id": "team2", "name": "Design", "members": [] });

        store
            .commit_batch(&[
                Mutation::Patch {
                    collection: "teams",
                    id: "team1".to_string(),
                    update: doc! { "$set": { "name": "Platform Eng" } },
                },
                Mutation::Delete {
                    collection: "teams",
                    id: "team2".to_string(),
                },
            ])
            .await
            .unwrap();

        assert_eq!(
            store.get("teams", "team1").unwrap().get_str("name").unwrap(),
            "Platform Eng"
        );
        assert!(store.get("teams", "team2").is_none());
        assert_eq!(store.count("teams"), 1);
    }
}
