//! Reference scanner
//!
//! Finds every document that references a target entity, using the edge
//! registry's fixed field-path table. Independent edge queries fan out
//! concurrently and are joined; reverse lookups that need an id list first
//! (`resolve_kinds`) run sequentially. Id lists above the query chunk size
//! are split and the chunk queries parallelized, then unioned.
//!
//! A failed read is a scan failure and is fatal to the caller: partial scan
//! results must never be mistaken for "this entity has zero references".

use bson::{doc, Document};
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::debug;

use crate::cascade::registry::{self, EntityKind, RefEdge};
use crate::store::{DocumentStore, QUERY_ID_CHUNK_SIZE};
use crate::types::Result;

/// One document holding at least one reference to the scan target
#[derive(Debug, Clone)]
pub struct ReferenceHit {
    pub holder_id: String,
    /// Human-readable identifier for conflict reports (name, week label, id)
    pub display_name: String,
    /// Edge paths on this holder that reference the target
    pub paths: Vec<&'static str>,
    /// Holder document as read during the scan
    pub doc: Document,
}

/// Scan result: dependent documents grouped by kind
#[derive(Debug, Default)]
pub struct ReferenceHitSet {
    pub target_id: String,
    hits: BTreeMap<EntityKind, Vec<ReferenceHit>>,
}

impl ReferenceHitSet {
    fn new(target_id: &str) -> Self {
        Self {
            target_id: target_id.to_string(),
            hits: BTreeMap::new(),
        }
    }

    fn add(&mut self, edge: &RefEdge, doc: Document) {
        let Ok(holder_id) = doc.get_str("_id").map(|s| s.to_string()) else {
            return;
        };
        let entries = self.hits.entry(edge.holder).or_default();
        if let Some(existing) = entries.iter_mut().find(|h| h.holder_id == holder_id) {
            if !existing.paths.contains(&edge.path) {
                existing.paths.push(edge.path);
            }
            return;
        }
        entries.push(ReferenceHit {
            display_name: display_name(&doc, &holder_id),
            holder_id,
            paths: vec![edge.path],
            doc,
        });
    }

    /// Hits of one dependent kind
    pub fn hits_for(&self, kind: EntityKind) -> &[ReferenceHit] {
        self.hits.get(&kind).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Hits of one kind that reference the target through a specific path
    pub fn hits_for_path(&self, kind: EntityKind, path: &str) -> Vec<&ReferenceHit> {
        self.hits_for(kind)
            .iter()
            .filter(|h| h.paths.contains(&path))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.hits.values().map(|v| v.len()).sum()
    }
}

/// Scans the store for references to an entity
pub struct ReferenceScanner<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> ReferenceScanner<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Find every document referencing `target_id`, per the edge registry
    /// for `target_kind`. All edge queries are mutually independent and run
    /// concurrently.
    pub async fn scan(&self, target_id: &str, target_kind: EntityKind) -> Result<ReferenceHitSet> {
        let edges = registry::edges_for(target_kind);

        let queries = edges.iter().map(|edge| {
            let filter = loose_ref_filter(edge.path, target_id);
            async move {
                let docs = self.store.find(edge.holder.collection(), filter).await?;
                Ok::<_, crate::types::WardenError>((edge, docs))
            }
        });

        let mut hit_set = ReferenceHitSet::new(target_id);
        for result in join_all(queries).await {
            let (edge, docs) = result?;
            debug!(
                target = %target_id,
                holder = %edge.holder,
                path = edge.path,
                count = docs.len(),
                "Scanned reference edge"
            );
            for doc in docs {
                hit_set.add(edge, doc);
            }
        }

        Ok(hit_set)
    }

    /// Fetch documents by id. Id lists above the chunk size are split and
    /// the chunk queries issued in parallel, then unioned.
    pub async fn find_by_ids(&self, collection: &str, ids: &[String]) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = ids.chunks(QUERY_ID_CHUNK_SIZE).map(|chunk| {
            let filter = doc! { "_id": { "$in": chunk.to_vec() } };
            async move { self.store.find(collection, filter).await }
        });

        let mut out = Vec::new();
        for result in join_all(chunks).await {
            out.extend(result?);
        }
        Ok(out)
    }

    /// Resolve which kind each id belongs to. This is a dependent lookup
    /// (the id list comes from a prior store response), so collections are
    /// probed sequentially until every id is accounted for.
    pub async fn resolve_kinds(
        &self,
        ids: &[String],
    ) -> Result<Vec<(String, Option<EntityKind>)>> {
        let mut resolved: BTreeMap<String, Option<EntityKind>> =
            ids.iter().map(|id| (id.clone(), None)).collect();

        for kind in EntityKind::ALL {
            let remaining: Vec<String> = resolved
                .iter()
                .filter(|(_, v)| v.is_none())
                .map(|(k, _)| k.clone())
                .collect();
            if remaining.is_empty() {
                break;
            }
            for doc in self.find_by_ids(kind.collection(), &remaining).await? {
                if let Ok(id) = doc.get_str("_id") {
                    resolved.insert(id.to_string(), Some(kind));
                }
            }
        }

        // Preserve caller's id order
        Ok(ids
            .iter()
            .map(|id| (id.clone(), resolved.get(id).copied().flatten()))
            .collect())
    }
}

/// Filter matching a reference to `id` at `path`, in either loose shape
fn loose_ref_filter(path: &str, id: &str) -> Document {
    let mut bare = Document::new();
    bare.insert(path, id);
    let mut object = Document::new();
    object.insert(format!("{}.id", path), id);
    doc! { "_id": { "$ne": id }, "$or": [bare, object] }
}

/// Best human-readable label for a holder document
fn display_name(doc: &Document, fallback: &str) -> String {
    doc.get_str("name")
        .or_else(|_| doc.get_str("weekOf"))
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::WardenError;
    use async_trait::async_trait;
    use bson::Bson;

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert("people", doc! { "_id": "u1", "name": "Ada" });
        store.insert(
            "people",
            doc! { "_id": "u2", "name": "Grace", "pinnedBy": ["u1"] },
        );
        store.insert(
            "timesheets",
            doc! {
                "_id": "ts1",
                "user": "u1",
                "approvedBy": { "id": "u1" },
                "weekOf": "2024-03-04",
                "status": "approved",
                "entries": [],
            },
        );
        store.insert(
            "projects",
            doc! {
                "_id": "p1",
                "name": "Apollo",
                "projectManager": "u1",
                "assignedUsers": [ { "user": { "id": "u1" } }, { "user": "u3" } ],
                "tasks": ["t1"],
                "isActive": true,
            },
        );
        store.insert(
            "teams",
            doc! { "_id": "team1", "name": "Platform", "manager": "u9", "members": ["u1", "u3"] },
        );
        store.insert(
            "reports",
            doc! {
                "_id": "r1",
                "name": "Q1 hours",
                "createdBy": "u1",
                "filters": { "users": [ { "id": "u1" } ], "projects": [] },
            },
        );
        store
    }

    #[tokio::test]
    async fn test_scan_person_finds_all_kinds() {
        let store = seeded_store();
        let scanner = ReferenceScanner::new(&store);
        let hits = scanner.scan("u1", EntityKind::Person).await.unwrap();

        // Timesheet hit merges both paths onto one holder
        let ts = hits.hits_for(EntityKind::Timesheet);
        assert_eq!(ts.len(), 1);
        assert!(ts[0].paths.contains(&"user"));
        assert!(ts[0].paths.contains(&"approvedBy"));

        let projects = hits.hits_for(EntityKind::Project);
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].display_name, "Apollo");
        assert!(projects[0].paths.contains(&"assignedUsers.user"));
        assert!(projects[0].paths.contains(&"projectManager"));

        assert_eq!(hits.hits_for(EntityKind::Team).len(), 1);
        assert_eq!(hits.hits_for(EntityKind::Person).len(), 1);
        assert_eq!(hits.hits_for(EntityKind::Report).len(), 1);
        assert_eq!(hits.total(), 5);
    }

    #[tokio::test]
    async fn test_scan_excludes_unreferenced() {
        let store = seeded_store();
        let scanner = ReferenceScanner::new(&store);
        let hits = scanner.scan("u3", EntityKind::Person).await.unwrap();

        // u3 is assigned on p1 and a member of team1, nothing else
        assert_eq!(hits.hits_for(EntityKind::Project).len(), 1);
        assert_eq!(hits.hits_for(EntityKind::Team).len(), 1);
        assert!(hits.hits_for(EntityKind::Timesheet).is_empty());
        assert!(hits.hits_for(EntityKind::Report).is_empty());
    }

    #[tokio::test]
    async fn test_scan_task_edges() {
        let store = seeded_store();
        store.insert(
            "timesheets",
            doc! {
                "_id": "ts2",
                "user": "u3",
                "status": "submitted",
                "entries": [ { "task": "t1", "hours": 4.0 } ],
            },
        );

        let scanner = ReferenceScanner::new(&store);
        let hits = scanner.scan("t1", EntityKind::Task).await.unwrap();
        assert_eq!(hits.hits_for(EntityKind::Project).len(), 1);
        assert_eq!(hits.hits_for(EntityKind::Timesheet).len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_ids_chunks_and_unions() {
        let store = MemoryStore::new();
        let ids: Vec<String> = (0..120).map(|i| format!("t{i}")).collect();
        for id in &ids {
            store.insert("tasks", doc! { "_id": id.as_str(), "name": "chore" });
        }

        let scanner = ReferenceScanner::new(&store);
        let docs = scanner.find_by_ids("tasks", &ids).await.unwrap();
        assert_eq!(docs.len(), 120);
    }

    #[tokio::test]
    async fn test_resolve_kinds() {
        let store = seeded_store();
        let scanner = ReferenceScanner::new(&store);
        let ids = vec![
            "ts1".to_string(),
            "p1".to_string(),
            "ghost".to_string(),
        ];
        let kinds = scanner.resolve_kinds(&ids).await.unwrap();
        assert_eq!(kinds[0], ("ts1".to_string(), Some(EntityKind::Timesheet)));
        assert_eq!(kinds[1], ("p1".to_string(), Some(EntityKind::Project)));
        assert_eq!(kinds[2], ("ghost".to_string(), None));
    }

    /// Store whose reads always fail - scan must surface the error
    struct BrokenStore;

    #[async_trait]
    impl DocumentStore for BrokenStore {
        async fn find(&self, _collection: &str, _filter: Document) -> crate::types::Result<Vec<Document>> {
            Err(WardenError::Database("read timeout".to_string()))
        }
        async fn patch_one(
            &self,
            _collection: &str,
            _id: &str,
            _update: Document,
        ) -> crate::types::Result<bool> {
            Ok(false)
        }
        async fn delete_one(&self, _collection: &str, _id: &str) -> crate::types::Result<bool> {
            Ok(false)
        }
        async fn commit_batch(
            &self,
            _mutations: &[crate::store::Mutation],
        ) -> crate::types::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_scan_failure_is_fatal() {
        let store = BrokenStore;
        let scanner = ReferenceScanner::new(&store);
        let err = scanner.scan("u1", EntityKind::Person).await.unwrap_err();
        assert!(matches!(err, WardenError::Database(_)));
    }

    #[test]
    fn test_loose_ref_filter_shapes() {
        let filter = loose_ref_filter("assignedUsers.user", "u1");
        let branches = filter.get_array("$or").unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(
            branches[0],
            Bson::Document(doc! { "assignedUsers.user": "u1" })
        );
        assert_eq!(
            branches[1],
            Bson::Document(doc! { "assignedUsers.user.id": "u1" })
        );
    }
}
