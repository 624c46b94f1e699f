//! Cascade orchestrator
//!
//! Coordinates one deletion end to end: scan, policy check, ordered cleanup
//! groups (person only), terminal delete. The pipeline per cascade is
//!
//! ```text
//! Scanning -> Evaluating -> [Blocked]
//!                        -> Cleaning (person only, ordered groups)
//!                        -> Deleting -> Done | DeleteConflict
//! ```
//!
//! Scan failures abort before any write. Once cleaning starts the cascade
//! runs to completion or failure - a half-cleaned graph is an acceptable,
//! inspectable state; failed batches are reported, never thrown.

use bson::{doc, Document};
use std::collections::BTreeMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::Role;
use crate::cascade::batch::BatchExecutor;
use crate::cascade::policy::{self, ConflictReport, MAX_SAMPLES};
use crate::cascade::reference;
use crate::cascade::registry::{CleanupAction, CleanupGroup, EntityKind, PERSON_CLEANUP_GROUPS};
use crate::cascade::scanner::{ReferenceHitSet, ReferenceScanner};
use crate::store::{DocumentStore, Mutation};
use crate::types::{Result, WardenError};

/// One deletion, as requested by an HTTP call
#[derive(Debug, Clone)]
pub struct DeletionRequest {
    pub target_id: String,
    pub target_kind: EntityKind,
    pub actor_role: Role,
}

/// Aggregated result of a completed cascade
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeResult {
    /// References removed, per dependent kind
    pub removed_references_by_kind: BTreeMap<String, u64>,
    pub deleted_entity_id: String,
    /// Indices of cleanup chunks that failed (numbered across the cascade)
    pub batch_failures: Vec<usize>,
}

impl CascadeResult {
    /// True when some cleanup writes failed before the entity was deleted.
    /// The caller-facing message must say the operation should be retried
    /// as a whole.
    pub fn partial(&self) -> bool {
        !self.batch_failures.is_empty()
    }
}

/// A holder still referencing the target at terminal-delete time
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedHolder {
    pub id: String,
    /// Kind, when the reverse lookup could identify it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntityKind>,
}

/// The store refused the terminal delete: something still points at the
/// target. Distinguishes preserved timesheet history from references the
/// scanner's schema table did not know about.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteConflict {
    /// Offending holders, capped at `MAX_SAMPLES`, kinds best-effort
    pub holders: Vec<UnresolvedHolder>,
    /// Total offending documents reported by the store
    pub total: usize,
    /// Whether cleanup writes had already happened before the conflict
    pub partial_cleanup: bool,
}

impl DeleteConflict {
    /// User-facing explanation, one line per holder category
    pub fn details(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for holder in &self.holders {
            match holder.kind {
                Some(EntityKind::Timesheet) => lines.push(format!(
                    "Timesheet {} is preserved budgeting history and still references this entity",
                    holder.id
                )),
                Some(kind) => {
                    lines.push(format!("Still referenced by {} {}", kind, holder.id))
                }
                None => lines.push(format!(
                    "Still referenced by an unidentified document ({})",
                    holder.id
                )),
            }
        }
        if self.total > self.holders.len() {
            lines.push(format!(
                "...and {} more document(s)",
                self.total - self.holders.len()
            ));
        }
        lines.push(if self.partial_cleanup {
            "Partial cleanup was performed; retry the whole operation.".to_string()
        } else {
            "Nothing was changed; the operation is safe to retry.".to_string()
        });
        lines
    }
}

/// Every way a cascade can finish without an infrastructure error
#[derive(Debug)]
pub enum CascadeOutcome {
    Completed(CascadeResult),
    Blocked(ConflictReport),
    DeleteConflict(DeleteConflict),
    NotFound,
}

/// Runs cascades against a document store. Owns no state between calls.
pub struct CascadeOrchestrator<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> CascadeOrchestrator<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Run one cascade to completion
    pub async fn cascade(&self, request: &DeletionRequest) -> Result<CascadeOutcome> {
        let collection = request.target_kind.collection();

        if self
            .store
            .find_by_id(collection, &request.target_id)
            .await?
            .is_none()
        {
            return Ok(CascadeOutcome::NotFound);
        }

        // Scanning - a failed read aborts before any write
        let scanner = ReferenceScanner::new(self.store);
        let hit_set = scanner.scan(&request.target_id, request.target_kind).await?;

        // Evaluating
        let report = policy::evaluate(request.target_kind, &hit_set);
        if report.blocking {
            info!(
                target = %request.target_id,
                kind = %request.target_kind,
                reasons = report.reasons.len(),
                "Deletion blocked by policy"
            );
            return Ok(CascadeOutcome::Blocked(report));
        }

        // Cleaning - person only; other kinds reach here with no dependents
        // left to clean (policy refused otherwise)
        let mut removed: BTreeMap<String, u64> = BTreeMap::new();
        let mut batch_failures: Vec<usize> = Vec::new();
        let mut chunk_offset = 0usize;
        let mut cleanup_writes = 0usize;

        if request.target_kind == EntityKind::Person {
            for group in PERSON_CLEANUP_GROUPS {
                let (mutations, group_removed) =
                    build_group_mutations(group, &hit_set, &request.target_id);
                if mutations.is_empty() {
                    continue;
                }

                info!(
                    target = %request.target_id,
                    group = group.name,
                    mutations = mutations.len(),
                    "Running cleanup group"
                );

                let outcome = BatchExecutor::new(self.store).execute(mutations).await;
                for failed in &outcome.failed_chunks {
                    batch_failures.push(chunk_offset + failed);
                }
                chunk_offset += outcome.chunk_count;
                cleanup_writes += outcome.committed;

                for (kind, count) in group_removed {
                    *removed.entry(kind.to_string()).or_default() += count;
                }
            }
        }

        // Deleting
        match self.store.delete_one(collection, &request.target_id).await {
            Ok(_) => {
                info!(
                    target = %request.target_id,
                    kind = %request.target_kind,
                    removed_refs = removed.values().sum::<u64>(),
                    failed_batches = batch_failures.len(),
                    "Cascade complete"
                );
                Ok(CascadeOutcome::Completed(CascadeResult {
                    removed_references_by_kind: removed,
                    deleted_entity_id: request.target_id.clone(),
                    batch_failures,
                }))
            }
            Err(WardenError::ReferenceConflict { referencing_ids }) => {
                warn!(
                    target = %request.target_id,
                    holders = referencing_ids.len(),
                    "Store refused terminal delete"
                );
                let conflict = self
                    .build_delete_conflict(referencing_ids, cleanup_writes > 0)
                    .await;
                Ok(CascadeOutcome::DeleteConflict(conflict))
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort reverse lookup of the offending ids' kinds. Lookup
    /// failures degrade to "unidentified" rather than masking the conflict.
    async fn build_delete_conflict(
        &self,
        referencing_ids: Vec<String>,
        partial_cleanup: bool,
    ) -> DeleteConflict {
        let total = referencing_ids.len();
        let capped: Vec<String> = referencing_ids.into_iter().take(MAX_SAMPLES).collect();

        let scanner = ReferenceScanner::new(self.store);
        let holders = match scanner.resolve_kinds(&capped).await {
            Ok(resolved) => resolved
                .into_iter()
                .map(|(id, kind)| UnresolvedHolder { id, kind })
                .collect(),
            Err(e) => {
                warn!(error = %e, "Reverse lookup of conflicting holders failed");
                capped
                    .into_iter()
                    .map(|id| UnresolvedHolder { id, kind: None })
                    .collect()
            }
        };

        DeleteConflict {
            holders,
            total,
            partial_cleanup,
        }
    }
}

/// Build the mutations for one cleanup group from the scan's hit set.
/// Returns the mutations plus how many references each dependent kind loses.
fn build_group_mutations(
    group: &CleanupGroup,
    hit_set: &ReferenceHitSet,
    target_id: &str,
) -> (Vec<Mutation>, BTreeMap<EntityKind, u64>) {
    let mut mutations = Vec::new();
    let mut removed: BTreeMap<EntityKind, u64> = BTreeMap::new();

    for edge in group.edges {
        for hit in hit_set.hits_for_path(edge.holder, edge.path) {
            match edge.action {
                CleanupAction::ClearField => {
                    let mut unset = Document::new();
                    unset.insert(edge.path, "");
                    mutations.push(Mutation::Patch {
                        collection: edge.holder.collection(),
                        id: hit.holder_id.clone(),
                        update: doc! {
                            "$unset": unset,
                            "$set": { "updatedAt": bson::DateTime::now() },
                        },
                    });
                    *removed.entry(edge.holder).or_default() += 1;
                }
                CleanupAction::PullFromArray => {
                    let Some(strip) = reference::strip_from_array(&hit.doc, edge.path, target_id)
                    else {
                        continue;
                    };
                    if strip.removed == 0 {
                        continue;
                    }
                    let mut set = Document::new();
                    set.insert(strip.array_path, strip.remaining);
                    set.insert("updatedAt", bson::DateTime::now());
                    mutations.push(Mutation::Patch {
                        collection: edge.holder.collection(),
                        id: hit.holder_id.clone(),
                        update: doc! { "$set": set },
                    });
                    *removed.entry(edge.holder).or_default() += strip.removed as u64;
                }
                CleanupAction::DeleteHolder => {
                    mutations.push(Mutation::Delete {
                        collection: edge.holder.collection(),
                        id: hit.holder_id.clone(),
                    });
                    *removed.entry(edge.holder).or_default() += 1;
                }
                CleanupAction::BlockOnly => {
                    // Block-only edges never appear in cleanup groups
                }
            }
        }
    }

    (mutations, removed)
}
