//! Conflict policy evaluator
//!
//! Decides whether a deletion may proceed, given a scan's hit set. The rules
//! are deliberately asymmetric: person deletion performs surgical reference
//! cleanup (people accumulate back-references across unrelated subsystems
//! that are safe to strip), while task/project/client deletion is refused
//! outright whenever anything still depends on the target - the caller is
//! advised to archive instead.
//!
//! Approved timesheets are historical financial data and never block a
//! person's removal; unsubmitted or submitted sheets with logged hours are
//! outstanding work and always do.

use serde::Serialize;

use crate::cascade::registry::EntityKind;
use crate::cascade::scanner::ReferenceHitSet;
use crate::db::schemas::TimesheetDoc;

/// Maximum sample identifiers included per conflict reason
pub const MAX_SAMPLES: usize = 5;

/// One category of blocking references
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReason {
    /// Category key: "pending_timesheet", "project", "timesheet", "task",
    /// "active_project"
    pub kind: String,
    pub count: usize,
    /// Up to `MAX_SAMPLES` human-readable identifiers
    pub samples: Vec<String>,
}

impl ConflictReason {
    fn new(kind: &str, names: Vec<String>) -> Self {
        let count = names.len();
        Self {
            kind: kind.to_string(),
            count,
            samples: names.into_iter().take(MAX_SAMPLES).collect(),
        }
    }

    /// Render this reason as one line for the UI's details list
    pub fn describe(&self) -> String {
        let samples = self.samples.join(", ");
        match self.kind.as_str() {
            "pending_timesheet" => format!(
                "Has {} unsubmitted or submitted timesheet{} with logged hours: {}",
                self.count,
                plural(self.count),
                samples
            ),
            "project" => format!(
                "Referenced in {} project{}: {}",
                self.count,
                plural(self.count),
                samples
            ),
            "timesheet" => format!(
                "Used in {} unapproved timesheet{}: {}",
                self.count,
                plural(self.count),
                samples
            ),
            "task" => format!(
                "Referenced by {} task{}: {}",
                self.count,
                plural(self.count),
                samples
            ),
            "active_project" => format!(
                "Has {} active project{}: {}",
                self.count,
                plural(self.count),
                samples
            ),
            _ => format!("{} blocking reference{}: {}", self.count, plural(self.count), samples),
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Outcome of the policy check. If `blocking` is true the cascade performs
/// zero mutations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub blocking: bool,
    pub reasons: Vec<ConflictReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ConflictReport {
    fn allow() -> Self {
        Self {
            blocking: false,
            reasons: Vec::new(),
            suggestion: None,
        }
    }

    fn block(reasons: Vec<ConflictReason>, suggestion: &str) -> Self {
        Self {
            blocking: true,
            reasons,
            suggestion: Some(suggestion.to_string()),
        }
    }

    /// One line per reason, rendered for the UI
    pub fn details(&self) -> Vec<String> {
        self.reasons.iter().map(|r| r.describe()).collect()
    }
}

/// Evaluate the policy table for a target kind against a scan result
pub fn evaluate(target_kind: EntityKind, hit_set: &ReferenceHitSet) -> ConflictReport {
    match target_kind {
        EntityKind::Person => evaluate_person(hit_set),
        EntityKind::Task => evaluate_task(hit_set),
        EntityKind::Project => evaluate_project(hit_set),
        EntityKind::Client => evaluate_client(hit_set),
        // Leaf kinds have no registered edges and nothing to block on
        EntityKind::Team | EntityKind::Report | EntityKind::Timesheet => ConflictReport::allow(),
    }
}

/// A person is blocked only by their own pending work. Everything else -
/// approvals given, project/team membership, pins, report authorship - is
/// cleaned up, not blocked on.
fn evaluate_person(hit_set: &ReferenceHitSet) -> ConflictReport {
    let pending: Vec<String> = hit_set
        .hits_for_path(EntityKind::Timesheet, "user")
        .into_iter()
        .filter(|hit| {
            bson::from_document::<TimesheetDoc>(hit.doc.clone())
                .map(|sheet| sheet.has_pending_work())
                // A sheet we cannot parse is treated as pending: never
                // destroy work we cannot prove is reconciled
                .unwrap_or(true)
        })
        .map(|hit| hit.display_name.clone())
        .collect();

    if pending.is_empty() {
        return ConflictReport::allow();
    }

    ConflictReport::block(
        vec![ConflictReason::new("pending_timesheet", pending)],
        "Approve or delete the pending timesheets before removing this person.",
    )
}

/// A task is blocked by any project listing it and by entries on any
/// non-approved timesheet. No partial cleanup path exists for tasks.
fn evaluate_task(hit_set: &ReferenceHitSet) -> ConflictReport {
    let mut reasons = Vec::new();

    let projects: Vec<String> = hit_set
        .hits_for(EntityKind::Project)
        .iter()
        .map(|h| h.display_name.clone())
        .collect();
    if !projects.is_empty() {
        reasons.push(ConflictReason::new("project", projects));
    }

    let timesheets: Vec<String> = hit_set
        .hits_for(EntityKind::Timesheet)
        .iter()
        .filter(|hit| !timesheet_is_approved(&hit.doc))
        .map(|h| h.display_name.clone())
        .collect();
    if !timesheets.is_empty() {
        reasons.push(ConflictReason::new("timesheet", timesheets));
    }

    if reasons.is_empty() {
        ConflictReport::allow()
    } else {
        ConflictReport::block(
            reasons,
            "Consider archiving this task instead of deleting it.",
        )
    }
}

/// A project is blocked by any task pointing at it and by entries on any
/// non-approved timesheet.
fn evaluate_project(hit_set: &ReferenceHitSet) -> ConflictReport {
    let mut reasons = Vec::new();

    let tasks: Vec<String> = hit_set
        .hits_for(EntityKind::Task)
        .iter()
        .map(|h| h.display_name.clone())
        .collect();
    if !tasks.is_empty() {
        reasons.push(ConflictReason::new("task", tasks));
    }

    let timesheets: Vec<String> = hit_set
        .hits_for(EntityKind::Timesheet)
        .iter()
        .filter(|hit| !timesheet_is_approved(&hit.doc))
        .map(|h| h.display_name.clone())
        .collect();
    if !timesheets.is_empty() {
        reasons.push(ConflictReason::new("timesheet", timesheets));
    }

    if reasons.is_empty() {
        ConflictReport::allow()
    } else {
        ConflictReport::block(
            reasons,
            "Consider archiving this project instead of deleting it.",
        )
    }
}

/// A client is blocked while it has active projects. Inactive projects do
/// not block archiving.
fn evaluate_client(hit_set: &ReferenceHitSet) -> ConflictReport {
    let active: Vec<String> = hit_set
        .hits_for(EntityKind::Project)
        .iter()
        .filter(|hit| hit.doc.get_bool("isActive").unwrap_or(false))
        .map(|h| h.display_name.clone())
        .collect();

    if active.is_empty() {
        return ConflictReport::allow();
    }

    ConflictReport::block(
        vec![ConflictReason::new("active_project", active)],
        "Archive or complete the client's active projects first.",
    )
}

fn timesheet_is_approved(doc: &bson::Document) -> bool {
    doc.get_str("status").map(|s| s == "approved").unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::registry;
    use crate::cascade::scanner::ReferenceScanner;
    use crate::store::MemoryStore;
    use bson::doc;

    async fn scan(store: &MemoryStore, id: &str, kind: EntityKind) -> ReferenceHitSet {
        ReferenceScanner::new(store).scan(id, kind).await.unwrap()
    }

    #[tokio::test]
    async fn test_person_blocked_by_pending_timesheet() {
        let store = MemoryStore::new();
        store.insert("people", doc! { "_id": "u1", "name": "Ada" });
        store.insert(
            "timesheets",
            doc! {
                "_id": "ts1",
                "user": "u1",
                "weekOf": "2024-03-04",
                "status": "submitted",
                "entries": [ { "hours": 8.0 } ],
            },
        );

        let hits = scan(&store, "u1", EntityKind::Person).await;
        let report = evaluate(EntityKind::Person, &hits);

        assert!(report.blocking);
        assert_eq!(report.reasons.len(), 1);
        assert_eq!(report.reasons[0].kind, "pending_timesheet");
        assert_eq!(report.reasons[0].count, 1);
        assert_eq!(report.reasons[0].samples, vec!["2024-03-04"]);
        assert!(report.suggestion.is_some());
    }

    #[tokio::test]
    async fn test_person_empty_pending_sheet_does_not_block() {
        let store = MemoryStore::new();
        store.insert("people", doc! { "_id": "u1", "name": "Ada" });
        // Unsubmitted but no entries: nothing outstanding
        store.insert(
            "timesheets",
            doc! { "_id": "ts1", "user": "u1", "status": "unsubmitted", "entries": [] },
        );

        let hits = scan(&store, "u1", EntityKind::Person).await;
        assert!(!evaluate(EntityKind::Person, &hits).blocking);
    }

    #[tokio::test]
    async fn test_person_approved_history_does_not_block() {
        let store = MemoryStore::new();
        store.insert("people", doc! { "_id": "u1", "name": "Ada" });
        store.insert(
            "timesheets",
            doc! {
                "_id": "ts1",
                "user": "u1",
                "status": "approved",
                "entries": [ { "hours": 40.0 } ],
            },
        );
        // Back-references never block
        store.insert(
            "projects",
            doc! { "_id": "p1", "name": "Apollo", "projectManager": "u1", "isActive": true },
        );
        store.insert(
            "people",
            doc! { "_id": "u2", "name": "Grace", "pinnedBy": ["u1"] },
        );

        let hits = scan(&store, "u1", EntityKind::Person).await;
        assert!(!evaluate(EntityKind::Person, &hits).blocking);
    }

    #[tokio::test]
    async fn test_task_blocked_by_project_exact_wording() {
        let store = MemoryStore::new();
        store.insert("tasks", doc! { "_id": "t1", "name": "Design review" });
        store.insert("projects", doc! { "_id": "p1", "tasks": ["t1"] });

        let hits = scan(&store, "t1", EntityKind::Task).await;
        let report = evaluate(EntityKind::Task, &hits);

        assert!(report.blocking);
        assert_eq!(report.details(), vec!["Referenced in 1 project: p1"]);
        assert_eq!(
            report.suggestion.as_deref(),
            Some("Consider archiving this task instead of deleting it.")
        );
    }

    #[tokio::test]
    async fn test_task_approved_timesheet_entry_does_not_block() {
        let store = MemoryStore::new();
        store.insert("tasks", doc! { "_id": "t1", "name": "Design review" });
        store.insert(
            "timesheets",
            doc! {
                "_id": "ts1",
                "user": "u1",
                "status": "approved",
                "entries": [ { "task": "t1", "hours": 3.0 } ],
            },
        );

        let hits = scan(&store, "t1", EntityKind::Task).await;
        assert!(!evaluate(EntityKind::Task, &hits).blocking);
    }

    #[tokio::test]
    async fn test_task_pending_timesheet_entry_blocks() {
        let store = MemoryStore::new();
        store.insert("tasks", doc! { "_id": "t1", "name": "Design review" });
        store.insert(
            "timesheets",
            doc! {
                "_id": "ts1",
                "user": "u1",
                "weekOf": "2024-05-13",
                "status": "submitted",
                "entries": [ { "task": { "id": "t1" }, "hours": 3.0 } ],
            },
        );

        let hits = scan(&store, "t1", EntityKind::Task).await;
        let report = evaluate(EntityKind::Task, &hits);
        assert!(report.blocking);
        assert_eq!(report.reasons[0].kind, "timesheet");
        assert_eq!(report.reasons[0].samples, vec!["2024-05-13"]);
    }

    #[tokio::test]
    async fn test_project_blocked_by_task() {
        let store = MemoryStore::new();
        store.insert("projects", doc! { "_id": "p1", "name": "Apollo" });
        store.insert("tasks", doc! { "_id": "t1", "name": "Design review", "project": "p1" });

        let hits = scan(&store, "p1", EntityKind::Project).await;
        let report = evaluate(EntityKind::Project, &hits);
        assert!(report.blocking);
        assert_eq!(report.reasons[0].kind, "task");
    }

    #[tokio::test]
    async fn test_client_blocked_only_by_active_projects() {
        let store = MemoryStore::new();
        store.insert("clients", doc! { "_id": "c1", "name": "Acme" });
        store.insert(
            "projects",
            doc! { "_id": "p1", "name": "Apollo", "client": "c1", "isActive": true },
        );
        store.insert(
            "projects",
            doc! { "_id": "p2", "name": "Zephyr", "client": "c1", "isActive": false },
        );

        let hits = scan(&store, "c1", EntityKind::Client).await;
        let report = evaluate(EntityKind::Client, &hits);
        assert!(report.blocking);
        assert_eq!(report.reasons[0].count, 1);
        assert_eq!(report.reasons[0].samples, vec!["Apollo"]);

        // Deactivate the project: archive is now allowed
        store.insert(
            "projects",
            doc! { "_id": "p1", "name": "Apollo", "client": "c1", "isActive": false },
        );
        let hits = scan(&store, "c1", EntityKind::Client).await;
        assert!(!evaluate(EntityKind::Client, &hits).blocking);
    }

    #[tokio::test]
    async fn test_samples_capped_at_five() {
        let store = MemoryStore::new();
        store.insert("tasks", doc! { "_id": "t1", "name": "Chore" });
        for i in 0..8 {
            store.insert(
                "projects",
                doc! { "_id": format!("p{i}"), "name": format!("Project {i}"), "tasks": ["t1"] },
            );
        }

        let hits = scan(&store, "t1", EntityKind::Task).await;
        let report = evaluate(EntityKind::Task, &hits);
        assert_eq!(report.reasons[0].count, 8);
        assert_eq!(report.reasons[0].samples.len(), MAX_SAMPLES);
    }

    #[test]
    fn test_edges_exist_for_every_policed_kind() {
        for kind in [
            EntityKind::Person,
            EntityKind::Task,
            EntityKind::Project,
            EntityKind::Client,
        ] {
            assert!(!registry::edges_for(kind).is_empty());
        }
    }
}
