//! Static registry of reference edges between entity kinds
//!
//! The document store has no foreign keys, so the set of fields that can
//! point at an entity is maintained here, by hand, as data. Adding a new
//! dependent kind is a one-line registry change, not a new code path.
//! The scanner, the policy evaluator and the orchestrator all drive off
//! this table.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::schemas::{
    CLIENT_COLLECTION, PERSON_COLLECTION, PROJECT_COLLECTION, REPORT_COLLECTION, TASK_COLLECTION,
    TEAM_COLLECTION, TIMESHEET_COLLECTION,
};

/// The document kinds the workspace stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Person,
    Project,
    Task,
    Client,
    Team,
    Report,
    Timesheet,
}

impl EntityKind {
    /// All kinds, in reverse-lookup order
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Timesheet,
        EntityKind::Project,
        EntityKind::Task,
        EntityKind::Person,
        EntityKind::Team,
        EntityKind::Report,
        EntityKind::Client,
    ];

    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Person => PERSON_COLLECTION,
            EntityKind::Project => PROJECT_COLLECTION,
            EntityKind::Task => TASK_COLLECTION,
            EntityKind::Client => CLIENT_COLLECTION,
            EntityKind::Team => TEAM_COLLECTION,
            EntityKind::Report => REPORT_COLLECTION,
            EntityKind::Timesheet => TIMESHEET_COLLECTION,
        }
    }

    pub fn parse(s: &str) -> Option<EntityKind> {
        match s {
            "person" => Some(EntityKind::Person),
            "project" => Some(EntityKind::Project),
            "task" => Some(EntityKind::Task),
            "client" => Some(EntityKind::Client),
            "team" => Some(EntityKind::Team),
            "report" => Some(EntityKind::Report),
            "timesheet" => Some(EntityKind::Timesheet),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Person => "person",
            EntityKind::Project => "project",
            EntityKind::Task => "task",
            EntityKind::Client => "client",
            EntityKind::Team => "team",
            EntityKind::Report => "report",
            EntityKind::Timesheet => "timesheet",
        };
        write!(f, "{}", name)
    }
}

/// What the cascade does about an edge once deletion is permitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupAction {
    /// `$unset` the field on the holder
    ClearField,
    /// Rewrite the holding array without the target's reference
    PullFromArray,
    /// Delete the holder document itself. Used for timesheets owned by a
    /// removed person: `user` is mandatory on a timesheet, so the sheet
    /// cannot be unreferenced - it has to go.
    DeleteHolder,
    /// Never cleaned - the edge's existence blocks deletion outright
    BlockOnly,
}

/// A directed reference edge: some field on `holder` documents may point at
/// the target entity kind.
#[derive(Debug, Clone, Copy)]
pub struct RefEdge {
    /// Kind of document holding the reference
    pub holder: EntityKind,
    /// Dotted field path on the holder (arrays are traversed implicitly)
    pub path: &'static str,
    pub action: CleanupAction,
}

const PERSON_EDGES: &[RefEdge] = &[
    RefEdge {
        holder: EntityKind::Timesheet,
        path: "user",
        action: CleanupAction::DeleteHolder,
    },
    RefEdge {
        holder: EntityKind::Timesheet,
        path: "approvedBy",
        action: CleanupAction::ClearField,
    },
    RefEdge {
        holder: EntityKind::Project,
        path: "assignedUsers.user",
        action: CleanupAction::PullFromArray,
    },
    RefEdge {
        holder: EntityKind::Project,
        path: "projectManager",
        action: CleanupAction::ClearField,
    },
    RefEdge {
        holder: EntityKind::Team,
        path: "members",
        action: CleanupAction::PullFromArray,
    },
    RefEdge {
        holder: EntityKind::Team,
        path: "manager",
        action: CleanupAction::ClearField,
    },
    RefEdge {
        holder: EntityKind::Person,
        path: "pinnedBy",
        action: CleanupAction::PullFromArray,
    },
    RefEdge {
        holder: EntityKind::Report,
        path: "createdBy",
        action: CleanupAction::ClearField,
    },
    RefEdge {
        holder: EntityKind::Report,
        path: "filters.users",
        action: CleanupAction::PullFromArray,
    },
];

const TASK_EDGES: &[RefEdge] = &[
    RefEdge {
        holder: EntityKind::Project,
        path: "tasks",
        action: CleanupAction::BlockOnly,
    },
    RefEdge {
        holder: EntityKind::Timesheet,
        path: "entries.task",
        action: CleanupAction::BlockOnly,
    },
];

const PROJECT_EDGES: &[RefEdge] = &[
    RefEdge {
        holder: EntityKind::Task,
        path: "project",
        action: CleanupAction::BlockOnly,
    },
    RefEdge {
        holder: EntityKind::Timesheet,
        path: "project",
        action: CleanupAction::BlockOnly,
    },
];

const CLIENT_EDGES: &[RefEdge] = &[RefEdge {
    holder: EntityKind::Project,
    path: "client",
    action: CleanupAction::BlockOnly,
}];

/// All fields that can reference the given entity kind
pub fn edges_for(target: EntityKind) -> &'static [RefEdge] {
    match target {
        EntityKind::Person => PERSON_EDGES,
        EntityKind::Task => TASK_EDGES,
        EntityKind::Project => PROJECT_EDGES,
        EntityKind::Client => CLIENT_EDGES,
        // Teams, reports and timesheets are leaves - nothing references them
        EntityKind::Team | EntityKind::Report | EntityKind::Timesheet => &[],
    }
}

/// A named, ordered step of the person cleanup pipeline
#[derive(Debug, Clone, Copy)]
pub struct CleanupGroup {
    pub name: &'static str,
    pub edges: &'static [RefEdge],
}

/// Person cleanup groups in execution order.
///
/// The order is a hard requirement, not a convention: approvals are stripped
/// before the person's own timesheets are destroyed, and every later group
/// assumes the owned timesheets - the only hard blocking dependency - are
/// already gone.
pub const PERSON_CLEANUP_GROUPS: &[CleanupGroup] = &[
    CleanupGroup {
        name: "strip-approvals",
        edges: &[RefEdge {
            holder: EntityKind::Timesheet,
            path: "approvedBy",
            action: CleanupAction::ClearField,
        }],
    },
    CleanupGroup {
        name: "remove-owned-timesheets",
        edges: &[RefEdge {
            holder: EntityKind::Timesheet,
            path: "user",
            action: CleanupAction::DeleteHolder,
        }],
    },
    CleanupGroup {
        name: "detach-projects",
        edges: &[
            RefEdge {
                holder: EntityKind::Project,
                path: "assignedUsers.user",
                action: CleanupAction::PullFromArray,
            },
            RefEdge {
                holder: EntityKind::Project,
                path: "projectManager",
                action: CleanupAction::ClearField,
            },
        ],
    },
    CleanupGroup {
        name: "detach-teams",
        edges: &[
            RefEdge {
                holder: EntityKind::Team,
                path: "members",
                action: CleanupAction::PullFromArray,
            },
            RefEdge {
                holder: EntityKind::Team,
                path: "manager",
                action: CleanupAction::ClearField,
            },
        ],
    },
    CleanupGroup {
        name: "clear-pins",
        edges: &[RefEdge {
            holder: EntityKind::Person,
            path: "pinnedBy",
            action: CleanupAction::PullFromArray,
        }],
    },
    CleanupGroup {
        name: "rewrite-reports",
        edges: &[
            RefEdge {
                holder: EntityKind::Report,
                path: "createdBy",
                action: CleanupAction::ClearField,
            },
            RefEdge {
                holder: EntityKind::Report,
                path: "filters.users",
                action: CleanupAction::PullFromArray,
            },
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_edges_cover_cleanup_groups() {
        // Every edge in the cleanup pipeline must also be scanned
        for group in PERSON_CLEANUP_GROUPS {
            for edge in group.edges {
                assert!(
                    edges_for(EntityKind::Person)
                        .iter()
                        .any(|e| e.holder == edge.holder && e.path == edge.path),
                    "cleanup edge {}/{} missing from scan registry",
                    edge.holder,
                    edge.path
                );
            }
        }
    }

    #[test]
    fn test_block_only_kinds_have_no_cleanup_edges() {
        for kind in [EntityKind::Task, EntityKind::Project, EntityKind::Client] {
            for edge in edges_for(kind) {
                assert_eq!(edge.action, CleanupAction::BlockOnly);
            }
        }
    }

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::parse(&kind.to_string()), Some(kind));
        }
        assert_eq!(EntityKind::parse("widget"), None);
    }
}
