//! Timesheet document schema
//!
//! A timesheet is one person's hours for one week. `user` is mandatory - a
//! timesheet cannot exist without an owner, which is why cascade deletion of
//! a person destroys their timesheets instead of unreferencing them.

use bson::{doc, Bson, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::IntoIndexes;

/// Collection name for timesheets
pub const TIMESHEET_COLLECTION: &str = "timesheets";

/// Timesheet lifecycle status
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimesheetStatus {
    /// Being filled in, not yet handed to a manager
    #[default]
    Unsubmitted,
    /// Handed in, awaiting manager approval
    Submitted,
    /// Approved - part of the historical budget record
    Approved,
}

impl TimesheetStatus {
    pub fn is_approved(&self) -> bool {
        matches!(self, TimesheetStatus::Approved)
    }
}

impl fmt::Display for TimesheetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimesheetStatus::Unsubmitted => write!(f, "unsubmitted"),
            TimesheetStatus::Submitted => write!(f, "submitted"),
            TimesheetStatus::Approved => write!(f, "approved"),
        }
    }
}

/// One line on a timesheet
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetEntry {
    /// Task the hours were logged against - loose reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Bson>,

    #[serde(default)]
    pub hours: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Timesheet document stored by the workspace
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetDoc {
    #[serde(rename = "_id")]
    pub id: String,

    /// Owner - loose reference, mandatory
    pub user: Bson,

    /// Week start date, ISO `YYYY-MM-DD`
    #[serde(default)]
    pub week_of: String,

    #[serde(default)]
    pub status: TimesheetStatus,

    /// Manager who approved this sheet - loose reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<Bson>,

    /// Project the sheet is scoped to, when the workspace uses
    /// per-project sheets - loose reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Bson>,

    #[serde(default)]
    pub entries: Vec<TimesheetEntry>,
}

impl TimesheetDoc {
    /// A sheet with logged hours that has not been approved yet represents
    /// outstanding, unreconciled work.
    pub fn has_pending_work(&self) -> bool {
        !self.status.is_approved() && !self.entries.is_empty()
    }
}

impl IntoIndexes for TimesheetDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user": 1, "weekOf": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_week_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "approvedBy": 1 },
                Some(
                    IndexOptions::builder()
                        .name("approved_by_index".to_string())
                        .build(),
                ),
            ),
            // Scanned when removing a task
            (
                doc! { "entries.task": 1 },
                Some(
                    IndexOptions::builder()
                        .name("entries_task_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_work() {
        let mut sheet = TimesheetDoc {
            id: "ts1".to_string(),
            user: Bson::String("u1".to_string()),
            status: TimesheetStatus::Submitted,
            entries: vec![TimesheetEntry {
                task: None,
                hours: 8.0,
                notes: None,
            }],
            ..Default::default()
        };
        assert!(sheet.has_pending_work());

        sheet.status = TimesheetStatus::Approved;
        assert!(!sheet.has_pending_work());

        sheet.status = TimesheetStatus::Unsubmitted;
        sheet.entries.clear();
        assert!(!sheet.has_pending_work());
    }

    #[test]
    fn test_status_roundtrip() {
        let json = serde_json::to_string(&TimesheetStatus::Submitted).unwrap();
        assert_eq!(json, "\"submitted\"");
        let back: TimesheetStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TimesheetStatus::Submitted);
    }
}
