//! Document schemas for the Tally workspace
//!
//! These mirror the documents the web app writes; the gateway only reads and
//! rewrites them. Reference-valued fields are kept as raw `Bson` because the
//! store holds two historical shapes (bare id strings and `{id: ...}`
//! objects); `cascade::reference` normalizes them.

mod client;
mod person;
mod project;
mod report;
mod task;
mod team;
mod timesheet;

pub use client::{ClientDoc, CLIENT_COLLECTION};
pub use person::{PersonDoc, PERSON_COLLECTION};
pub use project::{ProjectDoc, PROJECT_COLLECTION};
pub use report::{ReportDoc, ReportFilters, REPORT_COLLECTION};
pub use task::{TaskDoc, TASK_COLLECTION};
pub use team::{TeamDoc, TEAM_COLLECTION};
pub use timesheet::{TimesheetDoc, TimesheetEntry, TimesheetStatus, TIMESHEET_COLLECTION};
