//! Saved report document schema

use bson::{doc, Bson, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for saved reports
pub const REPORT_COLLECTION: &str = "reports";

/// Saved report document stored by the workspace
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReportDoc {
    #[serde(rename = "_id")]
    pub id: String,

    pub name: String,

    /// Author - loose reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Bson>,

    #[serde(default)]
    pub filters: ReportFilters,
}

/// Saved filter state for a report
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilters {
    /// People the report is filtered to - loose references
    #[serde(default)]
    pub users: Vec<Bson>,

    /// Projects the report is filtered to - loose references
    #[serde(default)]
    pub projects: Vec<Bson>,
}

impl IntoIndexes for ReportDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "createdBy": 1 },
                Some(
                    IndexOptions::builder()
                        .name("created_by_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "filters.users": 1 },
                Some(
                    IndexOptions::builder()
                        .name("filter_users_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
