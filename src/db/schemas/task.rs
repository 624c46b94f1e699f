//! Task document schema

use bson::{doc, Bson, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for tasks
pub const TASK_COLLECTION: &str = "tasks";

/// Task document stored by the workspace
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskDoc {
    #[serde(rename = "_id")]
    pub id: String,

    pub name: String,

    /// Project this task belongs to - loose reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Bson>,

    #[serde(default)]
    pub is_archived: bool,
}

impl IntoIndexes for TaskDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            // Scanned when removing a project
            doc! { "project": 1 },
            Some(IndexOptions::builder().name("project_index".to_string()).build()),
        )]
    }
}
