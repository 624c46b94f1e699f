//! Project document schema

use bson::{doc, Bson, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for projects
pub const PROJECT_COLLECTION: &str = "projects";

/// Project document stored by the workspace
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDoc {
    #[serde(rename = "_id")]
    pub id: String,

    pub name: String,

    /// Owning client - loose reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<Bson>,

    /// Project manager - loose reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_manager: Option<Bson>,

    /// Assignment entries. Each element is `{user, role?, elementKey?}` where
    /// `user` is itself a loose reference.
    #[serde(default)]
    pub assigned_users: Vec<Bson>,

    /// Tasks available on this project - loose references
    #[serde(default)]
    pub tasks: Vec<Bson>,

    #[serde(default)]
    pub is_active: bool,
}

impl IntoIndexes for ProjectDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Scanned when removing a client
            (
                doc! { "client": 1, "isActive": 1 },
                Some(
                    IndexOptions::builder()
                        .name("client_active_index".to_string())
                        .build(),
                ),
            ),
            // Scanned when removing a person
            (
                doc! { "assignedUsers.user": 1 },
                Some(
                    IndexOptions::builder()
                        .name("assigned_users_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "projectManager": 1 },
                Some(
                    IndexOptions::builder()
                        .name("project_manager_index".to_string())
                        .build(),
                ),
            ),
            // Scanned when removing a task
            (
                doc! { "tasks": 1 },
                Some(IndexOptions::builder().name("tasks_index".to_string()).build()),
            ),
        ]
    }
}
