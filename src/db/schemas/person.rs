//! Person document schema

use bson::{doc, Bson, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for people
pub const PERSON_COLLECTION: &str = "people";

/// Person document stored by the workspace
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PersonDoc {
    /// Document id (opaque string assigned by the web app)
    #[serde(rename = "_id")]
    pub id: String,

    /// Display name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Workspace role (member, manager, admin)
    #[serde(default)]
    pub role: String,

    /// People who pinned this person on their dashboard.
    /// Loose references: bare ids or `{id}` objects.
    #[serde(default)]
    pub pinned_by: Vec<Bson>,

    /// Whether this person was archived from the active team list
    #[serde(default)]
    pub is_archived: bool,
}

impl IntoIndexes for PersonDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "email": 1 },
                Some(IndexOptions::builder().name("email_index".to_string()).build()),
            ),
            // pinnedBy is scanned when removing a person
            (
                doc! { "pinnedBy": 1 },
                Some(
                    IndexOptions::builder()
                        .name("pinned_by_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
