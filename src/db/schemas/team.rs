//! Team document schema

use bson::{doc, Bson, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for teams
pub const TEAM_COLLECTION: &str = "teams";

/// Team document stored by the workspace
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TeamDoc {
    #[serde(rename = "_id")]
    pub id: String,

    pub name: String,

    /// Team manager - loose reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<Bson>,

    /// Team members - loose references
    #[serde(default)]
    pub members: Vec<Bson>,
}

impl IntoIndexes for TeamDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "members": 1 },
                Some(IndexOptions::builder().name("members_index".to_string()).build()),
            ),
            (
                doc! { "manager": 1 },
                Some(IndexOptions::builder().name("manager_index".to_string()).build()),
            ),
        ]
    }
}
