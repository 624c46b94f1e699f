//! Client document schema

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for clients
pub const CLIENT_COLLECTION: &str = "clients";

/// Client document stored by the workspace
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClientDoc {
    #[serde(rename = "_id")]
    pub id: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,

    /// Archived clients are hidden from project creation
    #[serde(default)]
    pub is_archived: bool,
}

impl IntoIndexes for ClientDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "name": 1 },
            Some(IndexOptions::builder().name("name_index".to_string()).build()),
        )]
    }
}
