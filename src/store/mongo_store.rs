//! MongoDB-backed document store
//!
//! Batches commit inside a client session transaction. MongoDB does not
//! enforce reference integrity, so `delete_one` here never reports
//! `ReferenceConflict` - the cascade engine's own scan is the only guard in
//! production, and the conflict-translation path is exercised against the
//! in-memory store.

use async_trait::async_trait;
use bson::{doc, Document};
use futures_util::StreamExt;
use tracing::{error, warn};

use crate::db::schemas::{
    ClientDoc, PersonDoc, ProjectDoc, ReportDoc, TaskDoc, TeamDoc, TimesheetDoc, CLIENT_COLLECTION,
    PERSON_COLLECTION, PROJECT_COLLECTION, REPORT_COLLECTION, TASK_COLLECTION, TEAM_COLLECTION,
    TIMESHEET_COLLECTION,
};
use crate::db::MongoClient;
use crate::store::{DocumentStore, Mutation, TXN_MAX_MUTATIONS};
use crate::types::{Result, WardenError};

/// Document store backed by MongoDB
#[derive(Clone)]
pub struct MongoStore {
    mongo: MongoClient,
}

impl MongoStore {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }

    /// Apply every schema's declared indexes. Called once at startup; the
    /// scanner's reference queries depend on these.
    pub async fn ensure_indexes(&self) -> Result<()> {
        self.mongo
            .apply_indexes::<PersonDoc>(PERSON_COLLECTION)
            .await?;
        self.mongo
            .apply_indexes::<ProjectDoc>(PROJECT_COLLECTION)
            .await?;
        self.mongo.apply_indexes::<TaskDoc>(TASK_COLLECTION).await?;
        self.mongo
            .apply_indexes::<ClientDoc>(CLIENT_COLLECTION)
            .await?;
        self.mongo.apply_indexes::<TeamDoc>(TEAM_COLLECTION).await?;
        self.mongo
            .apply_indexes::<ReportDoc>(REPORT_COLLECTION)
            .await?;
        self.mongo
            .apply_indexes::<TimesheetDoc>(TIMESHEET_COLLECTION)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>> {
        let cursor = self
            .mongo
            .documents(collection)
            .find(filter)
            .await
            .map_err(|e| WardenError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<Document> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    async fn patch_one(&self, collection: &str, id: &str, update: Document) -> Result<bool> {
        let result = self
            .mongo
            .documents(collection)
            .update_one(doc! { "_id": id }, update)
            .await
            .map_err(|e| WardenError::Database(format!("Update failed: {}", e)))?;

        Ok(result.matched_count > 0)
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool> {
        let result = self
            .mongo
            .documents(collection)
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| WardenError::Database(format!("Delete failed: {}", e)))?;

        Ok(result.deleted_count > 0)
    }

    async fn commit_batch(&self, mutations: &[Mutation]) -> Result<()> {
        if mutations.len() > TXN_MAX_MUTATIONS {
            return Err(WardenError::BatchTooLarge {
                size: mutations.len(),
                limit: TXN_MAX_MUTATIONS,
            });
        }

        let mut session = self
            .mongo
            .inner()
            .start_session()
            .await
            .map_err(|e| WardenError::Database(format!("Failed to start session: {}", e)))?;

        session
            .start_transaction()
            .await
            .map_err(|e| WardenError::Database(format!("Failed to start transaction: {}", e)))?;

        for mutation in mutations {
            let applied = match mutation {
                Mutation::Patch {
                    collection,
                    id,
                    update,
                } => self
                    .mongo
                    .documents(collection)
                    .update_one(doc! { "_id": id }, update.clone())
                    .session(&mut session)
                    .await
                    .map(|_| ())
                    .map_err(|e| WardenError::Database(format!("Patch failed: {}", e))),
                Mutation::Delete { collection, id } => self
                    .mongo
                    .documents(collection)
                    .delete_one(doc! { "_id": id })
                    .session(&mut session)
                    .await
                    .map(|_| ())
                    .map_err(|e| WardenError::Database(format!("Delete failed: {}", e))),
            };

            if let Err(e) = applied {
                if let Err(abort_err) = session.abort_transaction().await {
                    warn!("Failed to abort transaction: {}", abort_err);
                }
                return Err(e);
            }
        }

        session
            .commit_transaction()
            .await
            .map_err(|e| WardenError::Database(format!("Commit failed: {}", e)))
    }
}
