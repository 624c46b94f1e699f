//! Shared error and result types for timewarden

use thiserror::Error;

/// Errors produced by the gateway and the cascade engine
#[derive(Debug, Error)]
pub enum WardenError {
    /// Store read/write failure (connection, query, transaction)
    #[error("Database error: {0}")]
    Database(String),

    /// A batch exceeded the store's per-transaction mutation ceiling
    #[error("Batch of {size} mutations exceeds the transaction ceiling of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    /// The store refused a terminal delete because documents still
    /// reference the entity. Carries the offending document ids.
    #[error("Entity is still referenced by {} document(s)", .referencing_ids.len())]
    ReferenceConflict { referencing_ids: Vec<String> },

    /// Configuration error at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication/authorization failure
    #[error("Auth error: {0}")]
    Auth(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("BSON decode error: {0}")]
    Bson(#[from] bson::de::Error),
}

pub type Result<T> = std::result::Result<T, WardenError>;
