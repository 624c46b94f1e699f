//! Database layer for timewarden

pub mod mongo;
pub mod schemas;

pub use mongo::{IntoIndexes, MongoClient};
