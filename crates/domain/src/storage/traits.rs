use async_trait::async_trait;
use thiserror::Error;

use crate::model::{CounterId, CounterRecord};

/// Common result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
}

impl StorageError {
    pub fn from_source(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically adds `delta` to the record's `views`, creating the record
    /// with `start + delta` when absent, and returns the updated value.
    async fn add_and_get(&self, id: &CounterId, delta: i64, start: i64) -> StorageResult<i64>;

    async fn find_counter(&self, id: &CounterId) -> StorageResult<Option<CounterRecord>>;

    /// Inserts the record only if it does not exist yet. Returns `true` when a
    /// new record was written.
    async fn seed_counter(&self, id: &CounterId, views: i64) -> StorageResult<bool>;
}
