//! SeaORM-backed storage adapter that satisfies the domain `CounterStore`
//! port while keeping the database backend swappable (SQLite by default,
//! PostgreSQL via feature flag).

mod builder;
mod counter_store;
mod entity;
mod migration;

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use viewcount_domain::storage::StorageResult;

pub use builder::StorageBuilder;

/// Shared storage handle used by the HTTP API and the provisioning binary.
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStorage {
    /// Connects to the provided database URL and ensures the schema is present.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::builder().database_url(database_url).build().await
    }

    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    pub(crate) fn from_connection(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }
}
