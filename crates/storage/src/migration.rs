use sea_orm::sea_query::{ColumnDef, Table};
use sea_orm::{ConnectionTrait, DatabaseConnection};

use crate::entity::counters;
use viewcount_domain::model::COUNTER_ID_MAX_LENGTH;
use viewcount_domain::storage::{StorageError, StorageResult};

/// Creates the `counters` table when missing. Existing tables are left as is.
pub async fn run_migrations(db: &DatabaseConnection) -> StorageResult<()> {
    let backend = db.get_database_backend();

    let counters_table = Table::create()
        .if_not_exists()
        .table(counters::Entity)
        .col(
            ColumnDef::new(counters::Column::Id)
                .string_len(COUNTER_ID_MAX_LENGTH as u32)
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(counters::Column::Views)
                .big_integer()
                .not_null()
                .default(0),
        )
        .to_owned();
    db.execute(backend.build(&counters_table))
        .await
        .map_err(StorageError::from_source)?;

    Ok(())
}
