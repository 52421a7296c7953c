use sea_orm::sea_query::{Expr, InsertStatement, OnConflict, Query};
use sea_orm::{ConnectionTrait, DatabaseBackend, EntityTrait, Set, Statement};
use viewcount_domain::model::{CounterId, CounterRecord};
use viewcount_domain::storage::{CounterStore, StorageError, StorageResult};

use crate::entity::counters;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl CounterStore for SeaOrmStorage {
    async fn add_and_get(&self, id: &CounterId, delta: i64, start: i64) -> StorageResult<i64> {
        if delta < 0 {
            return Err(StorageError::Database(format!(
                "counter `{id}` cannot move backwards by {delta}"
            )));
        }
        let initial = start
            .checked_add(delta)
            .ok_or_else(|| saturated(id))?;

        // INSERT .. ON CONFLICT (id) DO UPDATE SET views = counters.views + delta
        // WHERE counters.views <= i64::MAX - delta RETURNING views.
        // A saturated row matches no update and yields no row.
        let views = || Expr::col((counters::Entity, counters::Column::Views));
        let mut query = Query::insert();
        query
            .into_table(counters::Entity)
            .columns([counters::Column::Id, counters::Column::Views])
            .values([id.as_str().into(), initial.into()])
            .map_err(StorageError::from_source)?;
        query.on_conflict(
            OnConflict::column(counters::Column::Id)
                .value(counters::Column::Views, views().add(delta))
                .action_and_where(views().lte(i64::MAX - delta))
                .to_owned(),
        );
        query.returning_col(counters::Column::Views);

        let stmt = build_returning_statement(self.connection().get_database_backend(), &query)?;
        let row = self
            .connection()
            .query_one(stmt)
            .await
            .map_err(StorageError::from_source)?
            .ok_or_else(|| saturated(id))?;

        row.try_get::<i64>("", "views")
            .map_err(StorageError::from_source)
    }

    async fn find_counter(&self, id: &CounterId) -> StorageResult<Option<CounterRecord>> {
        let maybe = counters::Entity::find_by_id(id.as_str().to_owned())
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        maybe.map(counter_to_record).transpose()
    }

    async fn seed_counter(&self, id: &CounterId, views: i64) -> StorageResult<bool> {
        if views < 0 {
            return Err(StorageError::Database(format!(
                "counter `{id}` cannot start at {views}"
            )));
        }
        let model = counters::ActiveModel {
            id: Set(id.as_str().to_owned()),
            views: Set(views),
        };
        let inserted = counters::Entity::insert(model)
            .on_conflict(
                OnConflict::column(counters::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(inserted > 0)
    }
}

fn build_returning_statement(
    backend: DatabaseBackend,
    query: &InsertStatement,
) -> StorageResult<Statement> {
    match backend {
        DatabaseBackend::Sqlite | DatabaseBackend::Postgres => Ok(backend.build(query)),
        DatabaseBackend::MySql => Err(StorageError::Database(
            "mysql backend is not supported".into(),
        )),
    }
}

fn saturated(id: &CounterId) -> StorageError {
    StorageError::Database(format!("counter `{id}` is saturated at {}", i64::MAX))
}

fn counter_to_record(model: counters::Model) -> StorageResult<CounterRecord> {
    let id = CounterId::parse(&model.id).map_err(StorageError::from_source)?;

    Ok(CounterRecord {
        id,
        views: model.views,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> SeaOrmStorage {
        SeaOrmStorage::connect("sqlite::memory:")
            .await
            .expect("storage inits")
    }

    fn counter() -> CounterId {
        CounterId::default()
    }

    #[tokio::test]
    async fn absent_counter_is_initialized_and_incremented() {
        let storage = storage().await;
        assert_eq!(storage.find_counter(&counter()).await.unwrap(), None);

        let views = storage.add_and_get(&counter(), 1, 0).await.unwrap();
        assert_eq!(views, 1);
        assert_eq!(
            storage.find_counter(&counter()).await.unwrap(),
            Some(CounterRecord {
                id: counter(),
                views: 1,
            })
        );
    }

    #[tokio::test]
    async fn existing_counter_keeps_counting() {
        let storage = storage().await;
        assert!(storage.seed_counter(&counter(), 41).await.unwrap());

        assert_eq!(storage.add_and_get(&counter(), 1, 0).await.unwrap(), 42);
        assert_eq!(storage.add_and_get(&counter(), 1, 0).await.unwrap(), 43);
    }

    #[tokio::test]
    async fn seeding_never_overwrites_existing_views() {
        let storage = storage().await;
        storage.add_and_get(&counter(), 1, 0).await.unwrap();
        storage.add_and_get(&counter(), 1, 0).await.unwrap();

        assert!(!storage.seed_counter(&counter(), 0).await.unwrap());
        let record = storage.find_counter(&counter()).await.unwrap().unwrap();
        assert_eq!(record.views, 2);
    }

    #[tokio::test]
    async fn counters_are_tracked_per_id() {
        let storage = storage().await;
        let other = CounterId::parse("crc-views").unwrap();

        storage.add_and_get(&counter(), 1, 0).await.unwrap();
        storage.add_and_get(&counter(), 1, 0).await.unwrap();
        assert_eq!(storage.add_and_get(&other, 1, 0).await.unwrap(), 1);
        assert_eq!(
            storage.find_counter(&counter()).await.unwrap().map(|r| r.views),
            Some(2)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        const CALLS: i64 = 64;
        let storage = storage().await;

        let handles: Vec<_> = (0..CALLS)
            .map(|_| {
                let storage = storage.clone();
                tokio::spawn(async move { storage.add_and_get(&CounterId::default(), 1, 0).await })
            })
            .collect();

        let mut observed = Vec::with_capacity(CALLS as usize);
        for handle in handles {
            observed.push(handle.await.expect("task joins").expect("increment succeeds"));
        }
        observed.sort_unstable();

        assert_eq!(observed, (1..=CALLS).collect::<Vec<_>>());
        let record = storage.find_counter(&counter()).await.unwrap().unwrap();
        assert_eq!(record.views, CALLS);
    }

    #[tokio::test]
    async fn saturated_counter_rejects_increment_and_keeps_value() {
        let storage = storage().await;
        assert!(storage.seed_counter(&counter(), i64::MAX - 1).await.unwrap());

        assert_eq!(storage.add_and_get(&counter(), 1, 0).await.unwrap(), i64::MAX);
        let err = storage.add_and_get(&counter(), 1, 0).await.unwrap_err();
        assert_eq!(
            err,
            StorageError::Database(format!("counter `counter` is saturated at {}", i64::MAX))
        );
        assert_eq!(
            storage.find_counter(&counter()).await.unwrap().map(|r| r.views),
            Some(i64::MAX)
        );
        // The row is still a readable integer, so later calls keep failing cleanly.
        assert!(storage.add_and_get(&counter(), 1, 0).await.is_err());
    }

    #[tokio::test]
    async fn initial_value_overflow_is_rejected_before_writing() {
        let storage = storage().await;
        assert!(storage.add_and_get(&counter(), 1, i64::MAX).await.is_err());
        assert_eq!(storage.find_counter(&counter()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn negative_amounts_are_rejected() {
        let storage = storage().await;
        storage.add_and_get(&counter(), 1, 0).await.unwrap();

        assert!(storage.add_and_get(&counter(), -1, 0).await.is_err());
        assert!(storage.seed_counter(&CounterId::parse("other").unwrap(), -5).await.is_err());
        assert_eq!(
            storage.find_counter(&counter()).await.unwrap().map(|r| r.views),
            Some(1)
        );
    }

    #[test]
    fn mysql_backend_is_rejected_when_building_increment() {
        let query = Query::insert().into_table(counters::Entity).to_owned();
        let err = build_returning_statement(DatabaseBackend::MySql, &query).unwrap_err();
        assert_eq!(err, StorageError::Database("mysql backend is not supported".into()));
    }

    #[tokio::test]
    async fn builder_requires_database_url() {
        let err = SeaOrmStorage::builder().build().await.err().unwrap();
        assert_eq!(err, StorageError::Database("missing database url".into()));
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let storage = storage().await;
        storage.add_and_get(&counter(), 1, 0).await.unwrap();

        crate::migration::run_migrations(storage.connection())
            .await
            .expect("second migration run succeeds");
        assert_eq!(storage.add_and_get(&counter(), 1, 0).await.unwrap(), 2);
    }
}
