use std::{sync::Arc, time::Instant};

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::CounterId;
use crate::storage::{CounterStore, StorageError};

/// Value an absent record is initialized to before the first increment.
pub const INITIAL_VIEWS: i64 = 0;

const INCREMENT: i64 = 1;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("counter store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),
}

/// Increments one fixed counter record through the store's atomic add.
///
/// The service keeps no counter state of its own; every call is a single
/// round trip and concurrent callers are serialized by the store.
#[derive(Clone)]
pub struct CounterService {
    store: Arc<dyn CounterStore>,
    counter_id: CounterId,
}

impl CounterService {
    pub fn new(store: Arc<dyn CounterStore>, counter_id: CounterId) -> Self {
        Self { store, counter_id }
    }

    pub fn counter_id(&self) -> &CounterId {
        &self.counter_id
    }

    /// Adds one view and returns the value after the increment. Store failures
    /// are returned as-is; nothing is retried.
    pub async fn increment_and_get(&self) -> Result<i64, CounterError> {
        let started = Instant::now();
        let result = self
            .store
            .add_and_get(&self.counter_id, INCREMENT, INITIAL_VIEWS)
            .await;
        histogram!("counter_store_seconds").record(started.elapsed().as_secs_f64());

        match result {
            Ok(views) => {
                counter!("counter_increments_total", "result" => "ok").increment(1);
                debug!(counter_id = %self.counter_id, views, "counter incremented");
                Ok(views)
            }
            Err(err) => {
                counter!("counter_increments_total", "result" => "store_unavailable").increment(1);
                warn!(counter_id = %self.counter_id, error = %err, "counter store unavailable");
                Err(CounterError::StoreUnavailable(err))
            }
        }
    }
}
