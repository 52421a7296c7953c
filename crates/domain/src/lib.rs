//! Domain-level building blocks shared by the API, the storage adapter and the
//! provisioning binary.
//!
//! The crate owns the counter model, the storage port the service increments
//! through, environment-driven configuration and telemetry wiring. It never
//! talks to a database directly; `viewcount_storage` implements the port.

pub mod config;
pub mod model;
pub mod services;
pub mod storage;

pub use services::counter::{CounterError, CounterService};
pub use storage::{CounterStore, StorageError, StorageResult};
