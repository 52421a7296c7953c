//! Shared service helpers: the counter increment service and telemetry wiring.

pub mod counter;
pub mod telemetry;

pub use counter::*;
pub use telemetry::*;
