//! Process-wide tracing subscriber and Prometheus recorder.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{load_dotenv, read_var};

const DEFAULT_LOG_FILTER: &str = "info";

static TRACING: OnceCell<()> = OnceCell::new();
static RECORDER: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    log_filter: String,
}

impl TelemetryConfig {
    pub fn new(log_filter: impl Into<String>) -> Self {
        Self {
            log_filter: log_filter.into(),
        }
    }

    /// `API` reads `API_LOG_FILTER`, `seed` reads `SEED_LOG_FILTER`.
    pub fn from_env(prefix: &str) -> Self {
        let _ = load_dotenv();
        let key = format!("{}_LOG_FILTER", prefix.trim().to_ascii_uppercase());
        Self::new(read_var(&key).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned()))
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }
}

/// Handle onto the installed recorder, used by the `/metrics` route.
#[derive(Clone)]
pub struct TelemetryGuard {
    recorder: PrometheusHandle,
}

impl TelemetryGuard {
    pub fn render_metrics(&self) -> String {
        self.recorder.render()
    }
}

/// Installs both sinks on first use. The log filter of later calls is ignored.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    TRACING.get_or_try_init(|| install_subscriber(config.log_filter()))?;
    let recorder = RECORDER
        .get_or_try_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .map_err(|err| TelemetryError::Metrics(err.to_string()))
        })?
        .clone();

    Ok(TelemetryGuard { recorder })
}

fn install_subscriber(directives: &str) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(directives)
        .map_err(|err| TelemetryError::InvalidLogFilter(err.to_string()))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|err| TelemetryError::Tracing(err.to_string()))
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(String),
    #[error("failed to install tracing subscriber: {0}")]
    Tracing(String),
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}
