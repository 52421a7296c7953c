use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use thiserror::Error;
use tracing::info;

use viewcount_domain::config::{ApiConfig, ConfigError, ListenerConfig};
use viewcount_domain::services::{
    counter::CounterService,
    telemetry::{init_telemetry, TelemetryConfig, TelemetryError},
};
use viewcount_domain::storage::{CounterStore, StorageError};
use viewcount_storage::SeaOrmStorage;

use crate::{
    handlers::{cors_defaults, metrics_handler, views_handler},
    state::AppState,
};

/// 公共计数路径，GET 与 POST 都会自增一次。
pub const VIEWS_PATH: &str = "/api/v1/views";
pub const METRICS_PATH: &str = "/metrics";

pub async fn run() -> Result<(), BootstrapError> {
    let config = ApiConfig::load_from_env()?;
    let telemetry = init_telemetry(&TelemetryConfig::from_env("API"))?;

    let store: Arc<dyn CounterStore> =
        Arc::new(SeaOrmStorage::connect(config.database_url()).await?);
    let counter = CounterService::new(store, config.counter_id().clone());
    let state = AppState::new(counter, config.response_headers(), telemetry);

    let public_target = bind_target(config.public_listener())?;
    let internal_target = config.internal_listener().map(bind_target).transpose()?;
    info!(
        counter_id = %config.counter_id(),
        public = %public_target,
        internal = ?internal_target.as_ref().map(ToString::to_string),
        "starting view counter api"
    );

    // 有内部监听器时，/metrics 不出现在公网上。
    let metrics_on_public = internal_target.is_none();
    let public_state = state.clone();
    let public = HttpServer::new(move || {
        let app = App::new()
            .app_data(web::Data::new(public_state.clone()))
            .wrap(cors_defaults(public_state.response_headers()))
            .wrap(Logger::default())
            .service(
                web::resource(VIEWS_PATH)
                    .route(web::get().to(views_handler))
                    .route(web::post().to(views_handler)),
            );
        if metrics_on_public {
            app.route(METRICS_PATH, web::get().to(metrics_handler))
        } else {
            app
        }
    });
    let public = match public_target {
        BindTarget::Tcp(addr) => public.bind(addr)?,
        #[cfg(unix)]
        BindTarget::Unix(path) => public.bind_uds(path)?,
    }
    .run();

    let Some(internal_target) = internal_target else {
        public.await?;
        return Ok(());
    };

    let internal = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .route(METRICS_PATH, web::get().to(metrics_handler))
    });
    let internal = match internal_target {
        BindTarget::Tcp(addr) => internal.bind(addr)?,
        #[cfg(unix)]
        BindTarget::Unix(path) => internal.bind_uds(path)?,
    }
    .run();

    tokio::try_join!(public, internal)?;
    Ok(())
}

/// Resolved listen location for one server.
#[derive(Debug, PartialEq, Eq)]
enum BindTarget<'a> {
    Tcp(&'a str),
    #[cfg(unix)]
    Unix(&'a str),
}

impl std::fmt::Display for BindTarget<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindTarget::Tcp(addr) => write!(f, "tcp://{addr}"),
            #[cfg(unix)]
            BindTarget::Unix(path) => write!(f, "unix://{path}"),
        }
    }
}

/// Picks the socket when one is configured, otherwise the TCP address. A
/// stale socket file left by a previous run is removed first.
fn bind_target(listener: &ListenerConfig) -> Result<BindTarget<'_>, BootstrapError> {
    match (listener.unix_socket(), listener.address()) {
        (Some(socket), _) => unix_target(socket),
        (None, Some(addr)) => Ok(BindTarget::Tcp(addr)),
        (None, None) => Err(BootstrapError::NoBindTarget),
    }
}

#[cfg(unix)]
fn unix_target(socket: &str) -> Result<BindTarget<'_>, BootstrapError> {
    match std::fs::remove_file(socket) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(BindTarget::Unix(socket)),
    }
}

#[cfg(not(unix))]
fn unix_target(socket: &str) -> Result<BindTarget<'_>, BootstrapError> {
    Err(BootstrapError::UnixSocketUnsupported(socket.to_owned()))
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("listener has neither a unix socket nor a tcp address")]
    NoBindTarget,
    #[cfg(not(unix))]
    #[error("unix socket `{0}` is not supported on this platform")]
    UnixSocketUnsupported(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
