//! Provisioning helper that creates the counter record before the API serves
//! traffic. Existing records are never modified.

use std::env;
use std::process;

use tracing::info;
use viewcount_domain::config::StorageConfig;
use viewcount_domain::services::counter::INITIAL_VIEWS;
use viewcount_domain::services::telemetry::{init_telemetry, TelemetryConfig};
use viewcount_domain::storage::CounterStore;
use viewcount_storage::SeaOrmStorage;

#[tokio::main]
async fn main() {
    let initial_views = match parse_initial_views(env::args().nth(1)) {
        Ok(views) => views,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("Usage: seed_counter [initial_views]");
            process::exit(2);
        }
    };

    let config = match StorageConfig::load_from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            process::exit(1);
        }
    };

    if let Err(err) = init_telemetry(&TelemetryConfig::from_env("SEED")) {
        eprintln!("failed to initialize telemetry: {err}");
        process::exit(1);
    }

    let storage = match SeaOrmStorage::connect(config.database_url()).await {
        Ok(storage) => storage,
        Err(err) => {
            eprintln!("failed to connect to storage: {err}");
            process::exit(1);
        }
    };

    let id = config.counter_id();
    let created = match storage.seed_counter(id, initial_views).await {
        Ok(created) => created,
        Err(err) => {
            eprintln!("failed to seed counter `{id}`: {err}");
            process::exit(1);
        }
    };

    match storage.find_counter(id).await {
        Ok(Some(record)) if created => {
            info!(counter_id = %id, views = record.views, "counter seeded");
            println!("Seeded counter `{id}` with {} views", record.views);
        }
        Ok(Some(record)) => {
            println!(
                "Counter `{id}` already exists with {} views; left unchanged",
                record.views
            );
        }
        Ok(None) => {
            eprintln!("counter `{id}` missing after seeding");
            process::exit(1);
        }
        Err(err) => {
            eprintln!("failed to read counter `{id}`: {err}");
            process::exit(1);
        }
    }
}

fn parse_initial_views(arg: Option<String>) -> Result<i64, String> {
    let Some(raw) = arg else {
        return Ok(INITIAL_VIEWS);
    };
    let views: i64 = raw
        .trim()
        .parse()
        .map_err(|err| format!("invalid initial views `{raw}`: {err}"))?;
    if views < 0 {
        return Err(format!("initial views must be non-negative, got {views}"));
    }
    Ok(views)
}
