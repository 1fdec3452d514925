//! Single-station evaluation
//!
//! Fetches the authoritative metrics for one station and prints them as
//! JSON. Stale or missing metrics are recomputed and saved, exactly as the
//! HTTP endpoint would do.
//!
//! Usage:
//!   cargo run --bin evaluate_station -- --station STN1001
//!
//! Options:
//!   --at RFC3339   Evaluate as of this instant instead of now
//!   --dry-run      Always evaluate, print the result, save nothing
//!   --config PATH  Configuration file (default: gwres.toml)
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string

use chrono::{DateTime, Utc};
use clap::Parser;
use gwres_service::config::{DEFAULT_CONFIG_PATH, load_config_or_default};
use gwres_service::db::PgStore;
use gwres_service::engine::{evaluate, window_start};
use gwres_service::monitor::MetricsService;
use gwres_service::store::{ResourceStore, StoreError};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "evaluate_station", about = "Evaluate groundwater metrics for one station")]
struct Args {
    /// Station identifier
    #[arg(long)]
    station: String,

    /// Evaluation instant (RFC 3339); defaults to now
    #[arg(long)]
    at: Option<DateTime<Utc>>,

    /// Evaluate without consulting or writing stored metrics
    #[arg(long)]
    dry_run: bool,

    #[arg(long, env = "GWRES_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let now = args.at.unwrap_or_else(Utc::now);
    let config = load_config_or_default(&args.config)?;
    let mut store = PgStore::connect()?;

    let json = if args.dry_run {
        let station = store
            .station(&args.station)?
            .ok_or_else(|| StoreError::StationNotFound(args.station.clone()))?;
        let window = store.measurements_between(
            &station.station_id,
            window_start(now, config.engine.period_days),
            now,
        )?;
        let metrics = evaluate(&station, &window, now, &config.engine)?;
        serde_json::to_string_pretty(&metrics)?
    } else {
        let mut service = MetricsService::new(store, config.engine);
        let outcome = service.metrics_for(&args.station, now)?;
        tracing::info!(state = %outcome.prior_state, recomputed = outcome.recomputed, "metrics resolved");
        serde_json::to_string_pretty(&outcome.metrics)?
    };

    println!("{}", json);
    Ok(())
}
