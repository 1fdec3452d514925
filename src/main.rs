//! Groundwater Resource Service - Main Daemon
//!
//! A server-side daemon that periodically:
//! 1. Checks every active station's metrics for staleness
//! 2. Re-evaluates absent or stale stations in parallel
//! 3. Appends the new records to PostgreSQL
//! 4. Optionally serves metrics and alert summaries over HTTP
//!
//! Usage:
//!   cargo run --release                         # Start daemon without HTTP endpoint
//!   cargo run --release -- --endpoint 8080      # Start with HTTP endpoint on port 8080
//!   cargo run --release -- --once               # Single refresh sweep, then exit
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string
//!   GWRES_CONFIG - Path to gwres.toml (default: ./gwres.toml)
//!   RUST_LOG     - Log filter (default: info)

use chrono::Utc;
use clap::Parser;
use gwres_service::config::{DEFAULT_CONFIG_PATH, load_config_or_default};
use gwres_service::daemon::Daemon;
use gwres_service::db::PgStore;
use gwres_service::endpoint;
use gwres_service::monitor::MetricsService;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gwres_service", version, about = "Groundwater resource evaluation daemon")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, env = "GWRES_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Serve the HTTP endpoint on this port (overrides `service.endpoint_port`)
    #[arg(long)]
    endpoint: Option<u16>,

    /// Run a single refresh sweep and exit
    #[arg(long)]
    once: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match load_config_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %cli.config, error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let store = match PgStore::connect() {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "database initialization failed");
            std::process::exit(1);
        }
    };

    // Start HTTP endpoint if requested (in background thread, own connection)
    if let Some(port) = cli.endpoint.or(config.service.endpoint_port) {
        match PgStore::connect() {
            Ok(endpoint_store) => {
                let service = MetricsService::new(endpoint_store, config.engine.clone());
                std::thread::spawn(move || {
                    if let Err(e) = endpoint::start_endpoint_server(port, service) {
                        tracing::error!(error = %e, "HTTP endpoint stopped");
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "no database connection for endpoint, continuing without it");
            }
        }
    }

    let mut daemon = Daemon::new(store, config.engine, config.service);

    if cli.once {
        match daemon.refresh_all(Utc::now()) {
            Ok(summary) => {
                tracing::info!(
                    fresh = summary.fresh,
                    recomputed = summary.recomputed,
                    failed = summary.failed,
                    "refresh complete"
                );
                if summary.failed > 0 {
                    std::process::exit(2);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "refresh failed");
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = daemon.run() {
        tracing::error!(error = %e, "daemon error");
        std::process::exit(1);
    }
}
