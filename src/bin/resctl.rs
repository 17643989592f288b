use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use reservation_core::config::loader::load_config;
use reservation_core::config::resolver::ConfigurationResolver;
use reservation_core::config::schema::CoreConfig;
use reservation_core::connection::ConnectionManager;
use reservation_core::health::aggregator::{CheckOptions, RestAccessProbe};
use reservation_core::health::{HealthAggregator, HealthMonitor};
use reservation_core::observability::init_logging;
use reservation_core::storage::{FileStore, KvStore};

#[derive(Parser)]
#[command(name = "resctl")]
#[command(about = "Management CLI for the reservation backend core", long_about = None)]
struct Cli {
    /// Path to the tuning config file (defaults apply if missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the connection state snapshot without touching the backend
    Status,
    /// Initialize the backend connection and report the outcome
    Probe,
    /// Run a full health check across every component
    Check,
    /// Dump the persisted health metrics
    Metrics,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CoreConfig::default(),
    };
    init_logging(&config.observability.log_level);

    let store: Arc<dyn KvStore> = Arc::new(FileStore::new(&config.storage.path));
    let resolver = ConfigurationResolver::from_env();
    let manager = ConnectionManager::new(resolver.clone(), config.connection.clone(), store.clone());

    match cli.command {
        Commands::Status => {
            let snapshot = manager.status();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Probe => match manager.initialize().await {
            Ok(_) => {
                println!("{}", serde_json::to_string_pretty(&manager.status())?);
            }
            Err(e) => {
                eprintln!("Error: initialization failed: {}", e.message);
                for step in &e.remediation {
                    eprintln!("  - {}", step);
                }
                std::process::exit(1);
            }
        },
        Commands::Check => {
            let _ = manager.initialize().await;
            let monitor = Arc::new(HealthMonitor::load(store, config.health.clone()).await);
            let probe = Arc::new(RestAccessProbe::new(
                manager.clone(),
                config.aggregator.access_audit_path.clone(),
            ));
            let aggregator = HealthAggregator::new(
                manager,
                monitor,
                resolver,
                probe,
                config.aggregator.clone(),
            );
            let report = aggregator.perform_health_check(CheckOptions::default()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Metrics => {
            let monitor = HealthMonitor::load(store, config.health.clone()).await;
            println!("{}", serde_json::to_string_pretty(&monitor.metrics())?);
        }
    }

    Ok(())
}
