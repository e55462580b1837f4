//! fleetbridge CLI - links Source device inventory to Target equipment
//! records and applies the resulting create/update instructions.
//!
//! The collectors that refresh the snapshot files and the review dashboard
//! live outside this binary; the CLI covers the reconciliation jobs an
//! operator (or cron) drives:
//! - Classify devices into automatic/manual customer views
//! - Build the create/update payload files
//! - Apply payloads against the Target API
//! - Edit the durable overrides (exception rules, manual flags)

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod error;

use config::AppConfig;
use error::CliResult;

/// fleetbridge - Source/Target equipment reconciliation
#[derive(Parser)]
#[command(name = "fleetbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to $FLEETBRIDGE_CONFIG or
    /// ./config/fleetbridge.yaml).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition devices into automatic and manual customer views
    Classify,

    /// Build create/update payload files from the current snapshots
    BuildPayloads,

    /// Replay generated payloads against the Target API
    Apply(commands::ApplyArgs),

    /// Add or update an exception rule for a (document, department) pair
    Exception(commands::ExceptionArgs),

    /// Flag or unflag a document for manual review
    Manual(commands::ManualArgs),

    /// Show last-run outcomes and payload file metadata
    Status,
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> CliResult<()> {
    let config_path = cli.config.unwrap_or_else(AppConfig::config_path);
    let mut config = AppConfig::from_file(&config_path)?;
    config.apply_env_overrides();
    config.validate()?;

    init_logging(&config.logging.filter);

    match cli.command {
        Commands::Classify => commands::classify(&config),
        Commands::BuildPayloads => commands::build(&config),
        Commands::Apply(args) => commands::apply(&config, &args).await,
        Commands::Exception(args) => commands::exception(&config, &args),
        Commands::Manual(args) => commands::manual(&config, &args),
        Commands::Status => commands::status(&config),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
