pub mod analytics; // Clinic KPI engine
pub mod board; // Same-day appointment board
pub mod cli;
pub mod commands;
pub mod config;
pub mod dashboard; // KPI dashboard view
pub mod db;
pub mod ingest; // Row normalization boundary
pub mod models;
pub mod registration; // Patient + appointment registration

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Entry point for the `clinic-ops` binary.
pub fn run() -> Result<(), String> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let output = cli::execute(cli)?;
    println!("{output}");
    Ok(())
}
