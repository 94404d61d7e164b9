pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod models;
pub mod trial;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Parse arguments, open the cohort database, run one command.
pub fn run() -> ExitCode {
    let cli = cli::Cli::parse();

    let fallback = match cli.log_level() {
        "info" => config::default_log_filter().to_string(),
        level => format!("retractobot={level},retractobot_lib={level}"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let path = cli.database.clone().unwrap_or_else(config::default_database_path);
    let conn = match db::sqlite::open_database(&path) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Cannot open cohort database");
            return ExitCode::FAILURE;
        }
    };

    match commands::dispatch(&conn, config::TrialConfig::default(), cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}
