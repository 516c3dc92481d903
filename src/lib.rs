pub mod autosave;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod errors;
pub mod layout;
pub mod models;
pub mod widgets;

use crate::cli::{Cli, Command};
use crate::config::AppConfig;
use crate::dashboard::DashboardCore;
use crate::errors::AppResult;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;

pub use crate::dashboard::today;
pub use crate::errors::AppError;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", to_client_error(&error));
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = Some(dir);
    }

    let data_dir = config.resolved_data_dir()?;
    if let Err(error) = init_tracing(&data_dir, &config.log_level) {
        eprintln!("logging disabled: {}", error);
    }
    tracing::info!(data_dir = %data_dir.display(), "life-os starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let command = cli.command.unwrap_or(Command::Dashboard);
    runtime.block_on(async move {
        let core = DashboardCore::open(config)?;
        cli::execute(&core, command, cli.json).await
    })?;
    Ok(())
}

fn init_tracing(data_dir: &Path, default_level: &str) -> AppResult<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "life-os.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| AppError::Internal(error.to_string()))
}

pub fn to_client_error(error: impl std::fmt::Display) -> String {
    error.to_string()
}
