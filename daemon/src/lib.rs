pub mod audio;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod features;
pub mod hub;
pub mod orchestrator;
pub mod processor;
pub mod server;
pub mod socket;
pub mod store;
pub mod task;

use anyhow::Context;
use audio_research_common::dirs;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable for log filtering (overrides config).
const LOG_ENV_VAR: &str = "ARS_LOG";

/// Entry point for the daemon process: configures logging and launches the daemon.
pub async fn run() -> anyhow::Result<()> {
    let config = config::Config::load().unwrap_or_default();

    let log_path = dirs::log_path().context("Failed to determine log path")?;
    let log_dir = log_path.parent().context("Log path has no parent")?;
    let log_filename = log_path.file_name().context("Log path has no file name")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::builder()
        .with_env_var(LOG_ENV_VAR)
        .with_default_directive(config.logging.level.as_directive().parse()?)
        .from_env()?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(filter)
        .init();

    daemon::run(config).await
}
