//! `meraki-migrate`: move a dashboard network between organizations

mod args;
mod commands;
mod telemetry;

use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use args::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = commands::load_config(&cli)?;

    let log_path = telemetry::init_tracing(cli.debug, &config.storage.work_dir)?;
    info!("[Cli] Logging to {}", log_path.display());

    match &cli.command {
        Command::Run(args) => commands::run(&cli, args, config).await,
        Command::Resume(args) => commands::resume(&cli, args, config).await,
        Command::Verify(args) => commands::verify(&cli, args, &config).await,
    }
}
