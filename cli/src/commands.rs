//! Subcommand handlers wiring real clients into the engine

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use migrator::migration::{
    validation, CancelSignal, ConsoleProgressReporter, JsonProgressReporter, MigrationFailure,
    MigrationReport, Orchestrator, ProgressReporter,
};
use migrator::services::client::{DashboardApi, DashboardClient};
use migrator::services::gateway::CommandGateway;
use migrator::MigrationConfig;
use tracing::{info, warn};

use crate::args::{Cli, DriverArgs, RequestArgs, ResumeArgs, RunArgs};

/// Config file (if any) with command-line overrides applied
pub fn load_config(cli: &Cli) -> anyhow::Result<MigrationConfig> {
    let mut config = match &cli.config {
        Some(path) => MigrationConfig::from_file(path)?,
        None => MigrationConfig::default(),
    };
    if let Some(dir) = &cli.work_dir {
        config.storage.work_dir = dir.clone();
    }
    config.gateway.debug |= cli.debug;
    config
        .validate()
        .map_err(|errors| anyhow!("invalid configuration: {}", errors.join("; ")))?;
    Ok(config)
}

pub async fn run(cli: &Cli, args: &RunArgs, config: MigrationConfig) -> anyhow::Result<ExitCode> {
    let orchestrator = orchestrator(cli, &args.driver, config)?;
    let outcome = orchestrator
        .run_migration(args.request.to_request())
        .await;
    Ok(finish(cli, outcome))
}

pub async fn resume(
    cli: &Cli,
    args: &ResumeArgs,
    config: MigrationConfig,
) -> anyhow::Result<ExitCode> {
    let orchestrator = orchestrator(cli, &args.driver, config)?;
    let outcome = orchestrator.resume_from_file(&args.state).await;
    Ok(finish(cli, outcome))
}

pub async fn verify(
    cli: &Cli,
    args: &RequestArgs,
    config: &MigrationConfig,
) -> anyhow::Result<ExitCode> {
    let (source, target) = clients(cli, config)?;
    let request = args.to_request();
    match validation::verify_access(source.as_ref(), target.as_ref(), &request).await {
        Ok(()) => {
            println!(
                "Access verified: {} ({}) in {} → {}",
                request.source_network.name,
                request.source_network.id,
                request.source_org.name,
                request.target_org.name
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Verification failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn clients(
    cli: &Cli,
    config: &MigrationConfig,
) -> anyhow::Result<(Arc<dyn DashboardApi>, Arc<dyn DashboardApi>)> {
    let source_key = cli
        .source_api_key
        .clone()
        .context("source API key missing (set MERAKI_SOURCE_API_KEY or --source-api-key)")?;
    let target_key = cli.target_api_key.clone().unwrap_or_else(|| source_key.clone());

    let source: Arc<dyn DashboardApi> = Arc::new(
        DashboardClient::new(source_key, &config.api).context("building source client")?,
    );
    let target: Arc<dyn DashboardApi> = Arc::new(
        DashboardClient::new(target_key, &config.api).context("building target client")?,
    );
    Ok((source, target))
}

fn orchestrator(
    cli: &Cli,
    driver: &DriverArgs,
    mut config: MigrationConfig,
) -> anyhow::Result<Orchestrator> {
    check_driver(&driver.driver)?;
    config.gateway.headless |= driver.headless;

    let (source, target) = clients(cli, &config)?;
    let gateway = CommandGateway::new(
        driver.driver.clone(),
        driver.username.clone(),
        driver.password.clone(),
        config.gateway.clone(),
    );

    let orchestrator = Orchestrator::new(source, target, Arc::new(gateway), config);
    watch_ctrl_c(orchestrator.cancel_signal());
    Ok(orchestrator)
}

fn check_driver(path: &Path) -> anyhow::Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(anyhow!("UI driver {} not found", path.display()))
    }
}

/// First Ctrl-C stops the run at the next phase boundary
fn watch_ctrl_c(cancel: CancelSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("[Cli] Interrupt received; stopping after the current phase");
            cancel.cancel();
        }
    });
}

fn finish(cli: &Cli, outcome: Result<MigrationReport, MigrationFailure>) -> ExitCode {
    let reporter: Box<dyn ProgressReporter> = if cli.json {
        Box::new(JsonProgressReporter)
    } else {
        Box::new(ConsoleProgressReporter)
    };

    match outcome {
        Ok(report) => {
            info!("[Cli] State saved to {}", report.state_path.display());
            reporter.report_completion(&report);
            ExitCode::SUCCESS
        }
        Err(failure) => {
            reporter.report_failure(&failure);
            ExitCode::FAILURE
        }
    }
}
