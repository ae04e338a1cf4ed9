//! Tracing initialization: console output plus a per-run log file

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber and return the log file path.
///
/// `RUST_LOG` wins over `debug` when set.
pub fn init_tracing(debug: bool, work_dir: &Path) -> anyhow::Result<PathBuf> {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("migrator={level},meraki_migrate={level}", level = default_level).into()
    });

    std::fs::create_dir_all(work_dir)
        .with_context(|| format!("creating work directory {}", work_dir.display()))?;
    let log_path = work_dir.join(log_file_name(chrono::Local::now()));
    let log_file = File::create(&log_path)
        .with_context(|| format!("creating log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();
    Ok(log_path)
}

fn log_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("meraki_migration_{}.log", now.format("%Y%m%d_%H%M%S"))
}
