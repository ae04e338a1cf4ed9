use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{DeviceGateway, GatewayError, NetworkRef, OrgRef};
use crate::services::config::GatewayConfig;

/// Runs an external browser-automation driver once per capability call.
///
/// The driver is invoked as
/// `<program> <remove|unclaim|claim> --serial S --org-id O --org-name N
/// [--network-id I --network-name M] [--headless] [--debug]`
/// with dashboard credentials in `DASHBOARD_USERNAME` / `DASHBOARD_PASSWORD`.
/// Exit status zero means the step was applied.
#[derive(Clone)]
pub struct CommandGateway {
    program: PathBuf,
    username: String,
    password: String,
    config: GatewayConfig,
}

impl std::fmt::Debug for CommandGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandGateway")
            .field("program", &self.program)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl CommandGateway {
    pub fn new(
        program: impl Into<PathBuf>,
        username: impl Into<String>,
        password: impl Into<String>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            program: program.into(),
            username: username.into(),
            password: password.into(),
            config,
        }
    }

    fn build_args(
        &self,
        capability: &str,
        serial: &str,
        org: &OrgRef,
        network: Option<&NetworkRef>,
    ) -> Vec<String> {
        let mut args = vec![
            capability.to_string(),
            "--serial".to_string(),
            serial.to_string(),
            "--org-id".to_string(),
            org.id.clone(),
            "--org-name".to_string(),
            org.name.clone(),
        ];
        if let Some(network) = network {
            args.extend([
                "--network-id".to_string(),
                network.id.clone(),
                "--network-name".to_string(),
                network.name.clone(),
            ]);
        }
        if self.config.headless {
            args.push("--headless".to_string());
        }
        if self.config.debug {
            args.push("--debug".to_string());
        }
        args
    }

    async fn run(
        &self,
        capability: &str,
        serial: &str,
        org: &OrgRef,
        network: Option<&NetworkRef>,
    ) -> Result<(), GatewayError> {
        let args = self.build_args(capability, serial, org, network);
        info!("[Gateway] {} {} via {}", capability, serial, self.program.display());

        let child = Command::new(&self.program)
            .args(&args)
            .env("DASHBOARD_USERNAME", &self.username)
            .env("DASHBOARD_PASSWORD", &self.password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GatewayError::Unavailable {
                reason: format!("failed to start {}: {}", self.program.display(), e),
            })?;

        let timeout = Duration::from_secs(self.config.step_timeout_secs);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| GatewayError::TimedOut {
                seconds: self.config.step_timeout_secs,
            })?
            .map_err(|e| GatewayError::Unavailable {
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("[Gateway] driver output: {}", stdout.trim());
        }

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = last_line(&stderr)
                .or_else(|| last_line(&stdout))
                .unwrap_or_else(|| format!("driver exited with {}", output.status));
            warn!("[Gateway] {} {} failed: {}", capability, serial, reason);
            Err(GatewayError::StepFailed { reason })
        }
    }
}

fn last_line(text: &str) -> Option<String> {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl DeviceGateway for CommandGateway {
    async fn remove_from_network(
        &self,
        serial: &str,
        org: &OrgRef,
        network: &NetworkRef,
    ) -> Result<(), GatewayError> {
        self.run("remove", serial, org, Some(network)).await
    }

    async fn unclaim_device(&self, serial: &str, org: &OrgRef) -> Result<(), GatewayError> {
        self.run("unclaim", serial, org, None).await
    }

    async fn claim_device(&self, serial: &str, org: &OrgRef) -> Result<(), GatewayError> {
        self.run("claim", serial, org, None).await
    }
}
