//! Per-device re-homing steps
//!
//! Every UI step is preceded by an API check of the device's current state,
//! so a step the vendor already applied (for example before a crash, ahead
//! of the state file being written) is never repeated.

use tracing::info;

use super::StepOutcome;
use crate::migration::types::{DeviceStep, MigrationPhase, MigrationRequest};
use crate::services::client::DashboardApi;
use crate::services::errors::MigrationError;
use crate::services::gateway::{DeviceGateway, GatewayError};

/// A rejected or timed-out step fails only this device; a driver that cannot
/// run at all blocks the phase.
fn ui_failure(serial: &str, step: DeviceStep, error: GatewayError) -> MigrationError {
    match error {
        GatewayError::Unavailable { reason } => MigrationError::PhaseBlocked {
            phase: step_phase(step),
            reason: format!("UI driver unavailable: {}", reason),
        },
        GatewayError::StepFailed { reason } => MigrationError::UiStepFailed {
            serial: serial.to_string(),
            step,
            reason,
        },
        timed_out @ GatewayError::TimedOut { .. } => MigrationError::UiStepFailed {
            serial: serial.to_string(),
            step,
            reason: timed_out.to_string(),
        },
    }
}

fn step_phase(step: DeviceStep) -> MigrationPhase {
    match step {
        DeviceStep::Remove => MigrationPhase::RemovingDevices,
        DeviceStep::Unclaim => MigrationPhase::Unclaiming,
        DeviceStep::Claim => MigrationPhase::Claiming,
        DeviceStep::Attach => MigrationPhase::AddingDevices,
    }
}

/// Remove `serial` from the source network
pub async fn remove_device(
    source: &dyn DashboardApi,
    gateway: &dyn DeviceGateway,
    request: &MigrationRequest,
    serial: &str,
) -> Result<StepOutcome, MigrationError> {
    let device = source
        .get_device(serial)
        .await
        .map_err(|e| MigrationError::api(format!("look up device {}", serial), e))?;

    let still_in_network = device
        .as_ref()
        .and_then(|d| d.network_id.as_deref())
        .map(|id| id == request.source_network.id)
        .unwrap_or(false);
    if !still_in_network {
        info!("[Devices] {} already removed from {}", serial, request.source_network.id);
        return Ok(StepOutcome::AlreadyDone);
    }

    gateway
        .remove_from_network(serial, &request.source_org, &request.source_network)
        .await
        .map_err(|e| ui_failure(serial, DeviceStep::Remove, e))?;
    info!("[Devices] Removed {} from {}", serial, request.source_network.name);
    Ok(StepOutcome::Applied)
}

/// Release `serial` from the source organization inventory
pub async fn unclaim_device(
    source: &dyn DashboardApi,
    gateway: &dyn DeviceGateway,
    request: &MigrationRequest,
    serial: &str,
) -> Result<StepOutcome, MigrationError> {
    let inventory = source
        .get_inventory_device(&request.source_org.id, serial)
        .await
        .map_err(|e| MigrationError::api(format!("look up source inventory {}", serial), e))?;
    if inventory.is_none() {
        info!("[Devices] {} already unclaimed from {}", serial, request.source_org.id);
        return Ok(StepOutcome::AlreadyDone);
    }

    gateway
        .unclaim_device(serial, &request.source_org)
        .await
        .map_err(|e| ui_failure(serial, DeviceStep::Unclaim, e))?;
    info!("[Devices] Unclaimed {} from {}", serial, request.source_org.name);
    Ok(StepOutcome::Applied)
}

/// Claim `serial` into the target organization inventory
pub async fn claim_device(
    target: &dyn DashboardApi,
    gateway: &dyn DeviceGateway,
    request: &MigrationRequest,
    serial: &str,
) -> Result<StepOutcome, MigrationError> {
    let inventory = target
        .get_inventory_device(&request.target_org.id, serial)
        .await
        .map_err(|e| MigrationError::api(format!("look up target inventory {}", serial), e))?;
    if inventory.is_some() {
        info!("[Devices] {} already claimed into {}", serial, request.target_org.id);
        return Ok(StepOutcome::AlreadyDone);
    }

    gateway
        .claim_device(serial, &request.target_org)
        .await
        .map_err(|e| ui_failure(serial, DeviceStep::Claim, e))?;
    info!("[Devices] Claimed {} into {}", serial, request.target_org.name);
    Ok(StepOutcome::Applied)
}
