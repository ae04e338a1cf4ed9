//! Migration Resume Handlers
//!
//! A saved [`MigrationState`] is checked for consistency before the
//! orchestrator continues from it: the recorded phase must be backed by the
//! artifacts and per-device progress that phase requires.

use std::path::Path;

use tracing::info;

use crate::migration::types::{DeviceStatus, MigrationPhase, MigrationState};
use crate::services::errors::MigrationError;
use crate::services::storage::ArtifactStore;

fn resume_error(reason: impl Into<String>) -> MigrationError {
    MigrationError::Resume {
        reason: reason.into(),
    }
}

/// Progress rank of a surviving device
fn rank(status: &DeviceStatus) -> u8 {
    match status {
        DeviceStatus::Pending => 0,
        DeviceStatus::Removed => 1,
        DeviceStatus::Unclaimed => 2,
        DeviceStatus::Claimed => 3,
        DeviceStatus::Added => 4,
        DeviceStatus::Failed { .. } => u8::MAX,
    }
}

/// Least progress every surviving device must have made before `phase`
fn required_rank(phase: MigrationPhase) -> u8 {
    match phase {
        MigrationPhase::Verifying
        | MigrationPhase::BackingUp
        | MigrationPhase::RemovingDevices => 0,
        MigrationPhase::Unclaiming => 1,
        MigrationPhase::Claiming => 2,
        MigrationPhase::CreatingNetwork | MigrationPhase::AddingDevices => 3,
        MigrationPhase::Restoring | MigrationPhase::Complete => 4,
    }
}

/// Phase to continue from, or why the state cannot be resumed
pub fn resume_phase(state: &MigrationState) -> Result<MigrationPhase, MigrationError> {
    let phase = state.phase;

    if phase == MigrationPhase::Complete {
        return Err(resume_error("migration already completed"));
    }
    if phase > MigrationPhase::BackingUp && state.snapshot_path.is_none() {
        return Err(resume_error(format!(
            "state is at {} but records no snapshot file",
            phase
        )));
    }
    if phase > MigrationPhase::CreatingNetwork && state.target_network_id.is_none() {
        return Err(resume_error(format!(
            "state is at {} but records no target network",
            phase
        )));
    }

    let required = required_rank(phase);
    for (serial, status) in state.surviving_devices() {
        if rank(status) < required {
            return Err(resume_error(format!(
                "device {} is {:?}, inconsistent with phase {}",
                serial, status, phase
            )));
        }
    }

    if let Some(failure) = &state.failure {
        info!(
            "[Resume] Previous run failed in {}: {}",
            failure.phase, failure.details
        );
    }
    Ok(phase)
}

pub async fn load_saved_state(
    store: &ArtifactStore,
    path: &Path,
) -> Result<MigrationState, MigrationError> {
    let state = store.load_state(path).await?;
    info!(
        "[Resume] Loaded state for {} at phase {} ({} devices)",
        state.request.source_network.id,
        state.phase,
        state.devices.len()
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::test_fixtures::*;
    use crate::migration::types::DeviceStep;
    use std::path::PathBuf;

    fn state_at(phase: MigrationPhase) -> MigrationState {
        let mut state = MigrationState::new(request());
        state.phase = phase;
        state.snapshot_path = Some(PathBuf::from("/w/migration_backup_N_SRC.json"));
        state
    }

    #[test]
    fn test_claiming_requires_unclaimed_devices() {
        let mut state = state_at(MigrationPhase::Claiming);
        state.set_device(CORE, DeviceStatus::Unclaimed);
        state.set_device(
            EDGE,
            DeviceStatus::Failed {
                step: DeviceStep::Remove,
                reason: "timeout".into(),
            },
        );
        assert_eq!(resume_phase(&state).unwrap(), MigrationPhase::Claiming);

        state.set_device(AP, DeviceStatus::Removed);
        assert!(matches!(
            resume_phase(&state),
            Err(MigrationError::Resume { .. })
        ));
    }

    #[test]
    fn test_restoring_requires_target_network() {
        let mut state = state_at(MigrationPhase::Restoring);
        state.set_device(CORE, DeviceStatus::Added);
        assert!(resume_phase(&state).is_err());

        state.target_network_id = Some(TARGET_NET.into());
        assert_eq!(resume_phase(&state).unwrap(), MigrationPhase::Restoring);
    }

    #[test]
    fn test_completed_run_is_not_resumable() {
        let mut state = state_at(MigrationPhase::Complete);
        state.target_network_id = Some(TARGET_NET.into());
        assert!(resume_phase(&state).is_err());
    }

    #[test]
    fn test_post_backup_phase_needs_snapshot() {
        let mut state = state_at(MigrationPhase::RemovingDevices);
        state.snapshot_path = None;
        assert!(resume_phase(&state).is_err());
    }
}
