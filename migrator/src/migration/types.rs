// Core types for the migration engine
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::migration::restore::RestoreReport;
use crate::services::gateway::{NetworkRef, OrgRef};

/// Forward-only phases of a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MigrationPhase {
    Verifying,
    BackingUp,
    RemovingDevices,
    Unclaiming,
    Claiming,
    CreatingNetwork,
    AddingDevices,
    Restoring,
    Complete,
}

impl MigrationPhase {
    pub fn next(self) -> Option<MigrationPhase> {
        use MigrationPhase::*;
        match self {
            Verifying => Some(BackingUp),
            BackingUp => Some(RemovingDevices),
            RemovingDevices => Some(Unclaiming),
            Unclaiming => Some(Claiming),
            Claiming => Some(CreatingNetwork),
            CreatingNetwork => Some(AddingDevices),
            AddingDevices => Some(Restoring),
            Restoring => Some(Complete),
            Complete => None,
        }
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationPhase::Verifying => "Verifying",
            MigrationPhase::BackingUp => "BackingUp",
            MigrationPhase::RemovingDevices => "RemovingDevices",
            MigrationPhase::Unclaiming => "Unclaiming",
            MigrationPhase::Claiming => "Claiming",
            MigrationPhase::CreatingNetwork => "CreatingNetwork",
            MigrationPhase::AddingDevices => "AddingDevices",
            MigrationPhase::Restoring => "Restoring",
            MigrationPhase::Complete => "Complete",
        };
        f.write_str(name)
    }
}

/// Per-device re-homing step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceStep {
    Remove,
    Unclaim,
    Claim,
    Attach,
}

impl fmt::Display for DeviceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceStep::Remove => "remove",
            DeviceStep::Unclaim => "unclaim",
            DeviceStep::Claim => "claim",
            DeviceStep::Attach => "attach",
        };
        f.write_str(name)
    }
}

/// Confirmed progress of one device through re-homing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeviceStatus {
    Pending,
    Removed,
    Unclaimed,
    Claimed,
    /// Listed in the target network
    Added,
    Failed { step: DeviceStep, reason: String },
}

impl DeviceStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, DeviceStatus::Failed { .. })
    }
}

/// What the operator asked for. Holds no credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRequest {
    pub source_org: OrgRef,
    pub source_network: NetworkRef,
    pub target_org: OrgRef,
    /// Defaults to the source name plus the configured suffix
    #[serde(default)]
    pub target_network_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseFailure {
    pub phase: MigrationPhase,
    pub details: String,
}

/// Persisted progress of a migration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationState {
    pub request: MigrationRequest,
    /// Phase currently executing, or the one to resume from
    pub phase: MigrationPhase,
    #[serde(default)]
    pub failure: Option<PhaseFailure>,
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceStatus>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    #[serde(default)]
    pub target_network_id: Option<String>,
    #[serde(default)]
    pub restore_report: Option<RestoreReport>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MigrationState {
    pub fn new(request: MigrationRequest) -> Self {
        let now = Utc::now();
        Self {
            request,
            phase: MigrationPhase::Verifying,
            failure: None,
            devices: BTreeMap::new(),
            warnings: Vec::new(),
            snapshot_path: None,
            target_network_id: None,
            restore_report: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn set_device(&mut self, serial: &str, status: DeviceStatus) {
        self.devices.insert(serial.to_string(), status);
    }

    /// Devices not yet excluded by a failed step
    pub fn surviving_devices(&self) -> impl Iterator<Item = (&String, &DeviceStatus)> {
        self.devices.iter().filter(|(_, status)| !status.is_failed())
    }

    pub fn devices_with(&self, wanted: &DeviceStatus) -> Vec<String> {
        self.devices
            .iter()
            .filter(|(_, status)| *status == wanted)
            .map(|(serial, _)| serial.clone())
            .collect()
    }

    pub fn excluded_devices(&self) -> Vec<ExcludedDevice> {
        self.devices
            .iter()
            .filter_map(|(serial, status)| match status {
                DeviceStatus::Failed { step, reason } => Some(ExcludedDevice {
                    serial: serial.clone(),
                    step: *step,
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedDevice {
    pub serial: String,
    pub step: DeviceStep,
    pub reason: String,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub restore: RestoreReport,
    pub excluded_devices: Vec<ExcludedDevice>,
    pub warnings: Vec<String>,
    pub target_network_id: String,
    pub snapshot_path: PathBuf,
    pub state_path: PathBuf,
}

/// Outcome of a run that stopped in `phase`
#[derive(Debug)]
pub struct MigrationFailure {
    pub phase: MigrationPhase,
    pub error: crate::services::errors::MigrationError,
    pub state_path: Option<PathBuf>,
    pub snapshot_path: Option<PathBuf>,
}

impl fmt::Display for MigrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "migration failed in {}: {}", self.phase, self.error)
    }
}

impl std::error::Error for MigrationFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_only_move_forward() {
        let mut phase = MigrationPhase::Verifying;
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            assert!(next > phase);
            phase = next;
            seen.push(phase);
        }
        assert_eq!(seen.len(), 9);
        assert_eq!(phase, MigrationPhase::Complete);
    }

    #[test]
    fn test_device_status_serialization_is_tagged() {
        let status = DeviceStatus::Failed {
            step: DeviceStep::Unclaim,
            reason: "license still assigned".into(),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["step"], "Unclaim");

        let back: DeviceStatus = serde_json::from_value(value).unwrap();
        assert_eq!(back, status);
    }
}
