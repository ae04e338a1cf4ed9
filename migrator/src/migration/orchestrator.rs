//! Migration orchestrator - sequences the phases of a migration run
//!
//! `Verifying → BackingUp → RemovingDevices → Unclaiming → Claiming →
//! CreatingNetwork → AddingDevices → Restoring → Complete`
//!
//! State is persisted after every phase and after every device sub-step, so
//! the state file on disk always reflects what the vendor has confirmed. A
//! failure stops the run in its current phase and leaves the state and
//! snapshot files behind for [`Orchestrator::resume`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::migration::backup::BackupEngine;
use crate::migration::cancel::CancelSignal;
use crate::migration::progress::{
    CompositeEventHandler, LoggingEventHandler, MigrationEvent, MigrationEventHandler,
};
use crate::migration::restore::RestoreEngine;
use crate::migration::resume_handlers::{load_saved_state, resume_phase};
use crate::migration::snapshot::Snapshot;
use crate::migration::steps::{devices, network, StepOutcome};
use crate::migration::types::*;
use crate::migration::validation;
use crate::services::client::DashboardApi;
use crate::services::config::MigrationConfig;
use crate::services::errors::MigrationError;
use crate::services::gateway::DeviceGateway;
use crate::services::storage::ArtifactStore;

pub struct Orchestrator {
    source: Arc<dyn DashboardApi>,
    target: Arc<dyn DashboardApi>,
    gateway: Arc<dyn DeviceGateway>,
    store: ArtifactStore,
    config: MigrationConfig,
    events: CompositeEventHandler,
    cancel: CancelSignal,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn DashboardApi>,
        target: Arc<dyn DashboardApi>,
        gateway: Arc<dyn DeviceGateway>,
        config: MigrationConfig,
    ) -> Self {
        let mut events = CompositeEventHandler::new();
        events.add_handler(Arc::new(LoggingEventHandler));
        Self {
            source,
            target,
            gateway,
            store: ArtifactStore::new(config.storage.work_dir.clone()),
            config,
            events,
            cancel: CancelSignal::new(),
        }
    }

    /// Forward events to `handler` in addition to the log
    pub fn with_events(mut self, handler: Arc<dyn MigrationEventHandler>) -> Self {
        self.events.add_handler(handler);
        self
    }

    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Check both keys against the request without changing anything
    pub async fn verify_access(&self, request: &MigrationRequest) -> Result<(), MigrationError> {
        validation::verify_access(self.source.as_ref(), self.target.as_ref(), request).await
    }

    /// Run a fresh migration from `Verifying` to `Complete`
    pub async fn run_migration(
        &self,
        request: MigrationRequest,
    ) -> Result<MigrationReport, MigrationFailure> {
        let mut state = MigrationState::new(request);
        info!(
            "[Orchestrator] Starting migration of {} ({}) from {} to {}",
            state.request.source_network.name,
            state.request.source_network.id,
            state.request.source_org.name,
            state.request.target_org.name
        );
        self.events.handle_event(MigrationEvent::Started {
            network_id: state.request.source_network.id.clone(),
            resumed: false,
        });

        if let Err(error) = self.persist(&mut state).await {
            return Err(self.fail(&mut state, error).await);
        }
        self.drive(&mut state).await
    }

    /// Continue a previously persisted run from its recorded phase.
    ///
    /// Devices whose step is already confirmed in the state are not touched
    /// again; excluded devices stay excluded.
    pub async fn resume(
        &self,
        mut state: MigrationState,
    ) -> Result<MigrationReport, MigrationFailure> {
        let phase = match resume_phase(&state) {
            Ok(phase) => phase,
            Err(error) => {
                error!("[Orchestrator] Cannot resume: {}", error);
                return Err(MigrationFailure {
                    phase: state.phase,
                    error,
                    state_path: None,
                    snapshot_path: state.snapshot_path.clone(),
                });
            }
        };

        info!(
            "[Orchestrator] Resuming migration of {} at {}",
            state.request.source_network.id, phase
        );
        state.failure = None;
        self.events.handle_event(MigrationEvent::Started {
            network_id: state.request.source_network.id.clone(),
            resumed: true,
        });
        self.drive(&mut state).await
    }

    pub async fn resume_from_file(
        &self,
        state_path: &Path,
    ) -> Result<MigrationReport, MigrationFailure> {
        match load_saved_state(&self.store, state_path).await {
            Ok(state) => self.resume(state).await,
            Err(error) => Err(MigrationFailure {
                phase: MigrationPhase::Verifying,
                error,
                state_path: Some(state_path.to_path_buf()),
                snapshot_path: None,
            }),
        }
    }

    async fn drive(&self, state: &mut MigrationState) -> Result<MigrationReport, MigrationFailure> {
        let mut snapshot: Option<Snapshot> = None;

        while let Some(next) = state.phase.next() {
            let phase = state.phase;
            if let Err(error) = self.cancel.check(phase) {
                return Err(self.fail(state, error).await);
            }

            let started = Instant::now();
            info!("[Orchestrator] Phase: {}", phase);
            self.events.handle_event(MigrationEvent::PhaseBegun { phase });

            if let Err(error) = self.run_phase(state, &mut snapshot).await {
                return Err(self.fail(state, error).await);
            }

            state.phase = next;
            if let Err(error) = self.persist(state).await {
                return Err(self.fail(state, error).await);
            }
            self.events.handle_event(MigrationEvent::PhaseCompleted {
                phase,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }

        self.build_report(state).await
    }

    async fn run_phase(
        &self,
        state: &mut MigrationState,
        snapshot: &mut Option<Snapshot>,
    ) -> Result<(), MigrationError> {
        let timing = &self.config.timing;
        match state.phase {
            MigrationPhase::Verifying => self.verify_access(&state.request).await,
            MigrationPhase::BackingUp => self.back_up(state, snapshot).await,
            MigrationPhase::RemovingDevices => {
                self.rehome(state, DeviceStep::Remove, timing.after_removal())
                    .await
            }
            MigrationPhase::Unclaiming => {
                self.rehome(state, DeviceStep::Unclaim, timing.after_unclaim())
                    .await
            }
            MigrationPhase::Claiming => {
                self.rehome(state, DeviceStep::Claim, timing.after_claim())
                    .await?;
                if !state.devices.is_empty() && state.devices_with(&DeviceStatus::Claimed).is_empty()
                {
                    return Err(MigrationError::PhaseBlocked {
                        phase: MigrationPhase::Claiming,
                        reason: "no device was claimed into the target organization".to_string(),
                    });
                }
                Ok(())
            }
            MigrationPhase::CreatingNetwork => self.create_network(state, snapshot).await,
            MigrationPhase::AddingDevices => self.add_devices(state).await,
            MigrationPhase::Restoring => self.restore(state, snapshot).await,
            MigrationPhase::Complete => Ok(()),
        }
    }

    async fn back_up(
        &self,
        state: &mut MigrationState,
        snapshot: &mut Option<Snapshot>,
    ) -> Result<(), MigrationError> {
        let engine = BackupEngine::new(self.source.clone(), self.store.clone(), self.cancel.clone());
        let (captured, path) = engine
            .capture(&state.request.source_network, &state.request.source_org)
            .await?;

        state.snapshot_path = Some(path);
        for device in &captured.devices {
            state
                .devices
                .entry(device.serial.clone())
                .or_insert(DeviceStatus::Pending);
        }
        for warning in &captured.warnings {
            self.events.handle_event(MigrationEvent::Warning {
                message: warning.clone(),
            });
            state.warnings.push(warning.clone());
        }
        *snapshot = Some(captured);
        Ok(())
    }

    /// Apply one re-homing step to every device that completed the previous
    /// step, persisting after each device.
    async fn rehome(
        &self,
        state: &mut MigrationState,
        step: DeviceStep,
        settle: Duration,
    ) -> Result<(), MigrationError> {
        let (ready, done) = match step {
            DeviceStep::Remove => (DeviceStatus::Pending, DeviceStatus::Removed),
            DeviceStep::Unclaim => (DeviceStatus::Removed, DeviceStatus::Unclaimed),
            DeviceStep::Claim => (DeviceStatus::Unclaimed, DeviceStatus::Claimed),
            DeviceStep::Attach => {
                return Err(MigrationError::PhaseBlocked {
                    phase: state.phase,
                    reason: "attach is not a UI step".to_string(),
                })
            }
        };

        let mut applied = false;
        for serial in state.devices_with(&ready) {
            let request = &state.request;
            let result = match step {
                DeviceStep::Remove => {
                    devices::remove_device(self.source.as_ref(), self.gateway.as_ref(), request, &serial)
                        .await
                }
                DeviceStep::Unclaim => {
                    devices::unclaim_device(self.source.as_ref(), self.gateway.as_ref(), request, &serial)
                        .await
                }
                _ => {
                    devices::claim_device(self.target.as_ref(), self.gateway.as_ref(), request, &serial)
                        .await
                }
            };

            match result {
                Ok(outcome) => {
                    applied |= outcome == StepOutcome::Applied;
                    self.update_device(state, &serial, done.clone()).await?;
                }
                Err(MigrationError::UiStepFailed { reason, .. }) => {
                    self.exclude_device(state, &serial, step, reason).await?
                }
                // Dashboard and driver errors leave the device status untouched for resume
                Err(other) => return Err(other),
            }
        }

        if applied {
            self.settle(state.phase, settle).await;
        }
        Ok(())
    }

    async fn create_network(
        &self,
        state: &mut MigrationState,
        snapshot: &mut Option<Snapshot>,
    ) -> Result<(), MigrationError> {
        self.ensure_surviving(state, &DeviceStatus::Claimed)?;
        if let Some(id) = &state.target_network_id {
            info!("[Orchestrator] Target network {} already recorded", id);
            return Ok(());
        }

        let snapshot = self.snapshot(state, snapshot).await?;
        let created = network::ensure_target_network(
            self.target.as_ref(),
            &state.request,
            snapshot,
            &self.config.restore,
        )
        .await?;
        state.target_network_id = Some(created.id);
        Ok(())
    }

    async fn add_devices(&self, state: &mut MigrationState) -> Result<(), MigrationError> {
        let network_id = self.target_network_id(state)?;
        let claimed = state.devices_with(&DeviceStatus::Claimed);
        if claimed.is_empty() {
            return Ok(());
        }

        let outcome = network::attach_devices(
            self.target.as_ref(),
            &network_id,
            &claimed,
            &self.config.timing,
        )
        .await?;

        for serial in &outcome.attached {
            self.update_device(state, serial, DeviceStatus::Added).await?;
        }
        for serial in &outcome.missing {
            let reason = format!("device never appeared in network {}", network_id);
            self.exclude_device(state, serial, DeviceStep::Attach, reason)
                .await?;
        }
        Ok(())
    }

    async fn restore(
        &self,
        state: &mut MigrationState,
        snapshot: &mut Option<Snapshot>,
    ) -> Result<(), MigrationError> {
        self.ensure_surviving(state, &DeviceStatus::Added)?;
        let network_id = self.target_network_id(state)?;
        let excluded: Vec<String> = state
            .excluded_devices()
            .into_iter()
            .map(|d| d.serial)
            .collect();

        let snapshot = self.snapshot(state, snapshot).await?;
        let report = RestoreEngine::new(self.target.clone(), &self.config.restore)
            .with_excluded_devices(excluded)
            .restore(&network_id, &state.request.target_org.id, snapshot)
            .await?;
        state.restore_report = Some(report);
        Ok(())
    }

    /// Loaded lazily so a resumed run reads the snapshot it captured earlier
    async fn snapshot<'a>(
        &self,
        state: &MigrationState,
        cache: &'a mut Option<Snapshot>,
    ) -> Result<&'a Snapshot, MigrationError> {
        if cache.is_none() {
            let path = state
                .snapshot_path
                .as_ref()
                .ok_or_else(|| MigrationError::Resume {
                    reason: "no snapshot recorded in state".to_string(),
                })?;
            *cache = Some(self.store.load_snapshot(path).await?);
        }
        cache.as_ref().ok_or_else(|| MigrationError::Resume {
            reason: "snapshot unavailable".to_string(),
        })
    }

    fn target_network_id(&self, state: &MigrationState) -> Result<String, MigrationError> {
        state
            .target_network_id
            .clone()
            .ok_or_else(|| MigrationError::PhaseBlocked {
                phase: state.phase,
                reason: "target network has not been created".to_string(),
            })
    }

    /// Every device that is still part of the run must have reached `wanted`
    fn ensure_surviving(
        &self,
        state: &MigrationState,
        wanted: &DeviceStatus,
    ) -> Result<(), MigrationError> {
        let lagging: Vec<&String> = state
            .surviving_devices()
            .filter(|(_, status)| *status != wanted)
            .map(|(serial, _)| serial)
            .collect();
        if lagging.is_empty() {
            Ok(())
        } else {
            Err(MigrationError::PhaseBlocked {
                phase: state.phase,
                reason: format!(
                    "devices not yet {:?}: {}",
                    wanted,
                    lagging
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })
        }
    }

    async fn update_device(
        &self,
        state: &mut MigrationState,
        serial: &str,
        status: DeviceStatus,
    ) -> Result<(), MigrationError> {
        state.set_device(serial, status.clone());
        self.persist(state).await?;
        self.events.handle_event(MigrationEvent::DeviceUpdated {
            serial: serial.to_string(),
            status,
        });
        Ok(())
    }

    async fn exclude_device(
        &self,
        state: &mut MigrationState,
        serial: &str,
        step: DeviceStep,
        reason: String,
    ) -> Result<(), MigrationError> {
        warn!("[Orchestrator] Excluding {} after failed {}: {}", serial, step, reason);

        state.set_device(
            serial,
            DeviceStatus::Failed {
                step,
                reason: reason.clone(),
            },
        );
        self.persist(state).await?;
        self.events.handle_event(MigrationEvent::DeviceExcluded {
            serial: serial.to_string(),
            step,
            reason,
        });
        Ok(())
    }

    async fn settle(&self, phase: MigrationPhase, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        self.events.handle_event(MigrationEvent::Waiting {
            phase,
            seconds: duration.as_secs(),
        });
        tokio::time::sleep(duration).await;
    }

    async fn persist(&self, state: &mut MigrationState) -> Result<PathBuf, MigrationError> {
        state.touch();
        Ok(self.store.save_state(state).await?)
    }

    /// Record the failure in the state file and build the failure outcome
    async fn fail(&self, state: &mut MigrationState, error: MigrationError) -> MigrationFailure {
        let phase = state.phase;
        error!(
            "[Orchestrator] Migration failed in {} ({:?}): {}",
            phase,
            error.severity(),
            error
        );
        state.failure = Some(PhaseFailure {
            phase,
            details: error.to_string(),
        });

        let state_path = match self.persist(state).await {
            Ok(path) => Some(path),
            Err(persist_error) => {
                error!(
                    "[Orchestrator] Could not record failure in state file: {}",
                    persist_error
                );
                None
            }
        };
        self.events.handle_event(MigrationEvent::Failed {
            phase,
            message: error.to_string(),
        });

        MigrationFailure {
            phase,
            error,
            state_path,
            snapshot_path: state.snapshot_path.clone(),
        }
    }

    async fn build_report(
        &self,
        state: &mut MigrationState,
    ) -> Result<MigrationReport, MigrationFailure> {
        let (Some(restore), Some(target_network_id), Some(snapshot_path)) = (
            state.restore_report.clone(),
            state.target_network_id.clone(),
            state.snapshot_path.clone(),
        ) else {
            let error = MigrationError::Resume {
                reason: "completed state is missing its restore report".to_string(),
            };
            return Err(self.fail(state, error).await);
        };

        let excluded_devices = state.excluded_devices();
        self.events.handle_event(MigrationEvent::Completed {
            excluded_devices: excluded_devices.len(),
        });
        info!(
            "[Orchestrator] Migration complete: {} resources restored, {} failed, {} device(s) excluded",
            restore.total_succeeded(),
            restore.total_failed(),
            excluded_devices.len()
        );

        Ok(MigrationReport {
            restore,
            excluded_devices,
            warnings: state.warnings.clone(),
            target_network_id,
            snapshot_path,
            state_path: self.store.state_path(&state.request.source_network.id),
        })
    }
}
