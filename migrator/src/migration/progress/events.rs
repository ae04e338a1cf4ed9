//! Migration progress events and event handling

use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::migration::types::{DeviceStatus, DeviceStep, MigrationPhase};

/// Events that can occur during migration
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationEvent {
    Started { network_id: String, resumed: bool },
    PhaseBegun { phase: MigrationPhase },
    PhaseCompleted { phase: MigrationPhase, duration_ms: u64 },
    DeviceUpdated { serial: String, status: DeviceStatus },
    DeviceExcluded { serial: String, step: DeviceStep, reason: String },
    Waiting { phase: MigrationPhase, seconds: u64 },
    Warning { message: String },
    Failed { phase: MigrationPhase, message: String },
    Completed { excluded_devices: usize },
}

/// Event handler for migration events
pub trait MigrationEventHandler: Send + Sync {
    fn handle_event(&self, event: MigrationEvent);
}

/// Composite event handler that forwards events to multiple handlers
pub struct CompositeEventHandler {
    handlers: Vec<Arc<dyn MigrationEventHandler>>,
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn MigrationEventHandler>) {
        self.handlers.push(handler);
    }
}

impl MigrationEventHandler for CompositeEventHandler {
    fn handle_event(&self, event: MigrationEvent) {
        for handler in &self.handlers {
            handler.handle_event(event.clone());
        }
    }
}

/// Logs every event through `tracing`
pub struct LoggingEventHandler;

impl MigrationEventHandler for LoggingEventHandler {
    fn handle_event(&self, event: MigrationEvent) {
        match event {
            MigrationEvent::Started {
                network_id,
                resumed,
            } => {
                if resumed {
                    info!("[Event] Resuming migration of {}", network_id);
                } else {
                    info!("[Event] Migration of {} started", network_id);
                }
            }
            MigrationEvent::PhaseBegun { phase } => {
                info!("[Event] Phase begun: {}", phase);
            }
            MigrationEvent::PhaseCompleted { phase, duration_ms } => {
                info!("[Event] Phase completed: {} ({}ms)", phase, duration_ms);
            }
            MigrationEvent::DeviceUpdated { serial, status } => {
                info!(serial = %serial, "[Event] Device now {:?}", status);
            }
            MigrationEvent::DeviceExcluded {
                serial,
                step,
                reason,
            } => {
                warn!(serial = %serial, "[Event] Device excluded at {}: {}", step, reason);
            }
            MigrationEvent::Waiting { phase, seconds } => {
                info!("[Event] Waiting {}s for the dashboard to settle after {}", seconds, phase);
            }
            MigrationEvent::Warning { message } => {
                warn!("[Event] Warning: {}", message);
            }
            MigrationEvent::Failed { phase, message } => {
                error!("[Event] Migration failed in {}: {}", phase, message);
            }
            MigrationEvent::Completed { excluded_devices } => {
                if excluded_devices == 0 {
                    info!("[Event] Migration completed successfully");
                } else {
                    warn!(
                        "[Event] Migration completed with {} excluded device(s)",
                        excluded_devices
                    );
                }
            }
        }
    }
}

/// Keeps every event in memory
#[derive(Clone, Default)]
pub struct RecordingEventHandler {
    events: Arc<Mutex<Vec<MigrationEvent>>>,
}

impl RecordingEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl MigrationEventHandler for RecordingEventHandler {
    fn handle_event(&self, event: MigrationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
