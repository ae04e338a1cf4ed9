use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::migration::types::MigrationPhase;
use crate::services::errors::MigrationError;

/// Cooperative cancellation flag shared with the caller (e.g. a Ctrl-C
/// handler). Destructive phases only look at it between phases.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self, phase: MigrationPhase) -> Result<(), MigrationError> {
        if self.is_cancelled() {
            Err(MigrationError::Cancelled { phase })
        } else {
            Ok(())
        }
    }
}
