//! Network migration between dashboard organizations
//!
//! A migration runs through a fixed sequence of phases:
//!
//! - **Backup**: [`backup::BackupEngine`] reads every configuration category
//!   of the source network into a [`Snapshot`] written to disk before any
//!   destructive step
//! - **Re-homing**: [`steps::devices`] removes, unclaims and claims each
//!   device through the UI gateway, probing the API first
//! - **Target network**: [`steps::network`] creates the network and attaches
//!   the claimed devices
//! - **Restore**: [`restore::RestoreEngine`] replays the snapshot in
//!   dependency order, rewriting source ids through an [`remap::IdRemapTable`]
//!
//! # Usage
//!
//! ```rust,ignore
//! let orchestrator = Orchestrator::new(source, target, gateway, config);
//! let report = orchestrator.run_migration(request).await?;
//! ```

pub mod backup;
pub mod cancel;
pub mod orchestrator;
pub mod progress;
pub mod remap;
pub mod restore;
pub mod resume_handlers;
pub mod snapshot;
pub mod steps;
pub mod types;
pub mod validation;

#[cfg(test)]
pub mod test_fixtures;

pub use cancel::CancelSignal;
pub use orchestrator::Orchestrator;
pub use progress::*;
pub use restore::RestoreReport;
pub use snapshot::{ResourceCategory, Snapshot};
pub use types::*;
