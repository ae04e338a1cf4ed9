//! Dashboard network migration engine.
//!
//! Moves one network's configuration and devices from a source organization
//! into a target organization:
//!
//! - **Backup**: captures every supported configuration category into a
//!   persisted [`migration::Snapshot`]
//! - **Device re-homing**: removes, unclaims and claims devices through a
//!   [`services::gateway::DeviceGateway`]
//! - **Restore**: recreates the snapshot in the target network, remapping
//!   every cross-resource identifier
//!
//! The [`migration::Orchestrator`] sequences the phases and persists
//! [`migration::MigrationState`] after every step so an interrupted run can
//! be resumed.

pub mod migration;
pub mod services;

pub use migration::{MigrationFailure, MigrationReport, MigrationRequest, Orchestrator};
pub use services::config::MigrationConfig;
