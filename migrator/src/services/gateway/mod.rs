//! UI automation gateway
//!
//! Claiming and unclaiming devices between organizations is only possible
//! through the dashboard web UI. The engine drives those steps through the
//! [`DeviceGateway`] capability trait; each call reports success or failure
//! for a single device and is never repeated without first probing device
//! state through the API.

pub mod command_gateway;

#[cfg(test)]
pub mod recording;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use command_gateway::CommandGateway;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("UI step rejected: {reason}")]
    StepFailed { reason: String },

    #[error("UI driver unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("UI step timed out after {seconds}s")]
    TimedOut { seconds: u64 },
}

#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Remove the device from its network in the source organization
    async fn remove_from_network(
        &self,
        serial: &str,
        org: &OrgRef,
        network: &NetworkRef,
    ) -> Result<(), GatewayError>;

    /// Release the device from the organization inventory
    async fn unclaim_device(&self, serial: &str, org: &OrgRef) -> Result<(), GatewayError>;

    /// Claim the device into the organization inventory
    async fn claim_device(&self, serial: &str, org: &OrgRef) -> Result<(), GatewayError>;
}
