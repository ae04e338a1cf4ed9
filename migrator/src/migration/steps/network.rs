//! Target network creation and device attachment

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::migration::snapshot::Snapshot;
use crate::migration::types::MigrationRequest;
use crate::services::client::{CreateNetworkRequest, DashboardApi, Network};
use crate::services::config::{RestoreConfig, TimingConfig};
use crate::services::errors::MigrationError;

/// Name the target network will carry
pub fn target_network_name(request: &MigrationRequest, config: &RestoreConfig) -> String {
    request.target_network_name.clone().unwrap_or_else(|| {
        format!(
            "{}{}",
            request.source_network.name, config.network_name_suffix
        )
    })
}

/// Reuse a target-organization network with the expected name, or create
/// one with the source network's product types and time zone.
pub async fn ensure_target_network(
    target: &dyn DashboardApi,
    request: &MigrationRequest,
    snapshot: &Snapshot,
    config: &RestoreConfig,
) -> Result<Network, MigrationError> {
    let name = target_network_name(request, config);
    let org_id = &request.target_org.id;

    let existing = target
        .list_organization_networks(org_id)
        .await
        .map_err(|e| MigrationError::api("list target networks", e))?;
    if let Some(network) = existing.into_iter().find(|n| n.name == name) {
        info!("[Network] Reusing existing network {} ({})", network.name, network.id);
        return Ok(network);
    }

    let create = CreateNetworkRequest {
        name: name.clone(),
        product_types: snapshot.network.product_types.clone(),
        time_zone: snapshot
            .network
            .time_zone
            .clone()
            .unwrap_or_else(|| config.default_time_zone.clone()),
        tags: snapshot.network.tags.clone(),
    };
    let network = target
        .create_network(org_id, &create)
        .await
        .map_err(|e| MigrationError::api(format!("create network {}", name), e))?;
    info!("[Network] Created network {} ({})", network.name, network.id);
    Ok(network)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachOutcome {
    pub attached: Vec<String>,
    pub missing: Vec<String>,
}

/// Add claimed devices to the target network and wait until the network
/// lists them. Devices still missing after the last poll are reported, not
/// treated as an error.
pub async fn attach_devices(
    target: &dyn DashboardApi,
    network_id: &str,
    serials: &[String],
    timing: &TimingConfig,
) -> Result<AttachOutcome, MigrationError> {
    let listed = listed_serials(target, network_id).await?;
    let to_add: Vec<String> = serials
        .iter()
        .filter(|s| !listed.contains(*s))
        .cloned()
        .collect();

    if !to_add.is_empty() {
        info!("[Network] Adding {} device(s) to {}", to_add.len(), network_id);
        target
            .claim_into_network(network_id, &to_add)
            .await
            .map_err(|e| MigrationError::api(format!("add devices to {}", network_id), e))?;
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        let listed = listed_serials(target, network_id).await?;
        let (attached, missing): (Vec<String>, Vec<String>) =
            serials.iter().cloned().partition(|s| listed.contains(s));

        if missing.is_empty() || attempt >= timing.attach_poll_attempts {
            if !missing.is_empty() {
                warn!(
                    "[Network] {} device(s) not visible in {} after {} checks: {}",
                    missing.len(),
                    network_id,
                    attempt,
                    missing.join(", ")
                );
            }
            return Ok(AttachOutcome { attached, missing });
        }

        tokio::time::sleep(timing.attach_poll_interval()).await;
    }
}

async fn listed_serials(
    target: &dyn DashboardApi,
    network_id: &str,
) -> Result<BTreeSet<String>, MigrationError> {
    let devices = target
        .list_network_devices(network_id)
        .await
        .map_err(|e| MigrationError::api(format!("list devices of {}", network_id), e))?;
    Ok(devices.into_iter().map(|d| d.serial).collect())
}
