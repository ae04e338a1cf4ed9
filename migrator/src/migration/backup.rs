//! Backup engine: captures a source network into a persisted [`Snapshot`]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::migration::cancel::CancelSignal;
use crate::migration::snapshot::{
    CategoryDescriptor, DeviceRecord, ResourceCategory, ResourceRecord, Scope, Shape, Snapshot,
};
use crate::migration::types::MigrationPhase;
use crate::services::client::{ApiError, DashboardApi};
use crate::services::errors::MigrationError;
use crate::services::gateway::{NetworkRef, OrgRef};
use crate::services::storage::ArtifactStore;

pub struct BackupEngine {
    api: Arc<dyn DashboardApi>,
    store: ArtifactStore,
    cancel: CancelSignal,
}

impl BackupEngine {
    pub fn new(api: Arc<dyn DashboardApi>, store: ArtifactStore, cancel: CancelSignal) -> Self {
        Self { api, store, cancel }
    }

    /// Read every category of the source network and its devices, persist
    /// the snapshot, and return it with its file path.
    ///
    /// A 404 means the category is not available on this network and is
    /// skipped. Any other failure (after the client's retries) fails the
    /// whole capture; a partial snapshot is never returned or written.
    pub async fn capture(
        &self,
        source_network: &NetworkRef,
        source_org: &OrgRef,
    ) -> Result<(Snapshot, PathBuf), MigrationError> {
        info!(
            "[Backup] Capturing network {} ({}) in organization {}",
            source_network.name, source_network.id, source_org.id
        );

        let network = self
            .api
            .get_network(&source_network.id)
            .await
            .map_err(|e| MigrationError::api("GET network", e))?
            .ok_or_else(|| {
                MigrationError::api(
                    "GET network",
                    ApiError::Permanent {
                        status: 404,
                        message: format!("network {} not found", source_network.id),
                    },
                )
            })?;

        self.cancel.check(MigrationPhase::BackingUp)?;
        let devices = self
            .api
            .list_network_devices(&source_network.id)
            .await
            .map_err(|e| MigrationError::api("GET network devices", e))?;

        self.cancel.check(MigrationPhase::BackingUp)?;
        let stacks = self
            .api
            .list_switch_stacks(&source_network.id)
            .await
            .map_err(|e| MigrationError::api("GET switch stacks", e))?;

        let mut warnings = Vec::new();
        let mut stack_of: HashMap<String, String> = HashMap::new();
        for stack in &stacks {
            let name = stack.name.clone().unwrap_or_else(|| stack.id.clone());
            let message = format!(
                "Switch stack '{}' ({}) will not be recreated; re-stack these switches manually",
                name,
                stack.serials.join(", ")
            );
            warn!("[Backup] {}", message);
            warnings.push(message);
            for serial in &stack.serials {
                stack_of.insert(serial.clone(), stack.id.clone());
            }
        }

        let device_records: Vec<DeviceRecord> = devices
            .iter()
            .map(|device| DeviceRecord {
                serial: device.serial.clone(),
                name: device.name.clone(),
                model: device.model.clone(),
                stack_id: stack_of.get(&device.serial).cloned(),
            })
            .collect();

        let mut resources = Vec::new();
        let network_prefix = format!("/networks/{}", source_network.id);
        for category in ResourceCategory::ALL {
            let descriptor = category.descriptor();
            if descriptor.scope == Scope::Network {
                self.capture_category(&descriptor, &network_prefix, None, &mut resources)
                    .await?;
            }
        }

        for device in &device_records {
            let prefix = format!("/devices/{}", device.serial);
            for category in ResourceCategory::ALL {
                let descriptor = category.descriptor();
                if descriptor.scope != Scope::Device
                    || (descriptor.switch_only && !device.is_switch())
                {
                    continue;
                }
                self.capture_category(&descriptor, &prefix, Some(&device.serial), &mut resources)
                    .await?;
            }
        }

        let snapshot = Snapshot {
            source_network_id: source_network.id.clone(),
            source_org_id: source_org.id.clone(),
            captured_at: Utc::now(),
            network,
            devices: device_records,
            resources,
            warnings,
        };

        let path = self.store.save_snapshot(&snapshot).await?;
        info!(
            "[Backup] Captured {} resources across {} devices -> {}",
            snapshot.resources.len(),
            snapshot.devices.len(),
            path.display()
        );
        Ok((snapshot, path))
    }

    async fn read(&self, path: &str) -> Result<Option<Value>, MigrationError> {
        self.cancel.check(MigrationPhase::BackingUp)?;
        self.api
            .get(path)
            .await
            .map_err(|e| MigrationError::api(format!("GET {}", path), e))
    }

    async fn capture_category(
        &self,
        descriptor: &CategoryDescriptor,
        prefix: &str,
        serial: Option<&str>,
        resources: &mut Vec<ResourceRecord>,
    ) -> Result<(), MigrationError> {
        let category = descriptor.category;
        let before = resources.len();

        match descriptor.shape {
            Shape::Singleton => {
                let path = format!("{}{}", prefix, descriptor.path);
                if let Some(value) = self.read(&path).await?.filter(|v| !v.is_null()) {
                    resources.push(ResourceRecord::new(category, serial, value));
                }
            }
            Shape::Collection { .. } | Shape::Keyed { .. } => {
                let path = format!("{}{}", prefix, descriptor.path);
                if let Some(value) = self.read(&path).await? {
                    for item in expect_list(&path, value)? {
                        resources.push(ResourceRecord::new(category, serial, item));
                    }
                }
            }
            Shape::PerParent { parent } => {
                let parent_ids: Vec<String> = resources
                    .iter()
                    .filter(|r| r.category == parent && r.device_serial.as_deref() == serial)
                    .filter_map(|r| r.source_id.clone())
                    .collect();
                for parent_id in parent_ids {
                    let path = format!(
                        "{}{}",
                        prefix,
                        descriptor.path.replace("{parent}", &parent_id)
                    );
                    if let Some(value) = self.read(&path).await?.filter(|v| !v.is_null()) {
                        resources.push(ResourceRecord::with_parent(
                            category, serial, &parent_id, value,
                        ));
                    }
                }
            }
        }

        debug!(
            "[Backup] {}{}: {} record(s)",
            category,
            serial.map(|s| format!("@{}", s)).unwrap_or_default(),
            resources.len() - before
        );
        Ok(())
    }
}

fn expect_list(path: &str, value: Value) -> Result<Vec<Value>, MigrationError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(MigrationError::api(
            format!("GET {}", path),
            ApiError::InvalidResponse {
                message: format!("expected a list, got {}", other),
            },
        )),
    }
}
