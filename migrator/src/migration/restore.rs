//! Restore engine: recreates a [`Snapshot`] in a target network
//!
//! Categories are written in tier order so every referenced resource exists
//! before anything that points at it. Each created resource's new id is
//! recorded in an [`IdRemapTable`]; references in later payloads and paths
//! are rewritten through it before the write is sent.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::migration::remap::IdRemapTable;
use crate::migration::snapshot::{
    id_string, RefLocation, ResourceCategory, ResourceRecord, Scope, Shape, Snapshot,
};
use crate::services::client::{ApiError, DashboardApi};
use crate::services::config::RestoreConfig;
use crate::services::errors::MigrationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOutcome {
    pub succeeded: u32,
    pub failed: u32,
    /// Records of devices excluded from the migration
    pub skipped: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    Api {
        message: String,
    },
    UnresolvedReference {
        category: ResourceCategory,
        source_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFailure {
    pub category: ResourceCategory,
    pub source_id: Option<String>,
    pub device_serial: Option<String>,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSubstitution {
    pub category: ResourceCategory,
    pub source_id: Option<String>,
    /// JSON pointer of the replaced secret
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub target_network_id: String,
    pub target_org_id: String,
    pub categories: BTreeMap<ResourceCategory, CategoryOutcome>,
    pub failures: Vec<ResourceFailure>,
    pub secret_substitutions: Vec<SecretSubstitution>,
}

impl RestoreReport {
    fn new(target_network_id: &str, target_org_id: &str) -> Self {
        Self {
            target_network_id: target_network_id.to_string(),
            target_org_id: target_org_id.to_string(),
            categories: BTreeMap::new(),
            failures: Vec::new(),
            secret_substitutions: Vec::new(),
        }
    }

    pub fn outcome(&self, category: ResourceCategory) -> CategoryOutcome {
        self.categories.get(&category).copied().unwrap_or_default()
    }

    pub fn total_succeeded(&self) -> u32 {
        self.categories.values().map(|o| o.succeeded).sum()
    }

    pub fn total_failed(&self) -> u32 {
        self.categories.values().map(|o| o.failed).sum()
    }

    pub fn unresolved_references(&self) -> impl Iterator<Item = &ResourceFailure> {
        self.failures
            .iter()
            .filter(|f| matches!(f.reason, FailureReason::UnresolvedReference { .. }))
    }

    fn entry(&mut self, category: ResourceCategory) -> &mut CategoryOutcome {
        self.categories.entry(category).or_default()
    }
}

pub struct RestoreEngine {
    api: Arc<dyn DashboardApi>,
    secret_placeholder: String,
    excluded_devices: BTreeSet<String>,
}

/// Fully prepared write for one record
struct PreparedWrite {
    method: WriteMethod,
    path: String,
    body: Value,
    substitutions: Vec<SecretSubstitution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMethod {
    Post,
    Put,
}

impl RestoreEngine {
    pub fn new(api: Arc<dyn DashboardApi>, config: &RestoreConfig) -> Self {
        Self {
            api,
            secret_placeholder: config.radius_secret_placeholder.clone(),
            excluded_devices: BTreeSet::new(),
        }
    }

    /// Records owned by these devices are counted as skipped
    pub fn with_excluded_devices(mut self, serials: impl IntoIterator<Item = String>) -> Self {
        self.excluded_devices.extend(serials);
        self
    }

    /// Recreate `snapshot` in `target_network`.
    ///
    /// Per-resource failures (API rejections after the client's retries,
    /// unresolved references) are recorded and the remaining resources are
    /// still attempted. A duplicate mapping aborts the whole restore since
    /// the remap table could no longer be trusted.
    pub async fn restore(
        &self,
        target_network: &str,
        target_org: &str,
        snapshot: &Snapshot,
    ) -> Result<RestoreReport, MigrationError> {
        info!(
            "[Restore] Restoring {} resources from {} into network {} (org {})",
            snapshot.resources.len(),
            snapshot.source_network_id,
            target_network,
            target_org
        );

        let mut table = IdRemapTable::new();
        let mut report = RestoreReport::new(target_network, target_org);

        for category in ResourceCategory::ALL {
            for record in snapshot.records(category) {
                if let Some(serial) = &record.device_serial {
                    if self.excluded_devices.contains(serial) {
                        report.entry(category).skipped += 1;
                        continue;
                    }
                }

                match self.restore_record(target_network, record, &mut table).await {
                    Ok(substitutions) => {
                        report.entry(category).succeeded += 1;
                        report.secret_substitutions.extend(substitutions);
                    }
                    Err(error @ MigrationError::DuplicateMapping { .. }) => return Err(error),
                    Err(error) => {
                        warn!("[Restore] {} failed: {}", record.label(), error);
                        let reason = match error {
                            MigrationError::UnresolvedReference {
                                category,
                                source_id,
                            } => FailureReason::UnresolvedReference {
                                category,
                                source_id,
                            },
                            other => FailureReason::Api {
                                message: other.to_string(),
                            },
                        };
                        report.entry(category).failed += 1;
                        report.failures.push(ResourceFailure {
                            category,
                            source_id: record.source_id.clone(),
                            device_serial: record.device_serial.clone(),
                            reason,
                        });
                    }
                }
            }

            let outcome = report.outcome(category);
            if outcome != CategoryOutcome::default() {
                info!(
                    "[Restore] {}: {} restored, {} failed, {} skipped",
                    category, outcome.succeeded, outcome.failed, outcome.skipped
                );
            }
        }

        info!(
            "[Restore] Done: {} restored, {} failed, {} ids remapped, {} secrets replaced",
            report.total_succeeded(),
            report.total_failed(),
            table.len(),
            report.secret_substitutions.len()
        );
        Ok(report)
    }

    async fn restore_record(
        &self,
        target_network: &str,
        record: &ResourceRecord,
        table: &mut IdRemapTable,
    ) -> Result<Vec<SecretSubstitution>, MigrationError> {
        let write = self.prepare(target_network, record, table)?;
        let context = format!("{:?} {}", write.method, write.path);

        let response = match write.method {
            WriteMethod::Post => self.api.post(&write.path, &write.body).await,
            WriteMethod::Put => self.api.put(&write.path, &write.body).await,
        }
        .map_err(|e| MigrationError::api(context.clone(), e))?;

        let descriptor = record.category.descriptor();
        if let (Shape::Collection { id_field }, Some(source_id)) =
            (descriptor.shape, record.source_id.as_deref())
        {
            if record.category.is_reference_target() {
                let target_id = response.get(id_field).and_then(id_string).ok_or_else(|| {
                    MigrationError::api(
                        context,
                        ApiError::InvalidResponse {
                            message: format!("created resource has no {}", id_field),
                        },
                    )
                })?;
                table.record(record.category, source_id, &target_id)?;
            }
        }

        Ok(write.substitutions)
    }

    /// Build the write for `record` with every reference resolved
    fn prepare(
        &self,
        target_network: &str,
        record: &ResourceRecord,
        table: &IdRemapTable,
    ) -> Result<PreparedWrite, MigrationError> {
        let descriptor = record.category.descriptor();
        let mut body = record.payload.clone();

        if let Some(object) = body.as_object_mut() {
            for field in descriptor.read_only {
                object.remove(*field);
            }
            match descriptor.shape {
                Shape::Collection { id_field } => {
                    object.remove(id_field);
                }
                Shape::Keyed { key_field } => {
                    object.remove(key_field);
                }
                Shape::Singleton | Shape::PerParent { .. } => {}
            }
        }

        let mut parent_id = None;
        for reference in &record.references {
            let target_id = table.resolve(reference.target, &reference.source_id)?;
            match &reference.location {
                RefLocation::Field { pointer } => rewrite_id(&mut body, pointer, target_id),
                RefLocation::Path => parent_id = Some(target_id.to_string()),
            }
        }

        let substitutions = self.replace_secrets(record, descriptor.secret_lists, &mut body);

        let prefix = match descriptor.scope {
            Scope::Network => format!("/networks/{}", target_network),
            Scope::Device => {
                let serial = record.device_serial.as_deref().ok_or_else(|| {
                    MigrationError::Validation {
                        field: record.label(),
                        message: "device-scoped record has no device serial".to_string(),
                    }
                })?;
                format!("/devices/{}", serial)
            }
        };

        let (method, path) = match descriptor.shape {
            Shape::Singleton => (WriteMethod::Put, format!("{}{}", prefix, descriptor.path)),
            Shape::Collection { .. } => (WriteMethod::Post, format!("{}{}", prefix, descriptor.path)),
            Shape::Keyed { .. } => {
                let key = record.source_id.as_deref().ok_or_else(|| MigrationError::Validation {
                    field: record.label(),
                    message: "keyed record has no key".to_string(),
                })?;
                (
                    WriteMethod::Put,
                    format!("{}{}/{}", prefix, descriptor.path, key),
                )
            }
            Shape::PerParent { parent } => {
                let parent_id = parent_id.ok_or_else(|| MigrationError::UnresolvedReference {
                    category: parent,
                    source_id: record.source_id.clone().unwrap_or_default(),
                })?;
                (
                    WriteMethod::Put,
                    format!("{}{}", prefix, descriptor.path.replace("{parent}", &parent_id)),
                )
            }
        };

        Ok(PreparedWrite {
            method,
            path,
            body,
            substitutions,
        })
    }

    fn replace_secrets(
        &self,
        record: &ResourceRecord,
        secret_lists: &[&str],
        body: &mut Value,
    ) -> Vec<SecretSubstitution> {
        let mut substitutions = Vec::new();
        for list in secret_lists {
            let Some(servers) = body.pointer_mut(list).and_then(Value::as_array_mut) else {
                continue;
            };
            for (index, server) in servers.iter_mut().enumerate() {
                if let Some(server) = server.as_object_mut() {
                    server.insert(
                        "secret".to_string(),
                        Value::String(self.secret_placeholder.clone()),
                    );
                    substitutions.push(SecretSubstitution {
                        category: record.category,
                        source_id: record.source_id.clone(),
                        field: format!("{}/{}/secret", list, index),
                    });
                }
            }
        }
        substitutions
    }
}

/// Replace the id at `pointer`, keeping numeric ids numeric
fn rewrite_id(body: &mut Value, pointer: &str, target_id: &str) {
    if let Some(slot) = body.pointer_mut(pointer) {
        *slot = match slot {
            Value::Number(_) => target_id
                .parse::<u64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(target_id.to_string())),
            _ => Value::String(target_id.to_string()),
        };
    }
}
