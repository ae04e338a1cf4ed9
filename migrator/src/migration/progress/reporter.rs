//! Final summary reporting for operators

use std::fmt::Write;

use crate::migration::restore::FailureReason;
use crate::migration::types::{MigrationFailure, MigrationPhase, MigrationReport};

/// Trait for reporting the outcome of a migration run
pub trait ProgressReporter {
    fn report_completion(&self, report: &MigrationReport);
    fn report_failure(&self, failure: &MigrationFailure);
}

/// Prints a human-readable summary to stdout
pub struct ConsoleProgressReporter;

impl ProgressReporter for ConsoleProgressReporter {
    fn report_completion(&self, report: &MigrationReport) {
        println!("{}", render_summary(report));
    }

    fn report_failure(&self, failure: &MigrationFailure) {
        println!("{}", render_failure(failure));
    }
}

/// Prints the report as JSON for scripting
pub struct JsonProgressReporter;

impl ProgressReporter for JsonProgressReporter {
    fn report_completion(&self, report: &MigrationReport) {
        println!("{}", encode_report(report));
    }

    fn report_failure(&self, failure: &MigrationFailure) {
        let value = serde_json::json!({
            "failed_phase": failure.phase,
            "error": failure.error.to_string(),
            "state_path": failure.state_path,
            "snapshot_path": failure.snapshot_path,
        });
        println!("{}", value);
    }
}

fn encode_report<T: serde::Serialize>(report: &T) -> String {
    match serde_json::to_string_pretty(report) {
        Ok(json) => json,
        Err(e) => serde_json::json!({ "error": format!("failed to encode report: {}", e) })
            .to_string(),
    }
}

pub fn render_summary(report: &MigrationReport) -> String {
    let restore = &report.restore;
    let mut out = String::new();

    let _ = writeln!(out, "Migration complete: network {}", report.target_network_id);
    let _ = writeln!(
        out,
        "Resources: {} restored, {} failed",
        restore.total_succeeded(),
        restore.total_failed()
    );
    for (category, outcome) in &restore.categories {
        let _ = write!(
            out,
            "  {:<30} {:>4} ok {:>4} failed",
            category.to_string(),
            outcome.succeeded,
            outcome.failed
        );
        if outcome.skipped > 0 {
            let _ = write!(out, " {:>4} skipped", outcome.skipped);
        }
        out.push('\n');
    }

    if !restore.failures.is_empty() {
        let _ = writeln!(out, "Failed resources:");
        for failure in &restore.failures {
            let what = match &failure.reason {
                FailureReason::Api { message } => message.clone(),
                FailureReason::UnresolvedReference {
                    category,
                    source_id,
                } => format!("unresolved reference to {} {}", category, source_id),
            };
            let _ = writeln!(
                out,
                "  {} {}{}: {}",
                failure.category,
                failure.source_id.as_deref().unwrap_or("-"),
                failure
                    .device_serial
                    .as_deref()
                    .map(|s| format!(" on {}", s))
                    .unwrap_or_default(),
                what
            );
        }
    }

    if !report.excluded_devices.is_empty() {
        let _ = writeln!(out, "Excluded devices:");
        for device in &report.excluded_devices {
            let _ = writeln!(out, "  {} ({} failed): {}", device.serial, device.step, device.reason);
        }
    }

    if !restore.secret_substitutions.is_empty() {
        let _ = writeln!(
            out,
            "RADIUS secrets replaced by placeholder ({}); set the real secrets in the dashboard:",
            restore.secret_substitutions.len()
        );
        for substitution in &restore.secret_substitutions {
            let _ = writeln!(
                out,
                "  {} {} {}",
                substitution.category,
                substitution.source_id.as_deref().unwrap_or("-"),
                substitution.field
            );
        }
    }

    for warning in &report.warnings {
        let _ = writeln!(out, "Warning: {}", warning);
    }

    let _ = writeln!(out, "Snapshot: {}", report.snapshot_path.display());
    let _ = write!(out, "State:    {}", report.state_path.display());
    out
}

pub fn render_failure(failure: &MigrationFailure) -> String {
    let mut out = format!("Migration failed during {}: {}", failure.phase, failure.error);
    if let Some(path) = &failure.state_path {
        let _ = write!(out, "\nState:    {} (resume with `resume --state`)", path.display());
    }
    if let Some(path) = &failure.snapshot_path {
        let _ = write!(out, "\nSnapshot: {}", path.display());
    }
    if failure.error.is_retryable() {
        let _ = write!(out, "\nThe error looks transient; resuming may succeed.");
    }
    if failure.phase == MigrationPhase::Restoring {
        let _ = write!(
            out,
            "\nNote: resuming replays the whole restore. Objects created before the \
             interruption may be duplicated in the target network."
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::restore::{RestoreReport, SecretSubstitution};
    use crate::migration::snapshot::ResourceCategory;
    use crate::migration::types::{DeviceStep, ExcludedDevice, MigrationPhase};
    use crate::services::errors::MigrationError;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn test_summary_lists_exclusions_and_secrets() {
        let report = MigrationReport {
            restore: RestoreReport {
                target_network_id: "N_2".into(),
                target_org_id: "200".into(),
                categories: BTreeMap::new(),
                failures: vec![],
                secret_substitutions: vec![SecretSubstitution {
                    category: ResourceCategory::AccessPolicy,
                    source_id: Some("1".into()),
                    field: "/radiusServers/0/secret".into(),
                }],
            },
            excluded_devices: vec![ExcludedDevice {
                serial: "Q2SW-0000-0002".into(),
                step: DeviceStep::Unclaim,
                reason: "license still assigned".into(),
            }],
            warnings: vec![],
            target_network_id: "N_2".into(),
            snapshot_path: PathBuf::from("/tmp/migration_backup_N_1.json"),
            state_path: PathBuf::from("/tmp/migration_state_N_1.json"),
        };

        let text = render_summary(&report);
        assert!(text.contains("Q2SW-0000-0002 (unclaim failed): license still assigned"));
        assert!(text.contains("AccessPolicy 1 /radiusServers/0/secret"));
        assert!(text.ends_with("/tmp/migration_state_N_1.json"));
    }

    #[test]
    fn test_failure_points_at_recovery_files() {
        let failure = MigrationFailure {
            phase: MigrationPhase::Claiming,
            error: MigrationError::PhaseBlocked {
                phase: MigrationPhase::Claiming,
                reason: "no device was claimed".into(),
            },
            state_path: Some(PathBuf::from("/w/migration_state_N_1.json")),
            snapshot_path: None,
        };
        let text = render_failure(&failure);
        assert!(text.starts_with("Migration failed during Claiming"));
        assert!(text.contains("/w/migration_state_N_1.json"));
    }

    #[test]
    fn test_transient_failure_suggests_resume() {
        let failure = MigrationFailure {
            phase: MigrationPhase::Unclaiming,
            error: MigrationError::api(
                "GET /organizations/100/inventory/devices/Q2SW-0000-0002",
                crate::services::client::ApiError::RateLimited {
                    retry_after_secs: None,
                },
            ),
            state_path: Some(PathBuf::from("/w/migration_state_N_1.json")),
            snapshot_path: None,
        };
        let text = render_failure(&failure);
        assert!(text.contains("resuming may succeed"));
        assert!(!text.contains("duplicated"));
    }

    #[test]
    fn test_restore_failure_warns_about_replay() {
        let failure = MigrationFailure {
            phase: MigrationPhase::Restoring,
            error: MigrationError::Cancelled {
                phase: MigrationPhase::Restoring,
            },
            state_path: Some(PathBuf::from("/w/migration_state_N_1.json")),
            snapshot_path: Some(PathBuf::from("/w/migration_backup_N_1.json")),
        };
        let text = render_failure(&failure);
        assert!(text.contains("replays the whole restore"));
        assert!(!text.contains("resuming may succeed"));
    }

    #[test]
    fn test_report_encoding_failure_is_still_json() {
        struct Unencodable;
        impl serde::Serialize for Unencodable {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("bad \"quoted\" field"))
            }
        }

        let encoded = encode_report(&Unencodable);
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert!(value["error"]
            .as_str()
            .unwrap()
            .contains("bad \"quoted\" field"));
    }
}
