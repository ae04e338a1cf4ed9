use std::path::PathBuf;

use thiserror::Error;

use crate::migration::snapshot::ResourceCategory;
use crate::migration::types::{DeviceStep, MigrationPhase};
use crate::services::client::ApiError;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("API error during {context}: {source}")]
    Api {
        context: String,
        #[source]
        source: ApiError,
    },

    #[error("Unresolved reference: {category} {source_id} has no target id")]
    UnresolvedReference {
        category: ResourceCategory,
        source_id: String,
    },

    #[error("Duplicate mapping: {category} {source_id} already maps to {existing}")]
    DuplicateMapping {
        category: ResourceCategory,
        source_id: String,
        existing: String,
    },

    #[error("UI step failed: {step} {serial} - {reason}")]
    UiStepFailed {
        serial: String,
        step: DeviceStep,
        reason: String,
    },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Migration cancelled before {phase}")]
    Cancelled { phase: MigrationPhase },

    #[error("Phase {phase} cannot proceed: {reason}")]
    PhaseBlocked { phase: MigrationPhase, reason: String },

    #[error("Resume error: {reason}")]
    Resume { reason: String },
}

/// Snapshot and state persistence failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error on {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl MigrationError {
    pub fn api(context: impl Into<String>, source: ApiError) -> Self {
        MigrationError::Api {
            context: context.into(),
            source,
        }
    }

    /// Whether repeating the failed operation later could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            MigrationError::Api { source, .. } => source.is_transient(),
            MigrationError::UiStepFailed { .. } => true,
            MigrationError::Storage(StorageError::Io { .. }) => true,
            _ => false,
        }
    }

    /// Get error severity for logging/alerting purposes
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MigrationError::DuplicateMapping { .. } => ErrorSeverity::Critical,
            MigrationError::Storage(_) => ErrorSeverity::Critical,
            MigrationError::PhaseBlocked { .. } => ErrorSeverity::High,
            MigrationError::Api { source, .. } if !source.is_transient() => ErrorSeverity::High,
            MigrationError::Api { .. } => ErrorSeverity::Medium,
            MigrationError::Validation { .. } | MigrationError::Resume { .. } => {
                ErrorSeverity::Medium
            }
            MigrationError::UnresolvedReference { .. } | MigrationError::UiStepFailed { .. } => {
                ErrorSeverity::Medium
            }
            MigrationError::Cancelled { .. } => ErrorSeverity::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}
