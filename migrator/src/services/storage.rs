//! File persistence for snapshots and migration state
//!
//! Both artifacts are pretty-printed JSON written through a temporary file,
//! fsynced, then renamed over the destination so a crash never leaves a
//! half-written file behind.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::migration::snapshot::Snapshot;
use crate::migration::types::MigrationState;
use crate::services::errors::StorageError;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    work_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// `migration_backup_<network>_<YYYYmmdd_HHMMSS>.json`
    pub fn snapshot_path(&self, network_id: &str, captured_at: DateTime<Utc>) -> PathBuf {
        self.work_dir.join(format!(
            "migration_backup_{}_{}.json",
            network_id,
            captured_at.format("%Y%m%d_%H%M%S")
        ))
    }

    /// `migration_state_<network>.json`
    pub fn state_path(&self, network_id: &str) -> PathBuf {
        self.work_dir
            .join(format!("migration_state_{}.json", network_id))
    }

    pub async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<PathBuf, StorageError> {
        let path = self.snapshot_path(&snapshot.source_network_id, snapshot.captured_at);
        write_json_atomic(&path, snapshot).await?;
        Ok(path)
    }

    pub async fn load_snapshot(&self, path: &Path) -> Result<Snapshot, StorageError> {
        read_json(path).await
    }

    pub async fn save_state(&self, state: &MigrationState) -> Result<PathBuf, StorageError> {
        let path = self.state_path(&state.request.source_network.id);
        write_json_atomic(&path, state).await?;
        Ok(path)
    }

    pub async fn load_state(&self, path: &Path) -> Result<MigrationState, StorageError> {
        read_json(path).await
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_error(parent))?;
        }
    }

    let tmp_path = path.with_extension("json.tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .map_err(io_error(&tmp_path))?;
    file.write_all(&bytes).await.map_err(io_error(&tmp_path))?;
    file.sync_all().await.map_err(io_error(&tmp_path))?;
    drop(file);

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(io_error(path))?;
    debug!("[Storage] Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let bytes = tokio::fs::read(path).await.map_err(io_error(path))?;
    serde_json::from_slice(&bytes).map_err(|source| StorageError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_artifact_names() {
        let store = ArtifactStore::new("/var/mig");
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            store.snapshot_path("N_123", at),
            PathBuf::from("/var/mig/migration_backup_N_123_20240309_140507.json")
        );
        assert_eq!(
            store.state_path("N_123"),
            PathBuf::from("/var/mig/migration_state_N_123.json")
        );
    }

    #[tokio::test]
    async fn test_atomic_write_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        write_json_atomic(&path, &json!({"phase": "BackingUp"}))
            .await
            .unwrap();
        write_json_atomic(&path, &json!({"phase": "Claiming"}))
            .await
            .unwrap();

        let value: serde_json::Value = read_json(&path).await.unwrap();
        assert_eq!(value["phase"], "Claiming");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<serde_json::Value, _> = read_json(&dir.path().join("absent.json")).await;
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }
}
