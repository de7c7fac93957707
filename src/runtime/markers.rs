//! Persisted install-state markers, one per component kind

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

use crate::runtime::error::MarkerError;
use crate::types::{ComponentKind, InstallMarker};

#[async_trait]
pub trait MarkerStore: Send + Sync {
    /// Missing markers read as `absent`
    async fn load(&self, kind: ComponentKind) -> Result<InstallMarker, MarkerError>;

    async fn save(&self, marker: &InstallMarker) -> Result<(), MarkerError>;
}

/// `<state_dir>/<kind>.json`, the same layout the payload scripts use
pub struct FileMarkerStore {
    state_dir: PathBuf,
}

impl FileMarkerStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn path_for(&self, kind: ComponentKind) -> PathBuf {
        self.state_dir.join(kind.marker_file_name())
    }
}

#[async_trait]
impl MarkerStore for FileMarkerStore {
    async fn load(&self, kind: ComponentKind) -> Result<InstallMarker, MarkerError> {
        let path = self.path_for(kind);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(InstallMarker::absent(kind));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| MarkerError::Corrupt {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    async fn save(&self, marker: &InstallMarker) -> Result<(), MarkerError> {
        let content = serde_json::to_vec_pretty(marker)?;
        let path = self.path_for(marker.kind);
        write_atomic(&path, &content).await?;
        debug!("Wrote {} marker to {}", marker.kind, path.display());
        Ok(())
    }
}

/// Write through a sibling temp file and rename over the target
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), MarkerError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = parent.join(format!(".{}.tmp.{}", file_name, Uuid::new_v4().simple()));

    if let Err(e) = tokio::fs::write(&temp_path, content).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}

/// A panic while holding the lock leaves the data intact, so keep using it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process store for tests and dry runs
#[derive(Default)]
pub struct MemoryMarkerStore {
    markers: Mutex<HashMap<ComponentKind, InstallMarker>>,
    writes: Mutex<usize>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_marker(self, marker: InstallMarker) -> Self {
        lock(&self.markers).insert(marker.kind, marker);
        self
    }

    /// Number of `save` calls so far
    pub fn write_count(&self) -> usize {
        *lock(&self.writes)
    }

    pub fn get(&self, kind: ComponentKind) -> Option<InstallMarker> {
        lock(&self.markers).get(&kind).cloned()
    }
}

#[async_trait]
impl MarkerStore for MemoryMarkerStore {
    async fn load(&self, kind: ComponentKind) -> Result<InstallMarker, MarkerError> {
        Ok(self.get(kind).unwrap_or_else(|| InstallMarker::absent(kind)))
    }

    async fn save(&self, marker: &InstallMarker) -> Result<(), MarkerError> {
        lock(&self.markers).insert(marker.kind, marker.clone());
        *lock(&self.writes) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarkerStatus;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_marker_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = FileMarkerStore::new(dir.path());

        let marker = store.load(ComponentKind::Driver).await.unwrap();
        assert_eq!(marker.status, MarkerStatus::Absent);
    }

    #[tokio::test]
    async fn test_file_store_round_trip_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = FileMarkerStore::new(dir.path().join("state"));

        let marker = InstallMarker::pending_reboot(ComponentKind::Kernel, Some("6.8.0-45".into()));
        store.save(&marker).await.unwrap();

        let loaded = store.load(ComponentKind::Kernel).await.unwrap();
        assert!(loaded.is_pending_reboot());
        assert_eq!(loaded.version.as_deref(), Some("6.8.0-45"));

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("state"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["kernel.json".to_string()]);
    }

    #[tokio::test]
    async fn test_reads_script_written_marker() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("driver.json"),
            r#"{"kind":"driver","status":"installed","version":"550.54.15","installed_at":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();

        let marker = FileMarkerStore::new(dir.path())
            .load(ComponentKind::Driver)
            .await
            .unwrap();
        assert_eq!(marker.status, MarkerStatus::Installed);
        assert!(marker.installed_at.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_marker_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("kernel.json"), "not json").unwrap();

        let result = FileMarkerStore::new(dir.path())
            .load(ComponentKind::Kernel)
            .await;
        assert!(matches!(result, Err(MarkerError::Corrupt { .. })));
    }

    #[test]
    fn test_memory_store_survives_poisoned_lock() {
        let store = MemoryMarkerStore::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.markers.lock().unwrap();
            panic!("writer died");
        }));
        assert!(store.markers.is_poisoned());

        let marker = InstallMarker::installed(ComponentKind::Driver, Some("550.54.15".into()));
        tokio_test::assert_ok!(tokio_test::block_on(store.save(&marker)));

        assert_eq!(store.get(ComponentKind::Driver), Some(marker));
        assert_eq!(store.write_count(), 1);
    }
}
