//! Where and how each component came to be installed

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

use crate::resolver::{ResolvedAction, ResolvedSource};
use crate::runtime::error::MarkerError;
use crate::runtime::markers::{lock, write_atomic};
use crate::types::ProvenanceRecord;

#[async_trait]
pub trait ProvenanceSink: Send + Sync {
    async fn record(&self, record: &ProvenanceRecord) -> Result<(), MarkerError>;
}

/// Build the record for an action that just finished installing
pub fn provenance_for(action: &ResolvedAction, installed_version: &str) -> ProvenanceRecord {
    let source = action.source();
    let version = match source {
        ResolvedSource::Git { reference, .. } => Some(reference.clone()),
        ResolvedSource::Latest { branch, .. } => Some(branch.clone()),
        _ => Some(installed_version.to_string()),
    };
    let commit = source
        .kind()
        .is_development()
        .then(|| installed_version.to_string());

    ProvenanceRecord {
        kind: action.kind(),
        source: source.kind(),
        version,
        commit,
        repo: source.repo().map(str::to_string),
        host: local_hostname(),
        recorded_at: Utc::now(),
    }
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string())
}

/// One JSON file per kind under `<state_dir>/provenance`
pub struct FileProvenanceSink {
    dir: PathBuf,
}

impl FileProvenanceSink {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: state_dir.into().join("provenance"),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl ProvenanceSink for FileProvenanceSink {
    async fn record(&self, record: &ProvenanceRecord) -> Result<(), MarkerError> {
        let path = self.dir.join(record.kind.marker_file_name());
        write_atomic(&path, &serde_json::to_vec_pretty(record)?).await?;
        debug!("Recorded provenance for {} at {}", record.kind, path.display());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryProvenanceSink {
    records: Mutex<Vec<ProvenanceRecord>>,
}

impl MemoryProvenanceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ProvenanceRecord> {
        lock(&self.records).clone()
    }
}

#[async_trait]
impl ProvenanceSink for MemoryProvenanceSink {
    async fn record(&self, record: &ProvenanceRecord) -> Result<(), MarkerError> {
        lock(&self.records).push(record.clone());
        Ok(())
    }
}
