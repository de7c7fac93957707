use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::component::{ComponentKind, SourceKind};

/// Persisted install status of one component on the target host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerStatus {
    PendingReboot,
    Installed,
    Absent,
}

/// On-target state marker, one per component kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallMarker {
    pub kind: ComponentKind,
    pub status: MarkerStatus,
    pub version: Option<String>,
    pub installed_at: Option<DateTime<Utc>>,
}

impl InstallMarker {
    pub fn absent(kind: ComponentKind) -> Self {
        Self {
            kind,
            status: MarkerStatus::Absent,
            version: None,
            installed_at: None,
        }
    }

    pub fn pending_reboot(kind: ComponentKind, version: Option<String>) -> Self {
        Self {
            kind,
            status: MarkerStatus::PendingReboot,
            version,
            installed_at: None,
        }
    }

    pub fn installed(kind: ComponentKind, version: Option<String>) -> Self {
        Self {
            kind,
            status: MarkerStatus::Installed,
            version,
            installed_at: Some(Utc::now()),
        }
    }

    pub fn is_pending_reboot(&self) -> bool {
        self.status == MarkerStatus::PendingReboot
    }
}

/// How a component was installed, recorded after a successful install
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub kind: ComponentKind,
    pub source: SourceKind,
    /// Installed version, git ref or tracked branch
    pub version: Option<String>,
    pub commit: Option<String>,
    pub repo: Option<String>,
    pub host: String,
    pub recorded_at: DateTime<Utc>,
}
