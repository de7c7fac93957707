//! Resolved provisioning actions

use serde::{Deserialize, Serialize};

use crate::payload::{Materializer, Payload, PayloadError, TargetContext};
use crate::types::{ComponentKind, OrchestratorInstaller, RuntimeName, SourceKind};

/// A source with every default applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolvedSource {
    /// `version: None` installs whatever the repository currently offers
    Package {
        version: Option<String>,
        channel: Option<String>,
    },
    Git {
        repo: String,
        reference: String,
    },
    Latest {
        repo: String,
        branch: String,
    },
    Release {
        version: String,
    },
}

impl ResolvedSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            ResolvedSource::Package { .. } => SourceKind::Package,
            ResolvedSource::Git { .. } => SourceKind::Git,
            ResolvedSource::Latest { .. } => SourceKind::Latest,
            ResolvedSource::Release { .. } => SourceKind::Release,
        }
    }

    /// Exact version the target must report, when one is pinned
    pub fn pinned_version(&self) -> Option<&str> {
        match self {
            ResolvedSource::Package { version, .. } => version.as_deref(),
            ResolvedSource::Release { version } => Some(version),
            ResolvedSource::Git { .. } | ResolvedSource::Latest { .. } => None,
        }
    }

    /// Version, ref or branch, whichever identifies this source
    pub fn label(&self) -> Option<&str> {
        match self {
            ResolvedSource::Package { version, .. } => version.as_deref(),
            ResolvedSource::Git { reference, .. } => Some(reference),
            ResolvedSource::Latest { branch, .. } => Some(branch),
            ResolvedSource::Release { version } => Some(version),
        }
    }

    pub fn repo(&self) -> Option<&str> {
        match self {
            ResolvedSource::Git { repo, .. } | ResolvedSource::Latest { repo, .. } => Some(repo),
            _ => None,
        }
    }

    pub fn channel(&self) -> Option<&str> {
        match self {
            ResolvedSource::Package { channel, .. } => channel.as_deref(),
            _ => None,
        }
    }
}

/// Where a runtime version came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrigin {
    User,
    Default,
    Constraint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    pub source: ResolvedSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub source: ResolvedSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub name: RuntimeName,
    pub source: ResolvedSource,
    pub version_origin: VersionOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolkitConfig {
    pub source: ResolvedSource,
    pub enable_cdi: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub installer: OrchestratorInstaller,
    pub source: ResolvedSource,
    pub kind_config: Option<String>,
    pub feature_gates: Vec<String>,
}

/// Fully defaulted configuration of one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionConfig {
    Kernel(KernelConfig),
    Driver(DriverConfig),
    ContainerRuntime(RuntimeConfig),
    ContainerToolkit(ToolkitConfig),
    Orchestrator(OrchestratorConfig),
}

impl ActionConfig {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ActionConfig::Kernel(_) => ComponentKind::Kernel,
            ActionConfig::Driver(_) => ComponentKind::Driver,
            ActionConfig::ContainerRuntime(_) => ComponentKind::ContainerRuntime,
            ActionConfig::ContainerToolkit(_) => ComponentKind::ContainerToolkit,
            ActionConfig::Orchestrator(_) => ComponentKind::Orchestrator,
        }
    }

    pub fn source(&self) -> &ResolvedSource {
        match self {
            ActionConfig::Kernel(c) => &c.source,
            ActionConfig::Driver(c) => &c.source,
            ActionConfig::ContainerRuntime(c) => &c.source,
            ActionConfig::ContainerToolkit(c) => &c.source,
            ActionConfig::Orchestrator(c) => &c.source,
        }
    }

    pub fn as_runtime(&self) -> Option<&RuntimeConfig> {
        match self {
            ActionConfig::ContainerRuntime(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_orchestrator(&self) -> Option<&OrchestratorConfig> {
        match self {
            ActionConfig::Orchestrator(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_toolkit(&self) -> Option<&ToolkitConfig> {
        match self {
            ActionConfig::ContainerToolkit(c) => Some(c),
            _ => None,
        }
    }
}

/// One emitted, immutable unit of provisioning work.
///
/// Only the resolver constructs these; fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAction {
    kind: ComponentKind,
    order_index: usize,
    config: ActionConfig,
}

impl ResolvedAction {
    pub(crate) fn new(order_index: usize, config: ActionConfig) -> Self {
        Self {
            kind: config.kind(),
            order_index,
            config,
        }
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn order_index(&self) -> usize {
        self.order_index
    }

    pub fn config(&self) -> &ActionConfig {
        &self.config
    }

    pub fn source(&self) -> &ResolvedSource {
        self.config.source()
    }

    /// Version the contract's check phase compares against, `None` = any
    pub fn expected_version(&self) -> Option<&str> {
        self.config.source().pinned_version()
    }

    /// Produce the target-side payload through an injected materializer
    pub fn materialize(
        &self,
        materializer: &dyn Materializer,
        context: &TargetContext,
    ) -> Result<Payload, PayloadError> {
        materializer.materialize(self, context)
    }
}
