//! Dependency resolution: stack spec to ordered action list

use tracing::{debug, info};

use crate::resolver::action::{
    ActionConfig, DriverConfig, KernelConfig, OrchestratorConfig, ResolvedAction, ResolvedSource,
    RuntimeConfig, ToolkitConfig, VersionOrigin,
};
use crate::resolver::constraints::ConstraintPropagator;
use crate::resolver::defaults::{self, SourceDefaults};
use crate::resolver::error::{ResolveError, Result};
use crate::types::{
    ComponentKind, DriverRequest, KernelRequest, OrchestratorInstaller, OrchestratorRequest,
    RuntimeName, RuntimeRequest, SourceFields, SourceKind, StackSpec, ToolkitRequest,
};

/// Resolves a [`StackSpec`] into the ordered list of actions for one host.
///
/// Resolution is a pure function of the spec. Component kinds are evaluated
/// in their fixed domain order; prerequisites that were not requested are
/// never injected.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    propagator: ConstraintPropagator,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_propagator(propagator: ConstraintPropagator) -> Self {
        Self { propagator }
    }

    pub fn resolve(&self, spec: &StackSpec) -> Result<Vec<ResolvedAction>> {
        let mut pending: Vec<ActionConfig> = Vec::new();

        for kind in ComponentKind::ORDER {
            let config = match kind {
                ComponentKind::Kernel => self.resolve_kernel(spec.kernel.as_ref())?,
                ComponentKind::Driver => self.resolve_driver(spec.driver.as_ref())?,
                ComponentKind::ContainerRuntime => {
                    self.resolve_runtime(spec.container_runtime.as_ref())?
                }
                ComponentKind::ContainerToolkit => {
                    self.resolve_toolkit(spec.container_toolkit.as_ref())?
                }
                ComponentKind::Orchestrator => {
                    self.resolve_orchestrator(spec.orchestrator.as_ref())?
                }
            };

            let Some(config) = config else {
                continue;
            };

            if let ActionConfig::Orchestrator(orchestrator) = &config {
                if orchestrator.installer.is_self_contained() && !pending.is_empty() {
                    info!(
                        "{} bundles its own runtime, dropping {:?}",
                        orchestrator.installer,
                        pending.iter().map(ActionConfig::kind).collect::<Vec<_>>()
                    );
                    pending.clear();
                }
            }

            debug!("Resolved {} from {}", kind, config.source().kind());
            pending.push(config);
        }

        for applied in self.propagator.propagate(&mut pending) {
            debug!(
                "Constraint from {} set {} version to {}",
                applied.source_kind, applied.target_kind, applied.version
            );
        }

        Ok(pending
            .into_iter()
            .enumerate()
            .map(|(index, config)| ResolvedAction::new(index, config))
            .collect())
    }

    fn resolve_kernel(&self, request: Option<&KernelRequest>) -> Result<Option<ActionConfig>> {
        let Some(request) = request.filter(|r| r.install) else {
            return Ok(None);
        };

        let (source, _) = resolve_source(
            ComponentKind::Kernel,
            ComponentKind::Kernel.supported_sources(),
            &request.sources,
            defaults::for_component(ComponentKind::Kernel, None),
        )?;

        Ok(Some(ActionConfig::Kernel(KernelConfig { source })))
    }

    fn resolve_driver(&self, request: Option<&DriverRequest>) -> Result<Option<ActionConfig>> {
        let Some(request) = request.filter(|r| r.install) else {
            return Ok(None);
        };

        let (source, _) = resolve_source(
            ComponentKind::Driver,
            ComponentKind::Driver.supported_sources(),
            &request.sources,
            defaults::for_component(ComponentKind::Driver, None),
        )?;

        Ok(Some(ActionConfig::Driver(DriverConfig { source })))
    }

    fn resolve_runtime(&self, request: Option<&RuntimeRequest>) -> Result<Option<ActionConfig>> {
        let Some(request) = request.filter(|r| r.install) else {
            return Ok(None);
        };

        let name = match request.name.as_deref() {
            Some(raw) => raw
                .parse::<RuntimeName>()
                .map_err(|name| ResolveError::UnsupportedRuntime { name })?,
            None => RuntimeName::Containerd,
        };

        let (source, version_origin) = resolve_source(
            ComponentKind::ContainerRuntime,
            ComponentKind::ContainerRuntime.supported_sources(),
            &request.sources,
            defaults::for_component(ComponentKind::ContainerRuntime, Some(name)),
        )?;

        Ok(Some(ActionConfig::ContainerRuntime(RuntimeConfig {
            name,
            source,
            version_origin,
        })))
    }

    fn resolve_toolkit(&self, request: Option<&ToolkitRequest>) -> Result<Option<ActionConfig>> {
        let Some(request) = request.filter(|r| r.install) else {
            return Ok(None);
        };

        let (source, _) = resolve_source(
            ComponentKind::ContainerToolkit,
            ComponentKind::ContainerToolkit.supported_sources(),
            &request.sources,
            defaults::for_component(ComponentKind::ContainerToolkit, None),
        )?;

        Ok(Some(ActionConfig::ContainerToolkit(ToolkitConfig {
            source,
            enable_cdi: request.enable_cdi,
        })))
    }

    fn resolve_orchestrator(
        &self,
        request: Option<&OrchestratorRequest>,
    ) -> Result<Option<ActionConfig>> {
        let Some(request) = request.filter(|r| r.install) else {
            return Ok(None);
        };

        let installer = match request.installer.as_deref() {
            Some(raw) => raw
                .parse::<OrchestratorInstaller>()
                .map_err(|installer| ResolveError::UnknownInstaller { installer })?,
            None => OrchestratorInstaller::Kubeadm,
        };

        let selected = selected_source(ComponentKind::Orchestrator, &request.sources)?;
        if ComponentKind::Orchestrator.supported_sources().contains(&selected)
            && !installer.supported_sources().contains(&selected)
        {
            return Err(ResolveError::UnsupportedInstallerSource {
                installer: installer.to_string(),
                source_kind: selected,
            });
        }

        let (source, _) = resolve_source(
            ComponentKind::Orchestrator,
            installer.supported_sources(),
            &request.sources,
            defaults::for_component(ComponentKind::Orchestrator, None),
        )?;

        Ok(Some(ActionConfig::Orchestrator(OrchestratorConfig {
            installer,
            source,
            kind_config: request.kind_config.clone(),
            feature_gates: request.feature_gates.clone(),
        })))
    }
}

/// Parse the requested source name, falling back to the per-kind default
fn selected_source(kind: ComponentKind, fields: &SourceFields) -> Result<SourceKind> {
    match fields.source.as_deref() {
        Some(raw) => raw
            .parse::<SourceKind>()
            .map_err(|source_name| ResolveError::UnsupportedSource { kind, source_name }),
        None => Ok(kind.default_source()),
    }
}

fn populated_sources(fields: &SourceFields) -> Vec<SourceKind> {
    let mut populated = Vec::new();
    if fields.package.is_some() {
        populated.push(SourceKind::Package);
    }
    if fields.git.is_some() {
        populated.push(SourceKind::Git);
    }
    if fields.latest.is_some() {
        populated.push(SourceKind::Latest);
    }
    if fields.release.is_some() {
        populated.push(SourceKind::Release);
    }
    populated
}

/// Merge the shorthand `version` with the variant block's own version
fn merge_version(
    kind: ComponentKind,
    shorthand: Option<&String>,
    block: Option<&String>,
) -> Result<Option<String>> {
    match (shorthand, block) {
        (Some(a), Some(b)) if a != b => Err(ResolveError::ConflictingVersions {
            kind,
            first: a.clone(),
            second: b.clone(),
        }),
        (a, b) => Ok(b.or(a).cloned()),
    }
}

fn resolve_source(
    kind: ComponentKind,
    supported: &[SourceKind],
    fields: &SourceFields,
    defaults: SourceDefaults,
) -> Result<(ResolvedSource, VersionOrigin)> {
    let selected = selected_source(kind, fields)?;
    if !supported.contains(&selected) {
        return Err(ResolveError::UnsupportedSource {
            kind,
            source_name: selected.to_string(),
        });
    }

    let populated = populated_sources(fields);
    if populated.iter().any(|p| *p != selected) {
        return Err(ResolveError::ConflictingSourceConfig {
            kind,
            selected,
            populated,
        });
    }

    if fields.version.is_some() && selected.is_development() {
        return Err(ResolveError::VersionNotApplicable {
            kind,
            source_kind: selected,
        });
    }

    let resolved = match selected {
        SourceKind::Package => {
            let block = fields.package.clone().unwrap_or_default();
            let version = merge_version(kind, fields.version.as_ref(), block.version.as_ref())?;
            let origin = if version.is_some() {
                VersionOrigin::User
            } else {
                VersionOrigin::Default
            };
            let channel = block
                .channel
                .or_else(|| defaults.channel.map(str::to_string));
            (ResolvedSource::Package { version, channel }, origin)
        }
        SourceKind::Git => {
            let block = fields.git.clone().unwrap_or_default();
            let reference = block.reference.ok_or_else(|| ResolveError::MissingSourceConfig {
                kind,
                source_kind: selected,
                field: "ref".to_string(),
            })?;
            let repo = block.repo.unwrap_or_else(|| defaults.repo.to_string());
            (ResolvedSource::Git { repo, reference }, VersionOrigin::User)
        }
        SourceKind::Latest => {
            let block = fields.latest.clone().unwrap_or_default();
            let repo = block.repo.unwrap_or_else(|| defaults.repo.to_string());
            let branch = block.branch.unwrap_or_else(|| defaults.branch.to_string());
            (ResolvedSource::Latest { repo, branch }, VersionOrigin::Default)
        }
        SourceKind::Release => {
            let block = fields.release.clone().unwrap_or_default();
            let pinned = merge_version(kind, fields.version.as_ref(), block.version.as_ref())?;
            let (version, origin) = match pinned {
                Some(version) => (version, VersionOrigin::User),
                None => {
                    let version = defaults.release_version.ok_or_else(|| {
                        ResolveError::MissingSourceConfig {
                            kind,
                            source_kind: selected,
                            field: "version".to_string(),
                        }
                    })?;
                    (version.to_string(), VersionOrigin::Default)
                }
            };
            (ResolvedSource::Release { version }, origin)
        }
    };

    Ok(resolved)
}
