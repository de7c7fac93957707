//! Cross-component constraint propagation
//!
//! Rules form a small, explicit table keyed on the orchestrator's source
//! class and the runtime family. The propagator walks the action list once
//! in emission order; an action may only adjust actions emitted before it.

use serde::Serialize;
use tracing::{debug, info};

use crate::resolver::action::{ActionConfig, ResolvedSource, VersionOrigin};
use crate::types::{ComponentKind, RuntimeName, SourceKind};

/// Coarse classification of an orchestrator source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceClass {
    /// Built from a git ref or a tracked branch
    Development,
    /// Published release artifacts
    Released,
}

impl From<SourceKind> for SourceClass {
    fn from(kind: SourceKind) -> Self {
        if kind.is_development() {
            SourceClass::Development
        } else {
            SourceClass::Released
        }
    }
}

/// Minimum runtime version required by an orchestrator source class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeVersionRule {
    pub orchestrator_source: SourceClass,
    pub runtime: RuntimeName,
    pub minimum_version: String,
    pub reason: String,
}

/// Development-track Kubernetes builds rely on CRI features only present in
/// these runtime releases.
pub const DEV_TRACK_MIN_DOCKER_VERSION: &str = "27.3.1";
pub const DEV_TRACK_MIN_CONTAINERD_VERSION: &str = "2.0.0";

pub fn default_rules() -> Vec<RuntimeVersionRule> {
    vec![
        RuntimeVersionRule {
            orchestrator_source: SourceClass::Development,
            runtime: RuntimeName::Docker,
            minimum_version: DEV_TRACK_MIN_DOCKER_VERSION.to_string(),
            reason: "development orchestrator builds require a recent docker engine".to_string(),
        },
        RuntimeVersionRule {
            orchestrator_source: SourceClass::Development,
            runtime: RuntimeName::Containerd,
            minimum_version: DEV_TRACK_MIN_CONTAINERD_VERSION.to_string(),
            reason: "development orchestrator builds require containerd 2.x".to_string(),
        },
    ]
}

/// Record of one adjustment, kept for logging and plan output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedConstraint {
    pub source_kind: ComponentKind,
    pub target_kind: ComponentKind,
    pub version: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ConstraintPropagator {
    rules: Vec<RuntimeVersionRule>,
}

impl Default for ConstraintPropagator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintPropagator {
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    pub fn with_rules(rules: Vec<RuntimeVersionRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RuntimeVersionRule] {
        &self.rules
    }

    /// Apply every rule once, in emission order
    pub fn propagate(&self, actions: &mut [ActionConfig]) -> Vec<AppliedConstraint> {
        let mut applied = Vec::new();

        for index in 0..actions.len() {
            let (earlier, rest) = actions.split_at_mut(index);
            if let ActionConfig::Orchestrator(orchestrator) = &rest[0] {
                let class = SourceClass::from(orchestrator.source.kind());
                applied.extend(self.apply_orchestrator_rules(class, earlier));
            }
        }

        applied
    }

    fn apply_orchestrator_rules(
        &self,
        class: SourceClass,
        earlier: &mut [ActionConfig],
    ) -> Vec<AppliedConstraint> {
        let mut applied = Vec::new();

        for action in earlier.iter_mut() {
            let ActionConfig::ContainerRuntime(runtime) = action else {
                continue;
            };

            let Some(rule) = self
                .rules
                .iter()
                .find(|r| r.orchestrator_source == class && r.runtime == runtime.name)
            else {
                debug!(
                    "No runtime constraint for {:?} orchestrator with {}",
                    class, runtime.name
                );
                continue;
            };

            let runtime_source = runtime.source.kind();
            let ResolvedSource::Package { version, .. } = &mut runtime.source else {
                debug!(
                    "Runtime {} built from {}, version constraint not applicable",
                    runtime.name, runtime_source
                );
                continue;
            };

            if runtime.version_origin == VersionOrigin::User && version.is_some() {
                debug!(
                    "Keeping user pinned {} version {:?}",
                    runtime.name, version
                );
                continue;
            }

            info!(
                "Raising {} version to {} ({})",
                runtime.name, rule.minimum_version, rule.reason
            );
            *version = Some(rule.minimum_version.clone());
            runtime.version_origin = VersionOrigin::Constraint;
            applied.push(AppliedConstraint {
                source_kind: ComponentKind::Orchestrator,
                target_kind: ComponentKind::ContainerRuntime,
                version: rule.minimum_version.clone(),
                reason: rule.reason.clone(),
            });
        }

        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::action::{OrchestratorConfig, RuntimeConfig};
    use crate::types::OrchestratorInstaller;

    fn runtime(name: RuntimeName, version: Option<&str>, origin: VersionOrigin) -> ActionConfig {
        ActionConfig::ContainerRuntime(RuntimeConfig {
            name,
            source: ResolvedSource::Package {
                version: version.map(str::to_string),
                channel: None,
            },
            version_origin: origin,
        })
    }

    fn orchestrator(source: ResolvedSource) -> ActionConfig {
        ActionConfig::Orchestrator(OrchestratorConfig {
            installer: OrchestratorInstaller::Kubeadm,
            source,
            kind_config: None,
            feature_gates: Vec::new(),
        })
    }

    fn git_source() -> ResolvedSource {
        ResolvedSource::Git {
            repo: "https://github.com/kubernetes/kubernetes.git".to_string(),
            reference: "refs/tags/v1.31.0".to_string(),
        }
    }

    fn runtime_version(actions: &[ActionConfig]) -> Option<String> {
        actions[0]
            .as_runtime()
            .and_then(|r| r.source.pinned_version().map(str::to_string))
    }

    #[test]
    fn test_development_source_raises_unpinned_docker() {
        let mut actions = vec![
            runtime(RuntimeName::Docker, None, VersionOrigin::Default),
            orchestrator(git_source()),
        ];

        let applied = ConstraintPropagator::new().propagate(&mut actions);

        assert_eq!(applied.len(), 1);
        assert_eq!(
            runtime_version(&actions).as_deref(),
            Some(DEV_TRACK_MIN_DOCKER_VERSION)
        );
        assert_eq!(
            actions[0].as_runtime().unwrap().version_origin,
            VersionOrigin::Constraint
        );
    }

    #[test]
    fn test_user_pin_is_preserved() {
        let mut actions = vec![
            runtime(RuntimeName::Docker, Some("28.0.1"), VersionOrigin::User),
            orchestrator(git_source()),
        ];

        let applied = ConstraintPropagator::new().propagate(&mut actions);

        assert!(applied.is_empty());
        assert_eq!(runtime_version(&actions).as_deref(), Some("28.0.1"));
    }

    #[test]
    fn test_released_source_is_noop() {
        let mut actions = vec![
            runtime(RuntimeName::Docker, None, VersionOrigin::Default),
            orchestrator(ResolvedSource::Release {
                version: "v1.31.1".to_string(),
            }),
        ];
        let before = actions.clone();

        assert!(ConstraintPropagator::new().propagate(&mut actions).is_empty());
        assert_eq!(actions, before);
    }

    #[test]
    fn test_missing_rule_is_noop() {
        let mut actions = vec![
            runtime(RuntimeName::Crio, None, VersionOrigin::Default),
            orchestrator(git_source()),
        ];
        let before = actions.clone();

        assert!(ConstraintPropagator::new().propagate(&mut actions).is_empty());
        assert_eq!(actions, before);
    }

    #[test]
    fn test_earlier_action_cannot_adjust_later_one() {
        // Orchestrator emitted before the runtime: nothing to adjust
        let mut actions = vec![
            orchestrator(git_source()),
            runtime(RuntimeName::Docker, None, VersionOrigin::Default),
        ];
        let before = actions.clone();

        assert!(ConstraintPropagator::new().propagate(&mut actions).is_empty());
        assert_eq!(actions, before);
    }

    #[test]
    fn test_git_built_runtime_is_untouched() {
        let mut actions = vec![
            ActionConfig::ContainerRuntime(RuntimeConfig {
                name: RuntimeName::Containerd,
                source: ResolvedSource::Git {
                    repo: "https://github.com/containerd/containerd.git".to_string(),
                    reference: "v2.1.0".to_string(),
                },
                version_origin: VersionOrigin::Default,
            }),
            orchestrator(ResolvedSource::Latest {
                repo: "https://github.com/kubernetes/kubernetes.git".to_string(),
                branch: "master".to_string(),
            }),
        ];
        let before = actions.clone();

        assert!(ConstraintPropagator::new().propagate(&mut actions).is_empty());
        assert_eq!(actions, before);
    }

    #[test]
    fn test_custom_rule_table() {
        let propagator = ConstraintPropagator::with_rules(vec![RuntimeVersionRule {
            orchestrator_source: SourceClass::Development,
            runtime: RuntimeName::Crio,
            minimum_version: "1.31.0".to_string(),
            reason: "test".to_string(),
        }]);
        let mut actions = vec![
            runtime(RuntimeName::Crio, None, VersionOrigin::Default),
            orchestrator(git_source()),
        ];

        propagator.propagate(&mut actions);
        assert_eq!(runtime_version(&actions).as_deref(), Some("1.31.0"));
    }
}
