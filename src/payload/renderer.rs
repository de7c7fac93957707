//! Handlebars backed script materializer

use handlebars::{handlebars_helper, no_escape, Handlebars};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::payload::error::{PayloadError, Result};
use crate::payload::interface::{Materializer, Payload, SideEffect, TargetContext};
use crate::payload::templates;
use crate::resolver::{ActionConfig, ResolvedAction, ResolvedSource};
use crate::types::SourceKind;

handlebars_helper!(shq: |value: Json| {
    let raw = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };
    shell_words::quote(&raw).into_owned()
});

const TEMPLATES: &[(&str, &str)] = &[
    ("kernel", templates::KERNEL),
    ("driver", templates::DRIVER),
    ("containerd", templates::CONTAINERD),
    ("docker", templates::DOCKER),
    ("crio", templates::CRIO),
    ("toolkit", templates::TOOLKIT),
    ("kubeadm", templates::KUBEADM),
    ("kind", templates::KIND),
    ("microk8s", templates::MICROK8S),
];

/// Renders each action into a bash script implementing the install contract
pub struct ScriptMaterializer {
    handlebars: Handlebars<'static>,
}

impl ScriptMaterializer {
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(no_escape);
        handlebars.register_helper("shq", Box::new(shq));

        handlebars
            .register_partial(templates::PREAMBLE_PARTIAL, templates::PREAMBLE)
            .map_err(|e| PayloadError::TemplateRegistration {
                template: templates::PREAMBLE_PARTIAL.to_string(),
                error: e.to_string(),
            })?;

        for (name, source) in TEMPLATES {
            handlebars
                .register_template_string(name, *source)
                .map_err(|e| PayloadError::TemplateRegistration {
                    template: name.to_string(),
                    error: e.to_string(),
                })?;
        }

        Ok(Self { handlebars })
    }

    pub fn template_name(action: &ResolvedAction) -> &'static str {
        match action.config() {
            ActionConfig::Kernel(_) => "kernel",
            ActionConfig::Driver(_) => "driver",
            ActionConfig::ContainerRuntime(runtime) => runtime.name.as_str(),
            ActionConfig::ContainerToolkit(_) => "toolkit",
            ActionConfig::Orchestrator(orchestrator) => orchestrator.installer.as_str(),
        }
    }

    fn template_data(action: &ResolvedAction, context: &TargetContext) -> serde_json::Value {
        let source = action.source();
        let (reference, branch) = match source {
            ResolvedSource::Git { reference, .. } => (reference.as_str(), ""),
            ResolvedSource::Latest { branch, .. } => ("", branch.as_str()),
            _ => ("", ""),
        };

        let mut data = json!({
            "kind": action.kind().as_str(),
            "source": source.kind().as_str(),
            "expected_version": action.expected_version().unwrap_or_default(),
            "label": source.label().unwrap_or_default(),
            "repo": source.repo().unwrap_or_default(),
            "reference": reference,
            "branch": branch,
            "channel": source.channel().unwrap_or_default(),
            "state_dir": context.state_dir.display().to_string(),
            "retry_attempts": context.retry_attempts.max(1),
            "retry_delay": context.retry_delay_secs,
            "retry_linear": context.linear_backoff,
            "allow_reboot": context.allow_reboot,
            "runtime": context.runtime.map(|r| r.as_str()).unwrap_or_default(),
            "cri_socket": context.cri_socket.clone().unwrap_or_default(),
            "enable_cdi": context.enable_cdi,
        });

        if let Some(orchestrator) = action.config().as_orchestrator() {
            let (major, minor) = major_minor(source.label().unwrap_or_default());
            data["kube_minor"] = json!(format!("v{major}.{minor}"));
            data["snap_channel"] = json!(format!("{major}.{minor}/stable"));
            data["kind_config"] = json!(orchestrator.kind_config.clone().unwrap_or_default());
            data["feature_gates"] = json!(orchestrator.feature_gates.join(","));
        }

        data
    }

    fn side_effects(action: &ResolvedAction, context: &TargetContext) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        let source = action.source();

        match source.kind() {
            SourceKind::Git | SourceKind::Latest => {
                effects.push(SideEffect::SourceBuild(
                    source.repo().unwrap_or_default().to_string(),
                ));
            }
            SourceKind::Package | SourceKind::Release => {
                let (repository, package) = match action.config() {
                    ActionConfig::Kernel(_) => ("distribution", "linux-image"),
                    ActionConfig::Driver(_) => ("cuda", "cuda-drivers"),
                    ActionConfig::ContainerRuntime(runtime) => match runtime.name.as_str() {
                        "docker" => ("docker", "docker-ce"),
                        "crio" => ("cri-o", "cri-o"),
                        _ => ("docker", "containerd.io"),
                    },
                    ActionConfig::ContainerToolkit(_) => {
                        ("nvidia-container-toolkit", "nvidia-container-toolkit")
                    }
                    ActionConfig::Orchestrator(orchestrator) => {
                        match orchestrator.installer.as_str() {
                            "microk8s" => ("snap", "microk8s"),
                            "kind" => ("kind", "kindest/node"),
                            _ => ("kubernetes", "kubeadm"),
                        }
                    }
                };
                effects.push(SideEffect::PackageRepository(repository.to_string()));
                effects.push(SideEffect::Package(package.to_string()));
            }
        }

        match action.config() {
            ActionConfig::ContainerRuntime(runtime) => {
                effects.push(SideEffect::Service(runtime.name.as_str().to_string()));
            }
            ActionConfig::ContainerToolkit(toolkit) if toolkit.enable_cdi => {
                effects.push(SideEffect::File("/var/run/cdi/nvidia.yaml".into()));
            }
            ActionConfig::Orchestrator(orchestrator) if orchestrator.installer.as_str() == "kubeadm" => {
                effects.push(SideEffect::Service("kubelet".to_string()));
            }
            _ => {}
        }

        if action.kind().may_require_reboot() {
            effects.push(SideEffect::Reboot);
        }

        effects.push(SideEffect::StateMarker(
            context.state_dir.join(action.kind().marker_file_name()),
        ));
        effects
    }
}

impl Materializer for ScriptMaterializer {
    fn materialize(&self, action: &ResolvedAction, context: &TargetContext) -> Result<Payload> {
        let template = Self::template_name(action);
        if !self.handlebars.has_template(template) {
            return Err(PayloadError::TemplateNotFound {
                kind: action.kind(),
                template: template.to_string(),
            });
        }

        let data = Self::template_data(action, context);
        let script = self
            .handlebars
            .render(template, &data)
            .map_err(|e| PayloadError::RenderFailed {
                kind: action.kind(),
                error: e.to_string(),
            })?;

        let digest = format!("{:x}", Sha256::digest(script.as_bytes()));
        debug!(
            "Materialized {} payload from template {} ({} bytes, sha256 {})",
            action.kind(),
            template,
            script.len(),
            &digest[..12]
        );

        Ok(Payload {
            kind: action.kind(),
            order_index: action.order_index(),
            script,
            digest,
            expected_version: action.expected_version().map(str::to_string),
            side_effects: Self::side_effects(action, context),
        })
    }
}

/// Major and minor components of a version label such as `v1.31.1`
fn major_minor(version: &str) -> (String, String) {
    let mut parts = version.trim_start_matches('v').split('.');
    let major = parts.next().filter(|p| !p.is_empty()).unwrap_or("1");
    let minor = parts.next().unwrap_or("0");
    (major.to_string(), minor.to_string())
}
