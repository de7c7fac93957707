//! Per-component defaults applied when a request leaves a field unset

use crate::types::{ComponentKind, RuntimeName};

pub const DEFAULT_KUBERNETES_VERSION: &str = "v1.31.1";
pub const DEFAULT_TOOLKIT_CHANNEL: &str = "stable";
pub const DEFAULT_BRANCH: &str = "main";

pub const KUBERNETES_REPO: &str = "https://github.com/kubernetes/kubernetes.git";
pub const DRIVER_REPO: &str = "https://github.com/NVIDIA/open-gpu-kernel-modules.git";
pub const TOOLKIT_REPO: &str = "https://github.com/NVIDIA/nvidia-container-toolkit.git";
pub const CONTAINERD_REPO: &str = "https://github.com/containerd/containerd.git";
pub const DOCKER_REPO: &str = "https://github.com/moby/moby.git";
pub const CRIO_REPO: &str = "https://github.com/cri-o/cri-o.git";

/// Defaults for one component (and runtime family, where it matters)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDefaults {
    pub repo: &'static str,
    pub branch: &'static str,
    pub channel: Option<&'static str>,
    pub release_version: Option<&'static str>,
}

pub fn for_component(kind: ComponentKind, runtime: Option<RuntimeName>) -> SourceDefaults {
    match kind {
        ComponentKind::Kernel => SourceDefaults {
            repo: "",
            branch: DEFAULT_BRANCH,
            channel: None,
            release_version: None,
        },
        ComponentKind::Driver => SourceDefaults {
            repo: DRIVER_REPO,
            branch: DEFAULT_BRANCH,
            channel: None,
            release_version: None,
        },
        ComponentKind::ContainerRuntime => SourceDefaults {
            repo: match runtime.unwrap_or(RuntimeName::Containerd) {
                RuntimeName::Containerd => CONTAINERD_REPO,
                RuntimeName::Docker => DOCKER_REPO,
                RuntimeName::Crio => CRIO_REPO,
            },
            branch: DEFAULT_BRANCH,
            channel: None,
            release_version: None,
        },
        ComponentKind::ContainerToolkit => SourceDefaults {
            repo: TOOLKIT_REPO,
            branch: DEFAULT_BRANCH,
            channel: Some(DEFAULT_TOOLKIT_CHANNEL),
            release_version: None,
        },
        // kubernetes still tracks master
        ComponentKind::Orchestrator => SourceDefaults {
            repo: KUBERNETES_REPO,
            branch: "master",
            channel: None,
            release_version: Some(DEFAULT_KUBERNETES_VERSION),
        },
    }
}
