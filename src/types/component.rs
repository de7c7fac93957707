use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five layers of the provisioned stack, in install order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Kernel,
    Driver,
    ContainerRuntime,
    ContainerToolkit,
    Orchestrator,
}

impl ComponentKind {
    /// Fixed domain order. A predecessor always precedes its successor.
    pub const ORDER: [ComponentKind; 5] = [
        ComponentKind::Kernel,
        ComponentKind::Driver,
        ComponentKind::ContainerRuntime,
        ComponentKind::ContainerToolkit,
        ComponentKind::Orchestrator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Kernel => "kernel",
            ComponentKind::Driver => "driver",
            ComponentKind::ContainerRuntime => "container_runtime",
            ComponentKind::ContainerToolkit => "container_toolkit",
            ComponentKind::Orchestrator => "orchestrator",
        }
    }

    /// State marker file name, shared by payload scripts and the marker store
    pub fn marker_file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }

    /// Kinds whose installation only takes effect after a host reboot
    pub fn may_require_reboot(&self) -> bool {
        matches!(self, ComponentKind::Kernel | ComponentKind::Driver)
    }

    /// Sources this kind can be installed from
    pub fn supported_sources(&self) -> &'static [SourceKind] {
        match self {
            ComponentKind::Kernel => &[SourceKind::Package],
            ComponentKind::Driver => &[SourceKind::Package, SourceKind::Git],
            ComponentKind::ContainerRuntime | ComponentKind::ContainerToolkit => {
                &[SourceKind::Package, SourceKind::Git, SourceKind::Latest]
            }
            ComponentKind::Orchestrator => {
                &[SourceKind::Release, SourceKind::Git, SourceKind::Latest]
            }
        }
    }

    pub fn default_source(&self) -> SourceKind {
        match self {
            ComponentKind::Orchestrator => SourceKind::Release,
            _ => SourceKind::Package,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Where a component's bits come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Distribution or vendor package repository
    Package,
    /// A fixed git reference (tag, commit or ref path)
    Git,
    /// Tip of a tracked branch
    Latest,
    /// Published upstream release artifacts
    Release,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Package => "package",
            SourceKind::Git => "git",
            SourceKind::Latest => "latest",
            SourceKind::Release => "release",
        }
    }

    /// Sources that build from unreleased code
    pub fn is_development(&self) -> bool {
        matches!(self, SourceKind::Git | SourceKind::Latest)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "package" => Ok(SourceKind::Package),
            "git" => Ok(SourceKind::Git),
            "latest" => Ok(SourceKind::Latest),
            "release" => Ok(SourceKind::Release),
            other => Err(other.to_string()),
        }
    }
}

/// Supported container runtime families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeName {
    Containerd,
    Docker,
    Crio,
}

impl RuntimeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeName::Containerd => "containerd",
            RuntimeName::Docker => "docker",
            RuntimeName::Crio => "crio",
        }
    }

    /// CRI endpoint the orchestrator talks to when this runtime is installed
    pub fn cri_socket(&self) -> &'static str {
        match self {
            RuntimeName::Containerd => "unix:///run/containerd/containerd.sock",
            RuntimeName::Docker => "unix:///run/cri-dockerd.sock",
            RuntimeName::Crio => "unix:///var/run/crio/crio.sock",
        }
    }
}

impl fmt::Display for RuntimeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RuntimeName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "containerd" => Ok(RuntimeName::Containerd),
            "docker" => Ok(RuntimeName::Docker),
            "crio" | "cri-o" => Ok(RuntimeName::Crio),
            other => Err(other.to_string()),
        }
    }
}

/// Orchestrator installers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorInstaller {
    Kubeadm,
    Kind,
    Microk8s,
}

impl OrchestratorInstaller {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorInstaller::Kubeadm => "kubeadm",
            OrchestratorInstaller::Kind => "kind",
            OrchestratorInstaller::Microk8s => "microk8s",
        }
    }

    /// Installers that ship their own container runtime
    pub fn is_self_contained(&self) -> bool {
        matches!(self, OrchestratorInstaller::Microk8s)
    }

    pub fn supported_sources(&self) -> &'static [SourceKind] {
        match self {
            OrchestratorInstaller::Microk8s => &[SourceKind::Release],
            _ => ComponentKind::Orchestrator.supported_sources(),
        }
    }
}

impl fmt::Display for OrchestratorInstaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for OrchestratorInstaller {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kubeadm" => Ok(OrchestratorInstaller::Kubeadm),
            "kind" => Ok(OrchestratorInstaller::Kind),
            "microk8s" => Ok(OrchestratorInstaller::Microk8s),
            other => Err(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_domain_order() {
        assert_eq!(ComponentKind::ORDER[0], ComponentKind::Kernel);
        assert_eq!(ComponentKind::ORDER[4], ComponentKind::Orchestrator);
        assert!(ComponentKind::ORDER.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("cri-o".parse::<RuntimeName>(), Ok(RuntimeName::Crio));
        assert_eq!(" Docker ".parse::<RuntimeName>(), Ok(RuntimeName::Docker));
        assert!("podman".parse::<RuntimeName>().is_err());
        assert_eq!(
            "MicroK8s".parse::<OrchestratorInstaller>(),
            Ok(OrchestratorInstaller::Microk8s)
        );
        assert!("k3s".parse::<OrchestratorInstaller>().is_err());
        assert_eq!("latest".parse::<SourceKind>(), Ok(SourceKind::Latest));
    }

    #[test]
    fn test_reboot_class() {
        assert!(ComponentKind::Kernel.may_require_reboot());
        assert!(ComponentKind::Driver.may_require_reboot());
        assert!(!ComponentKind::ContainerRuntime.may_require_reboot());
    }

    #[test]
    fn test_microk8s_release_only() {
        assert_eq!(
            OrchestratorInstaller::Microk8s.supported_sources(),
            &[SourceKind::Release]
        );
        assert!(OrchestratorInstaller::Kind
            .supported_sources()
            .contains(&SourceKind::Git));
    }
}
