use serde::{Deserialize, Serialize};

/// Declarative description of the stack to provision on one host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StackSpec {
    pub kernel: Option<KernelRequest>,
    pub driver: Option<DriverRequest>,
    pub container_runtime: Option<RuntimeRequest>,
    pub container_toolkit: Option<ToolkitRequest>,
    pub orchestrator: Option<OrchestratorRequest>,
}

impl StackSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kernel(mut self, request: KernelRequest) -> Self {
        self.kernel = Some(request);
        self
    }

    pub fn with_driver(mut self, request: DriverRequest) -> Self {
        self.driver = Some(request);
        self
    }

    pub fn with_container_runtime(mut self, request: RuntimeRequest) -> Self {
        self.container_runtime = Some(request);
        self
    }

    pub fn with_container_toolkit(mut self, request: ToolkitRequest) -> Self {
        self.container_toolkit = Some(request);
        self
    }

    pub fn with_orchestrator(mut self, request: OrchestratorRequest) -> Self {
        self.orchestrator = Some(request);
        self
    }
}

/// Source selection shared by every component request.
///
/// `source` names the variant; at most one of the variant blocks may be
/// populated and it must match the selected source. `version` is a
/// shorthand for the pinned version of a `package` or `release` source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceFields {
    pub source: Option<String>,
    pub version: Option<String>,
    pub package: Option<PackageSource>,
    pub git: Option<GitSource>,
    pub latest: Option<LatestSource>,
    pub release: Option<ReleaseSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSource {
    pub version: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSource {
    pub repo: Option<String>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatestSource {
    pub repo: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseSource {
    pub version: Option<String>,
}

impl SourceFields {
    pub fn package(version: Option<&str>) -> Self {
        Self {
            source: Some("package".to_string()),
            package: Some(PackageSource {
                version: version.map(str::to_string),
                channel: None,
            }),
            ..Self::default()
        }
    }

    pub fn git(repo: Option<&str>, reference: &str) -> Self {
        Self {
            source: Some("git".to_string()),
            git: Some(GitSource {
                repo: repo.map(str::to_string),
                reference: Some(reference.to_string()),
            }),
            ..Self::default()
        }
    }

    pub fn latest(repo: Option<&str>, branch: Option<&str>) -> Self {
        Self {
            source: Some("latest".to_string()),
            latest: Some(LatestSource {
                repo: repo.map(str::to_string),
                branch: branch.map(str::to_string),
            }),
            ..Self::default()
        }
    }

    pub fn release(version: Option<&str>) -> Self {
        Self {
            source: Some("release".to_string()),
            release: Some(ReleaseSource {
                version: version.map(str::to_string),
            }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelRequest {
    #[serde(default)]
    pub install: bool,
    #[serde(flatten)]
    pub sources: SourceFields,
}

impl KernelRequest {
    pub fn new(version: Option<&str>) -> Self {
        Self {
            install: true,
            sources: SourceFields {
                version: version.map(str::to_string),
                ..SourceFields::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverRequest {
    #[serde(default)]
    pub install: bool,
    #[serde(flatten)]
    pub sources: SourceFields,
}

impl DriverRequest {
    pub fn new() -> Self {
        Self {
            install: true,
            sources: SourceFields::default(),
        }
    }

    pub fn with_sources(mut self, sources: SourceFields) -> Self {
        self.sources = sources;
        self
    }
}

impl Default for DriverRequest {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeRequest {
    #[serde(default)]
    pub install: bool,
    /// Runtime family; containerd when unset
    pub name: Option<String>,
    #[serde(flatten)]
    pub sources: SourceFields,
}

impl RuntimeRequest {
    pub fn new(name: &str) -> Self {
        Self {
            install: true,
            name: Some(name.to_string()),
            sources: SourceFields::default(),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.sources.version = Some(version.to_string());
        self
    }

    pub fn with_sources(mut self, sources: SourceFields) -> Self {
        self.sources = sources;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolkitRequest {
    #[serde(default)]
    pub install: bool,
    #[serde(default)]
    pub enable_cdi: bool,
    #[serde(flatten)]
    pub sources: SourceFields,
}

impl ToolkitRequest {
    pub fn new() -> Self {
        Self {
            install: true,
            enable_cdi: false,
            sources: SourceFields::default(),
        }
    }

    pub fn with_cdi(mut self, enable_cdi: bool) -> Self {
        self.enable_cdi = enable_cdi;
        self
    }

    pub fn with_sources(mut self, sources: SourceFields) -> Self {
        self.sources = sources;
        self
    }
}

impl Default for ToolkitRequest {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorRequest {
    #[serde(default)]
    pub install: bool,
    /// Installer variant; kubeadm when unset
    pub installer: Option<String>,
    #[serde(flatten)]
    pub sources: SourceFields,
    /// Cluster config file handed to kind
    pub kind_config: Option<String>,
    #[serde(default)]
    pub feature_gates: Vec<String>,
}

impl OrchestratorRequest {
    pub fn new(installer: &str) -> Self {
        Self {
            install: true,
            installer: Some(installer.to_string()),
            sources: SourceFields::default(),
            kind_config: None,
            feature_gates: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.sources.version = Some(version.to_string());
        self
    }

    pub fn with_sources(mut self, sources: SourceFields) -> Self {
        self.sources = sources;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_yaml_spec() {
        let yaml = r#"
containerRuntime:
  install: true
  name: docker
containerToolkit:
  install: true
  enableCdi: true
orchestrator:
  install: true
  installer: kubeadm
  source: git
  git:
    ref: refs/tags/v1.31.0
"#;
        let spec: StackSpec = serde_yaml::from_str(yaml).unwrap();
        assert!(spec.kernel.is_none());

        let runtime = spec.container_runtime.unwrap();
        assert_eq!(runtime.name.as_deref(), Some("docker"));
        assert!(runtime.sources.version.is_none());

        assert!(spec.container_toolkit.unwrap().enable_cdi);

        let orchestrator = spec.orchestrator.unwrap();
        assert_eq!(orchestrator.sources.source.as_deref(), Some("git"));
        assert_eq!(
            orchestrator.sources.git.unwrap().reference.as_deref(),
            Some("refs/tags/v1.31.0")
        );
    }

    #[test]
    fn test_install_defaults_to_false() {
        let spec: StackSpec = serde_yaml::from_str("driver:\n  source: package\n").unwrap();
        assert!(!spec.driver.unwrap().install);
    }
}
