//! Injection-safety checks on every free-text spec field.
//!
//! Values end up inside shell payloads, so anything outside a
//! conservative character set is rejected up front.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::spec::error::{Result, SpecError};
use crate::types::{SourceFields, StackSpec};

static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap());

static VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+~:-]*$").unwrap());

static GIT_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._/+-]*$").unwrap());

static REPO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://|ssh://|git@)[A-Za-z0-9._~:/@%+-]+$").unwrap()
});

static PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_./-]+$").unwrap());

static FEATURE_GATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+=(true|false)$").unwrap());

#[derive(Debug, Default)]
pub struct SpecValidator;

impl SpecValidator {
    pub fn new() -> Self {
        Self
    }

    /// Collects every violation rather than stopping at the first
    pub fn validate(&self, spec: &StackSpec) -> Result<()> {
        let mut errors = Vec::new();

        if let Some(kernel) = &spec.kernel {
            check_sources("kernel", &kernel.sources, &mut errors);
        }
        if let Some(driver) = &spec.driver {
            check_sources("driver", &driver.sources, &mut errors);
        }
        if let Some(runtime) = &spec.container_runtime {
            check(&NAME, "containerRuntime.name", runtime.name.as_deref(), &mut errors);
            check_sources("containerRuntime", &runtime.sources, &mut errors);
        }
        if let Some(toolkit) = &spec.container_toolkit {
            check_sources("containerToolkit", &toolkit.sources, &mut errors);
        }
        if let Some(orchestrator) = &spec.orchestrator {
            check(
                &NAME,
                "orchestrator.installer",
                orchestrator.installer.as_deref(),
                &mut errors,
            );
            check(
                &PATH,
                "orchestrator.kindConfig",
                orchestrator.kind_config.as_deref(),
                &mut errors,
            );
            if orchestrator
                .kind_config
                .as_deref()
                .is_some_and(|p| p.split('/').any(|part| part == ".."))
            {
                errors.push("orchestrator.kindConfig: parent directory components are not allowed".to_string());
            }
            for gate in &orchestrator.feature_gates {
                check(
                    &FEATURE_GATE,
                    "orchestrator.featureGates",
                    Some(gate),
                    &mut errors,
                );
            }
            check_sources("orchestrator", &orchestrator.sources, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            for error in &errors {
                warn!("Rejected spec field {}", error);
            }
            Err(SpecError::Validation { errors })
        }
    }
}

fn check_sources(prefix: &str, sources: &SourceFields, errors: &mut Vec<String>) {
    let field = |name: &str| format!("{prefix}.{name}");

    check(&NAME, &field("source"), sources.source.as_deref(), errors);
    check(&VERSION, &field("version"), sources.version.as_deref(), errors);

    if let Some(package) = &sources.package {
        check(&VERSION, &field("package.version"), package.version.as_deref(), errors);
        check(&GIT_REF, &field("package.channel"), package.channel.as_deref(), errors);
    }
    if let Some(git) = &sources.git {
        check(&REPO, &field("git.repo"), git.repo.as_deref(), errors);
        check(&GIT_REF, &field("git.ref"), git.reference.as_deref(), errors);
        if git.reference.as_deref().is_some_and(|r| r.contains("..")) {
            errors.push(format!("{}: '..' is not allowed in a git ref", field("git.ref")));
        }
    }
    if let Some(latest) = &sources.latest {
        check(&REPO, &field("latest.repo"), latest.repo.as_deref(), errors);
        check(&GIT_REF, &field("latest.branch"), latest.branch.as_deref(), errors);
    }
    if let Some(release) = &sources.release {
        check(&VERSION, &field("release.version"), release.version.as_deref(), errors);
    }
}

fn check(pattern: &Regex, field: &str, value: Option<&str>, errors: &mut Vec<String>) {
    if let Some(value) = value {
        if !pattern.is_match(value) {
            errors.push(format!("{field}: invalid value '{value}'"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DriverRequest, OrchestratorRequest, RuntimeRequest};

    #[test]
    fn test_accepts_typical_spec() {
        let spec = StackSpec::new()
            .with_driver(DriverRequest::new().with_sources(SourceFields::git(
                Some("https://github.com/NVIDIA/open-gpu-kernel-modules.git"),
                "refs/tags/550.54.15",
            )))
            .with_container_runtime(RuntimeRequest::new("docker").with_version("5:27.3.1-1~ubuntu.24.04~noble"))
            .with_orchestrator(OrchestratorRequest::new("kubeadm").with_version("v1.31.1"));

        assert!(SpecValidator::new().validate(&spec).is_ok());
    }

    #[test]
    fn test_rejects_shell_metacharacters() {
        let spec = StackSpec::new()
            .with_container_runtime(RuntimeRequest::new("containerd").with_version("1.7.20; rm -rf /"))
            .with_orchestrator(OrchestratorRequest::new("kind").with_sources(SourceFields::git(
                Some("https://example.com/$(whoami).git"),
                "main",
            )));

        let err = SpecValidator::new().validate(&spec).unwrap_err();
        let SpecError::Validation { errors } = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("containerRuntime.version"));
        assert!(errors[1].starts_with("orchestrator.git.repo"));
    }

    #[test]
    fn test_rejects_ref_traversal_and_bad_gates() {
        let mut orchestrator = OrchestratorRequest::new("kind")
            .with_sources(SourceFields::git(None, "refs/../../etc"));
        orchestrator.feature_gates = vec!["DynamicResourceAllocation=yes".to_string()];

        let err = SpecValidator::new()
            .validate(&StackSpec::new().with_orchestrator(orchestrator))
            .unwrap_err();
        assert!(err.to_string().contains("featureGates"));
        assert!(err.to_string().contains("git.ref"));
    }
}
