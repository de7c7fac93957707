use std::fs;
use tempfile::TempDir;

use gpu_stack_provisioner::spec::{SpecError, SpecFormat, SpecLoader};

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_yaml_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "stack.yml",
        r#"
driver:
  install: true
  source: package
  package:
    version: "550.54.15"
containerRuntime:
  install: true
  name: docker
orchestrator:
  install: true
  installer: kind
  kindConfig: clusters/gpu.yaml
  featureGates:
    - DynamicResourceAllocation=true
"#,
    );

    let spec = SpecLoader::new().load(&path).unwrap();
    let driver = spec.driver.unwrap();
    assert!(driver.install);
    assert_eq!(
        driver.sources.package.unwrap().version.as_deref(),
        Some("550.54.15")
    );
    let orchestrator = spec.orchestrator.unwrap();
    assert_eq!(orchestrator.kind_config.as_deref(), Some("clusters/gpu.yaml"));
    assert_eq!(orchestrator.feature_gates, vec!["DynamicResourceAllocation=true"]);
    assert!(spec.kernel.is_none());
}

#[test]
fn test_load_json_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "stack.json",
        r#"{"kernel": {"install": true, "version": "6.8.0-45-generic"}, "containerToolkit": {"install": false}}"#,
    );

    let spec = SpecLoader::new().load(&path).unwrap();
    assert_eq!(
        spec.kernel.unwrap().sources.version.as_deref(),
        Some("6.8.0-45-generic")
    );
    assert!(!spec.container_toolkit.unwrap().install);
}

#[test]
fn test_missing_install_flag_defaults_to_false() {
    let spec = SpecLoader::new()
        .load_str("driver:\n  source: package\n", SpecFormat::Yaml)
        .unwrap();
    assert!(!spec.driver.unwrap().install);
}

#[test]
fn test_missing_file_is_read_error() {
    let dir = TempDir::new().unwrap();
    let err = SpecLoader::new()
        .load(&dir.path().join("absent.yaml"))
        .unwrap_err();
    assert!(matches!(err, SpecError::Read { .. }));
}

#[test]
fn test_malformed_yaml_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "broken.yaml", "driver: [install: true\n");

    let err = SpecLoader::new().load(&path).unwrap_err();
    match err {
        SpecError::Parse { path: reported, .. } => assert!(reported.ends_with("broken.yaml")),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_extension_picks_format() {
    assert_eq!(
        SpecFormat::from_path(std::path::Path::new("a/stack.JSON")),
        SpecFormat::Json
    );
    assert_eq!(
        SpecFormat::from_path(std::path::Path::new("stack.yaml")),
        SpecFormat::Yaml
    );
    assert_eq!(
        SpecFormat::from_path(std::path::Path::new("stack")),
        SpecFormat::Yaml
    );
}

#[test]
fn test_shell_metacharacters_are_rejected() {
    let yaml = r#"
containerRuntime:
  install: true
  name: "containerd; rm -rf /"
driver:
  install: true
  source: git
  git:
    repo: "https://example.com/repo.git$(id)"
    ref: "main"
"#;
    let err = SpecLoader::new().load_str(yaml, SpecFormat::Yaml).unwrap_err();
    let SpecError::Validation { errors } = err else {
        panic!("expected validation error");
    };
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| e.starts_with("containerRuntime.name")));
    assert!(errors.iter().any(|e| e.starts_with("driver.git.repo")));
}

#[test]
fn test_traversal_is_rejected() {
    let yaml = r#"
orchestrator:
  install: true
  installer: kind
  kindConfig: ../../etc/shadow
  source: git
  git:
    ref: refs/heads/../../main
"#;
    let err = SpecLoader::new().load_str(yaml, SpecFormat::Yaml).unwrap_err();
    let SpecError::Validation { errors } = err else {
        panic!("expected validation error");
    };
    assert!(errors.iter().any(|e| e.starts_with("orchestrator.kindConfig")));
    assert!(errors.iter().any(|e| e.starts_with("orchestrator.git.ref")));
}

#[test]
fn test_bad_feature_gate_is_rejected() {
    let json = r#"{"orchestrator": {"install": true, "installer": "kubeadm", "featureGates": ["Foo=maybe"]}}"#;
    assert!(matches!(
        SpecLoader::new().load_str(json, SpecFormat::Json),
        Err(SpecError::Validation { .. })
    ));
}
