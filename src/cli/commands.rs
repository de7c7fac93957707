use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cli::options::{ApplyOptions, OutputFormat};
use crate::cli::output::{print_plan, print_report};
use crate::payload::{Materializer, ScriptMaterializer};
use crate::resolver::{DependencyResolver, ResolvedAction};
use crate::runtime::{PipelineExecutor, PipelineReport, ProvisionConfig, ScriptRunner};
use crate::spec::SpecLoader;

/// Load, validate and resolve a spec file
pub fn resolve_spec(path: &Path) -> Result<Vec<ResolvedAction>> {
    let spec = SpecLoader::new()
        .load(path)
        .with_context(|| format!("Failed to load spec {}", path.display()))?;
    let actions = DependencyResolver::new()
        .resolve(&spec)
        .context("Failed to resolve spec")?;
    info!("Resolved {} actions", actions.len());
    Ok(actions)
}

pub fn run_plan(spec: &Path, format: OutputFormat) -> Result<()> {
    let actions = resolve_spec(spec)?;
    match format {
        OutputFormat::Text => print_plan(&actions),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&actions)?),
    }
    Ok(())
}

/// Writes `NN-<kind>.sh` per action and returns the written paths
pub fn run_render(
    spec: &Path,
    output_dir: &Path,
    config: Option<&Path>,
) -> Result<Vec<std::path::PathBuf>> {
    let actions = resolve_spec(spec)?;
    let config = ProvisionConfig::load(config)?;
    let context = config.target_context(&actions);
    let materializer = ScriptMaterializer::new()?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut written = Vec::with_capacity(actions.len());
    for action in &actions {
        let payload = action.materialize(&materializer, &context)?;
        let path = output_dir.join(payload.file_name());
        std::fs::write(&path, &payload.script)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        set_executable(&path)?;
        info!("Rendered {} ({})", path.display(), &payload.digest[..12]);
        written.push(path);
    }

    println!("📝 Rendered {} payloads to {}", written.len(), output_dir.display());
    Ok(written)
}

pub async fn run_apply(options: &ApplyOptions) -> Result<PipelineReport> {
    let actions = resolve_spec(&options.spec)?;
    let config = apply_overrides(ProvisionConfig::load(options.config.as_deref())?, options);

    let materializer: Arc<dyn Materializer> = Arc::new(ScriptMaterializer::new()?);
    let runner = Arc::new(ScriptRunner::new(materializer.clone()));
    let executor = PipelineExecutor::new(runner, config);

    let report = if executor.config().dry_run {
        executor.dry_run(&actions, materializer.as_ref())?
    } else {
        executor.execute(&actions).await
    };

    match options.format {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(report)
}

/// Command-line flags win over the config file
pub fn apply_overrides(mut config: ProvisionConfig, options: &ApplyOptions) -> ProvisionConfig {
    if let Some(state_dir) = &options.state_dir {
        config.state_dir = state_dir.clone();
    }
    if let Some(timeout) = options.timeout {
        config.action_timeout = (timeout > 0).then(|| Duration::from_secs(timeout));
    }
    config.allow_reboot |= options.allow_reboot;
    config.dry_run |= options.dry_run;
    config
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
