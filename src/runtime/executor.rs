use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::payload::{Materializer, SideEffect, TargetContext, DEFAULT_STATE_DIR};
use crate::resolver::ResolvedAction;
use crate::runtime::contract::ContractState;
use crate::runtime::error::ExecutionError;
use crate::runtime::retry::{serde_duration_opt, RetryPolicy};
use crate::runtime::runner::{ActionRunner, RunOutcome};
use crate::types::ComponentKind;

/// Executor settings, loadable from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub retry: RetryPolicy,
    #[serde(with = "serde_duration_opt")]
    pub action_timeout: Option<Duration>,
    pub state_dir: PathBuf,
    pub allow_reboot: bool,
    pub dry_run: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            action_timeout: Some(Duration::from_secs(1800)), // 30 minutes
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            allow_reboot: false,
            dry_run: false,
        }
    }
}

impl ProvisionConfig {
    /// `<config_dir>/gpu-stack/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gpu-stack").join("config.yaml"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ExecutionError> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| ExecutionError::InvalidConfig {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Explicit path, else the default path if it exists, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ExecutionError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn target_context(&self, actions: &[ResolvedAction]) -> TargetContext {
        TargetContext::from_actions(actions)
            .with_state_dir(self.state_dir.clone())
            .with_retry(&self.retry)
            .with_reboot(self.allow_reboot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Succeeded,
    /// Halted cleanly; reboot the host and run again
    PendingReboot,
    Failed,
    DryRun,
}

impl PipelineStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, PipelineStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    pub kind: ComponentKind,
    pub order_index: usize,
    pub state: ContractState,
    pub version: Option<String>,
    pub history: Vec<ContractState>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// What a dry run would have executed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedPayload {
    pub kind: ComponentKind,
    pub file_name: String,
    pub digest: String,
    pub expected_version: Option<String>,
    pub side_effects: Vec<SideEffect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub status: PipelineStatus,
    pub outcomes: Vec<ActionReport>,
    /// Kinds never attempted because an earlier action halted the run
    pub skipped: Vec<ComponentKind>,
    pub planned: Vec<PlannedPayload>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl PipelineReport {
    pub fn outcome(&self, kind: ComponentKind) -> Option<&ActionReport> {
        self.outcomes.iter().find(|o| o.kind == kind)
    }

    pub fn failed_action(&self) -> Option<&ActionReport> {
        self.outcomes
            .iter()
            .find(|o| o.state == ContractState::Failed)
    }
}

/// Runs a host's actions strictly in order, stopping at the first
/// failure or pending reboot
pub struct PipelineExecutor {
    runner: Arc<dyn ActionRunner>,
    config: ProvisionConfig,
}

impl PipelineExecutor {
    pub fn new(runner: Arc<dyn ActionRunner>, config: ProvisionConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    pub async fn execute(&self, actions: &[ResolvedAction]) -> PipelineReport {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();
        let context = self.config.target_context(actions);

        info!("Starting run {} with {} actions", run_id, actions.len());

        let mut status = PipelineStatus::Succeeded;
        let mut outcomes = Vec::with_capacity(actions.len());
        let mut skipped = Vec::new();

        for (position, action) in actions.iter().enumerate() {
            let kind = action.kind();
            info!("[{}/{}] {}", position + 1, actions.len(), kind);

            let action_started = Utc::now();
            let action_start = Instant::now();
            let outcome = match self.run_action(action, &context).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("{} failed: {}", kind, e);
                    RunOutcome::failed(e.to_string())
                }
            };

            let state = outcome.state;
            outcomes.push(ActionReport {
                kind,
                order_index: action.order_index(),
                state,
                version: outcome.version,
                history: outcome.history,
                error: outcome.error,
                started_at: action_started,
                duration_ms: action_start.elapsed().as_millis() as u64,
            });

            if state.halts_pipeline() {
                skipped = actions[position + 1..].iter().map(|a| a.kind()).collect();
                status = if state == ContractState::PendingReboot {
                    warn!("{} is pending a reboot, halting run", kind);
                    PipelineStatus::PendingReboot
                } else {
                    error!("{} failed, aborting remaining actions", kind);
                    PipelineStatus::Failed
                };
                break;
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!("Run {} finished: {:?} in {}ms", run_id, status, duration_ms);

        PipelineReport {
            run_id,
            status,
            outcomes,
            skipped,
            planned: Vec::new(),
            started_at,
            finished_at: Utc::now(),
            duration_ms,
        }
    }

    async fn run_action(
        &self,
        action: &ResolvedAction,
        context: &TargetContext,
    ) -> Result<RunOutcome, ExecutionError> {
        match self.config.action_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.runner.run(action, context))
                .await
                .map_err(|_| ExecutionError::ActionTimeout {
                    kind: action.kind(),
                    timeout: timeout.as_secs(),
                })?,
            None => self.runner.run(action, context).await,
        }
    }

    /// Materialize every action without running anything
    pub fn dry_run(
        &self,
        actions: &[ResolvedAction],
        materializer: &dyn Materializer,
    ) -> Result<PipelineReport, ExecutionError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let context = self.config.target_context(actions);

        let planned = actions
            .iter()
            .map(|action| -> Result<PlannedPayload, ExecutionError> {
                let payload = action.materialize(materializer, &context)?;
                Ok(PlannedPayload {
                    kind: payload.kind,
                    file_name: payload.file_name(),
                    digest: payload.digest,
                    expected_version: payload.expected_version,
                    side_effects: payload.side_effects,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!("Dry run planned {} payloads", planned.len());

        Ok(PipelineReport {
            run_id: Uuid::new_v4().to_string(),
            status: PipelineStatus::DryRun,
            outcomes: Vec::new(),
            skipped: Vec::new(),
            planned,
            started_at,
            finished_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: ProvisionConfig =
            serde_yaml::from_str("action_timeout: 60\nallow_reboot: true\n").unwrap();
        assert_eq!(config.action_timeout, Some(Duration::from_secs(60)));
        assert!(config.allow_reboot);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.state_dir, PathBuf::from(DEFAULT_STATE_DIR));
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "state_dir: /srv/state\nretry:\n  max_attempts: 5\n  delay: 1\n  backoff: linear\n",
        )
        .unwrap();

        let config = ProvisionConfig::load(Some(&path)).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/srv/state"));
        assert_eq!(config.retry.max_attempts, 5);

        std::fs::write(&path, "retry: [").unwrap();
        assert!(matches!(
            ProvisionConfig::from_file(&path),
            Err(ExecutionError::InvalidConfig { .. })
        ));
    }
}
