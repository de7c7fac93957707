//! Runners take one resolved action through the install contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::payload::{Materializer, Payload, TargetContext};
use crate::resolver::ResolvedAction;
use crate::runtime::contract::{ContractMachine, ContractState};
use crate::runtime::error::{ContractError, ExecutionError, ProbeError};
use crate::runtime::markers::MarkerStore;
use crate::runtime::probe::{version_matches, InstallOutcome, ProbeRegistry};
use crate::runtime::provenance::{provenance_for, ProvenanceSink};
use crate::runtime::retry::{retry_with_policy, RetryPolicy};
use crate::types::{ComponentKind, InstallMarker};

/// Prefix of the line a payload prints to report its terminal state
pub const RESULT_LINE_PREFIX: &str = "@@gpu-stack-result ";

/// Terminal result of one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub state: ContractState,
    pub version: Option<String>,
    /// States visited, where the runner can observe them
    pub history: Vec<ContractState>,
    pub error: Option<String>,
}

impl RunOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: ContractState::Failed,
            version: None,
            history: vec![ContractState::Failed],
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run(
        &self,
        action: &ResolvedAction,
        context: &TargetContext,
    ) -> Result<RunOutcome, ExecutionError>;
}

/// Drives the contract in-process against registered probes
pub struct ContractRunner {
    probes: ProbeRegistry,
    markers: Arc<dyn MarkerStore>,
    provenance: Arc<dyn ProvenanceSink>,
    retry: RetryPolicy,
}

impl ContractRunner {
    pub fn new(
        probes: ProbeRegistry,
        markers: Arc<dyn MarkerStore>,
        provenance: Arc<dyn ProvenanceSink>,
    ) -> Self {
        Self {
            probes,
            markers,
            provenance,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Always ends in a terminal state; errors become `Failed`
    pub async fn execute(&self, action: &ResolvedAction) -> RunOutcome {
        let mut machine = ContractMachine::new(action.kind());

        match self.drive(action, &mut machine).await {
            Ok(version) => RunOutcome {
                state: machine.state(),
                version,
                history: machine.history().to_vec(),
                error: None,
            },
            Err(e) => {
                error!("{} failed in {}: {}", action.kind(), machine.state(), e);
                machine.fail();
                RunOutcome {
                    state: ContractState::Failed,
                    version: None,
                    history: machine.history().to_vec(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn drive(
        &self,
        action: &ResolvedAction,
        machine: &mut ContractMachine,
    ) -> Result<Option<String>, ContractError> {
        let kind = action.kind();
        let probe = self
            .probes
            .get(kind)
            .ok_or(ContractError::ProbeNotFound { kind })?;
        let expected = action.expected_version();

        machine.advance(ContractState::Checking)?;
        let marker = self.markers.load(kind).await?;
        let detected = probe.detect(action).await?;

        let matching = detected
            .as_deref()
            .filter(|version| version_matches(version, expected));
        let functional = match matching {
            Some(_) => probe.functional(action).await?,
            None => false,
        };

        if let (Some(version), true) = (matching, functional) {
            machine.advance(ContractState::AlreadySatisfied)?;
            // First run after the reboot a previous install asked for
            if marker.is_pending_reboot() {
                self.markers
                    .save(&InstallMarker::installed(kind, Some(version.to_string())))
                    .await?;
                self.provenance
                    .record(&provenance_for(action, version))
                    .await?;
                info!("{} came up after reboot ({})", kind, version);
            } else {
                info!("{} already satisfied ({})", kind, version);
            }
            return Ok(Some(version.to_string()));
        }

        if marker.is_pending_reboot() {
            machine.advance(ContractState::PendingReboot)?;
            warn!(
                "{} is installed but waiting for a host reboot; reboot and re-run",
                kind
            );
            return Ok(marker.version.clone());
        }

        let repair = match detected.as_deref() {
            Some(version) if matching.is_some() => {
                warn!("{} {} is present but not functional", kind, version);
                machine.advance(ContractState::NeedsRepair)?;
                true
            }
            Some(version) => {
                info!(
                    "{} found {}, want {}",
                    kind,
                    version,
                    expected.unwrap_or("any")
                );
                machine.advance(ContractState::NeedsInstall)?;
                false
            }
            None => {
                info!("{} not present", kind);
                machine.advance(ContractState::NeedsInstall)?;
                false
            }
        };

        machine.advance(ContractState::Installing)?;
        let operation = format!("{kind} install");
        let outcome =
            retry_with_policy(&self.retry, &operation, move || probe.install(action, repair))
                .await?;

        machine.advance(ContractState::Verifying)?;
        if outcome == InstallOutcome::RebootRequired {
            if !kind.may_require_reboot() {
                return Err(ProbeError::Fatal {
                    kind,
                    reason: "install requested a reboot".to_string(),
                }
                .into());
            }
            let pending = expected.map(str::to_string);
            self.markers
                .save(&InstallMarker::pending_reboot(kind, pending.clone()))
                .await?;
            machine.advance(ContractState::PendingReboot)?;
            warn!("{} requires a host reboot before it takes effect", kind);
            return Ok(pending);
        }

        let version = probe
            .verify(action)
            .await
            .map_err(|e| ContractError::VerificationFailed {
                kind,
                reason: e.to_string(),
            })?;

        self.markers
            .save(&InstallMarker::installed(kind, Some(version.clone())))
            .await?;
        self.provenance
            .record(&provenance_for(action, &version))
            .await?;
        machine.advance(ContractState::Installed)?;
        info!("{} installed ({})", kind, version);
        Ok(Some(version))
    }
}

#[async_trait]
impl ActionRunner for ContractRunner {
    async fn run(
        &self,
        action: &ResolvedAction,
        _context: &TargetContext,
    ) -> Result<RunOutcome, ExecutionError> {
        Ok(self.execute(action).await)
    }
}

#[derive(Debug, Deserialize)]
struct ScriptResult {
    state: String,
    #[serde(default)]
    version: String,
}

/// Materializes each action and runs the payload with a local shell
pub struct ScriptRunner {
    materializer: Arc<dyn Materializer>,
    interpreter: String,
}

impl ScriptRunner {
    pub fn new(materializer: Arc<dyn Materializer>) -> Self {
        Self {
            materializer,
            interpreter: "bash".to_string(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub async fn run_payload(&self, payload: &Payload) -> Result<RunOutcome, ExecutionError> {
        let interpreter =
            which::which(&self.interpreter).map_err(|_| ExecutionError::InterpreterNotFound {
                interpreter: self.interpreter.clone(),
            })?;

        let mut script = tempfile::Builder::new()
            .prefix(&format!("gpu-stack-{}-", payload.kind))
            .suffix(".sh")
            .tempfile()?;
        script.write_all(payload.script.as_bytes())?;
        script.flush()?;

        debug!(
            "Running {} payload {} with {}",
            payload.kind,
            script.path().display(),
            interpreter.display()
        );

        let output = Command::new(&interpreter)
            .arg(script.path())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!("[{}] {}", payload.kind, line);
        }

        if !output.status.success() {
            return Err(ExecutionError::ScriptFailed {
                kind: payload.kind,
                code: output.status.code(),
                stderr: tail(&stderr, 20),
            });
        }

        parse_result(payload.kind, &stdout)
    }
}

#[async_trait]
impl ActionRunner for ScriptRunner {
    async fn run(
        &self,
        action: &ResolvedAction,
        context: &TargetContext,
    ) -> Result<RunOutcome, ExecutionError> {
        let payload = action.materialize(self.materializer.as_ref(), context)?;
        self.run_payload(&payload).await
    }
}

/// Read the last result line a payload printed
pub fn parse_result(kind: ComponentKind, stdout: &str) -> Result<RunOutcome, ExecutionError> {
    let line = stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(RESULT_LINE_PREFIX))
        .ok_or(ExecutionError::MissingResult { kind })?;

    let result: ScriptResult = serde_json::from_str(line.trim())?;
    let state = result
        .state
        .parse::<ContractState>()
        .ok()
        .filter(|s| s.is_terminal())
        .ok_or_else(|| ExecutionError::ActionFailed {
            kind,
            reason: format!("payload reported unexpected state '{}'", result.state),
        })?;

    Ok(RunOutcome {
        state,
        version: Some(result.version).filter(|v| !v.is_empty()),
        history: vec![state],
        error: None,
    })
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
