use thiserror::Error;

use crate::payload::PayloadError;
use crate::runtime::contract::ContractState;
use crate::types::ComponentKind;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Action {kind} failed: {reason}")]
    ActionFailed { kind: ComponentKind, reason: String },

    #[error("Action {kind} timed out after {timeout}s")]
    ActionTimeout { kind: ComponentKind, timeout: u64 },

    #[error("Payload for {kind} exited with status {code:?}: {stderr}")]
    ScriptFailed {
        kind: ComponentKind,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Payload for {kind} did not report a result")]
    MissingResult { kind: ComponentKind },

    #[error("Invalid config {path}: {reason}")]
    InvalidConfig { path: String, reason: String },

    #[error("Interpreter not found: {interpreter}")]
    InterpreterNotFound { interpreter: String },

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("Illegal transition for {kind}: {from:?} -> {to:?}")]
    IllegalTransition {
        kind: ComponentKind,
        from: ContractState,
        to: ContractState,
    },

    #[error("No probe registered for {kind}")]
    ProbeNotFound { kind: ComponentKind },

    #[error("Verification failed for {kind}: {reason}")]
    VerificationFailed { kind: ComponentKind, reason: String },

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("State error: {0}")]
    State(#[from] MarkerError),
}

#[derive(Debug, Error)]
pub enum ProbeError {
    /// Worth retrying: network hiccups, package lock contention
    #[error("Transient failure in {kind}: {reason}")]
    Transient { kind: ComponentKind, reason: String },

    #[error("Fatal failure in {kind}: {reason}")]
    Fatal { kind: ComponentKind, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProbeError::Transient { .. })
    }
}

/// Failures reading or writing markers and provenance records
#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("Corrupt state file {path}: {error}")]
    Corrupt { path: String, error: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
