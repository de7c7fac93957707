//! The per-action install contract as an explicit state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::runtime::error::ContractError;
use crate::types::ComponentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractState {
    Unknown,
    Checking,
    AlreadySatisfied,
    NeedsRepair,
    NeedsInstall,
    Installing,
    Verifying,
    Installed,
    PendingReboot,
    Failed,
}

impl ContractState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractState::Unknown => "unknown",
            ContractState::Checking => "checking",
            ContractState::AlreadySatisfied => "already_satisfied",
            ContractState::NeedsRepair => "needs_repair",
            ContractState::NeedsInstall => "needs_install",
            ContractState::Installing => "installing",
            ContractState::Verifying => "verifying",
            ContractState::Installed => "installed",
            ContractState::PendingReboot => "pending_reboot",
            ContractState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContractState::AlreadySatisfied
                | ContractState::Installed
                | ContractState::PendingReboot
                | ContractState::Failed
        )
    }

    /// Terminal states the pipeline may continue past
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ContractState::AlreadySatisfied | ContractState::Installed
        )
    }

    /// Terminal states that stop the pipeline
    pub fn halts_pipeline(&self) -> bool {
        matches!(self, ContractState::PendingReboot | ContractState::Failed)
    }

    pub fn can_transition_to(&self, next: ContractState) -> bool {
        use ContractState::*;

        match (self, next) {
            (Unknown, Checking) => true,
            // An existing pending-reboot marker ends the run at check time
            (Checking, AlreadySatisfied | NeedsRepair | NeedsInstall | PendingReboot | Failed) => {
                true
            }
            (NeedsRepair | NeedsInstall, Installing) => true,
            (Installing, Verifying | Failed) => true,
            (Verifying, Installed | PendingReboot | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ContractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for ContractState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s {
            "unknown" => ContractState::Unknown,
            "checking" => ContractState::Checking,
            "already_satisfied" => ContractState::AlreadySatisfied,
            "needs_repair" => ContractState::NeedsRepair,
            "needs_install" => ContractState::NeedsInstall,
            "installing" => ContractState::Installing,
            "verifying" => ContractState::Verifying,
            "installed" => ContractState::Installed,
            "pending_reboot" => ContractState::PendingReboot,
            "failed" => ContractState::Failed,
            other => return Err(other.to_string()),
        };
        Ok(state)
    }
}

/// Tracks one action's walk through the contract, rejecting illegal moves
#[derive(Debug, Clone)]
pub struct ContractMachine {
    kind: ComponentKind,
    state: ContractState,
    history: Vec<ContractState>,
}

impl ContractMachine {
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            state: ContractState::Unknown,
            history: vec![ContractState::Unknown],
        }
    }

    pub fn state(&self) -> ContractState {
        self.state
    }

    pub fn history(&self) -> &[ContractState] {
        &self.history
    }

    pub fn advance(&mut self, next: ContractState) -> Result<(), ContractError> {
        if !self.state.can_transition_to(next) {
            return Err(ContractError::IllegalTransition {
                kind: self.kind,
                from: self.state,
                to: next,
            });
        }

        debug!("{}: {} -> {}", self.kind, self.state, next);
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed` from any non-terminal state
    pub fn fail(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if self.state.can_transition_to(ContractState::Failed) {
            debug!("{}: {} -> failed", self.kind, self.state);
        } else {
            debug!("{}: aborting from {}", self.kind, self.state);
        }
        self.state = ContractState::Failed;
        self.history.push(ContractState::Failed);
    }
}
