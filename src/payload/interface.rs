//! Materialization interface shared by every payload backend

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::payload::error::PayloadError;
use crate::resolver::ResolvedAction;
use crate::runtime::retry::{BackoffStrategy, RetryPolicy};
use crate::types::{ComponentKind, RuntimeName};

pub const DEFAULT_STATE_DIR: &str = "/var/lib/gpu-stack";

/// Turns a resolved action into something that can run on the target
pub trait Materializer: Send + Sync {
    fn materialize(
        &self,
        action: &ResolvedAction,
        context: &TargetContext,
    ) -> Result<Payload, PayloadError>;
}

/// The data a payload needs about the rest of the stack and the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetContext {
    pub runtime: Option<RuntimeName>,
    pub cri_socket: Option<String>,
    pub enable_cdi: bool,
    pub state_dir: PathBuf,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    pub linear_backoff: bool,
    /// Let kernel and driver payloads reboot the host themselves
    pub allow_reboot: bool,
}

impl Default for TargetContext {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            runtime: None,
            cri_socket: None,
            enable_cdi: false,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            retry_attempts: retry.max_attempts,
            retry_delay_secs: retry.delay.as_secs(),
            linear_backoff: matches!(retry.backoff, BackoffStrategy::Linear),
            allow_reboot: false,
        }
    }
}

impl TargetContext {
    /// Derive runtime and toolkit facts from the resolved plan
    pub fn from_actions(actions: &[ResolvedAction]) -> Self {
        let mut context = Self::default();

        for action in actions {
            if let Some(runtime) = action.config().as_runtime() {
                context.runtime = Some(runtime.name);
                context.cri_socket = Some(runtime.name.cri_socket().to_string());
            }
            if let Some(toolkit) = action.config().as_toolkit() {
                context.enable_cdi = toolkit.enable_cdi;
            }
        }

        context
    }

    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    pub fn with_retry(mut self, policy: &RetryPolicy) -> Self {
        self.retry_attempts = policy.max_attempts;
        self.retry_delay_secs = policy.delay.as_secs();
        self.linear_backoff = matches!(policy.backoff, BackoffStrategy::Linear);
        self
    }

    pub fn with_reboot(mut self, allow_reboot: bool) -> Self {
        self.allow_reboot = allow_reboot;
        self
    }
}

/// Side effect a payload is expected to have on the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "target", rename_all = "snake_case")]
pub enum SideEffect {
    PackageRepository(String),
    Package(String),
    SourceBuild(String),
    Download(String),
    Service(String),
    File(PathBuf),
    StateMarker(PathBuf),
    Reboot,
}

/// A materialized, self-contained unit of target-side work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub kind: ComponentKind,
    pub order_index: usize,
    pub script: String,
    /// sha256 of `script`
    pub digest: String,
    pub expected_version: Option<String>,
    pub side_effects: Vec<SideEffect>,
}

impl Payload {
    /// File name used when payloads are written to disk
    pub fn file_name(&self) -> String {
        format!("{:02}-{}.sh", self.order_index, self.kind)
    }
}
