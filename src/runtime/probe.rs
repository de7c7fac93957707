//! Target-side probes the contract runner drives

use async_trait::async_trait;
use semver::Version;
use std::collections::HashMap;

use crate::resolver::ResolvedAction;
use crate::runtime::error::ProbeError;
use crate::types::ComponentKind;

/// What an install step left behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Completed,
    /// Installed, but only effective after a host reboot
    RebootRequired,
}

/// Presence, health and install operations for one component kind.
///
/// `install` must be idempotent: the runner calls it again on retry.
#[async_trait]
pub trait ComponentProbe: Send + Sync {
    fn kind(&self) -> ComponentKind;

    /// Installed version, `None` when the component is absent
    async fn detect(&self, action: &ResolvedAction) -> Result<Option<String>, ProbeError>;

    /// Whether the installed component actually works
    async fn functional(&self, action: &ResolvedAction) -> Result<bool, ProbeError>;

    /// `repair` is set when a matching version is present but broken
    async fn install(
        &self,
        action: &ResolvedAction,
        repair: bool,
    ) -> Result<InstallOutcome, ProbeError>;

    /// Post-install functional check, returning the running version
    async fn verify(&self, action: &ResolvedAction) -> Result<String, ProbeError>;
}

/// Probes keyed by the component kind they handle
pub struct ProbeRegistry {
    probes: HashMap<ComponentKind, Box<dyn ComponentProbe>>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self {
            probes: HashMap::new(),
        }
    }

    /// Replaces any probe already registered for the same kind
    pub fn register(&mut self, probe: Box<dyn ComponentProbe>) {
        self.probes.insert(probe.kind(), probe);
    }

    pub fn with_probe(mut self, probe: Box<dyn ComponentProbe>) -> Self {
        self.register(probe);
        self
    }

    pub fn get(&self, kind: ComponentKind) -> Option<&dyn ComponentProbe> {
        self.probes.get(&kind).map(|p| p.as_ref())
    }

    pub fn kinds(&self) -> Vec<ComponentKind> {
        let mut kinds: Vec<_> = self.probes.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl Default for ProbeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Exact version comparison; an unset expectation accepts anything.
///
/// A leading `v` is ignored, and semver parsing normalises build noise
/// such as `1.7.20` vs `v1.7.20`.
pub fn version_matches(installed: &str, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };

    let installed = installed.trim().trim_start_matches('v');
    let expected = expected.trim().trim_start_matches('v');

    match (Version::parse(installed), Version::parse(expected)) {
        (Ok(a), Ok(b)) => a == b,
        _ => installed == expected,
    }
}
