use thiserror::Error;

use crate::types::{ComponentKind, SourceKind};

/// Errors detected while turning a stack spec into actions. Any of these
/// aborts resolution as a whole; no partial action list is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("Unsupported source '{source_name}' for {kind}")]
    UnsupportedSource {
        kind: ComponentKind,
        source_name: String,
    },

    #[error("Unsupported container runtime: {name}")]
    UnsupportedRuntime { name: String },

    #[error("Unknown orchestrator installer: {installer}")]
    UnknownInstaller { installer: String },

    #[error("Installer {installer} cannot be installed from source '{source_kind}'")]
    UnsupportedInstallerSource {
        installer: String,
        source_kind: SourceKind,
    },

    #[error("Missing required field '{field}' for {kind} {source_kind} source")]
    MissingSourceConfig {
        kind: ComponentKind,
        source_kind: SourceKind,
        field: String,
    },

    #[error("Conflicting source config for {kind}: selected {selected} but {populated:?} populated")]
    ConflictingSourceConfig {
        kind: ComponentKind,
        selected: SourceKind,
        populated: Vec<SourceKind>,
    },

    #[error("A pinned version does not apply to {kind} {source_kind} source")]
    VersionNotApplicable {
        kind: ComponentKind,
        source_kind: SourceKind,
    },

    #[error("Conflicting versions for {kind}: {first} and {second}")]
    ConflictingVersions {
        kind: ComponentKind,
        first: String,
        second: String,
    },
}

pub type Result<T> = std::result::Result<T, ResolveError>;
