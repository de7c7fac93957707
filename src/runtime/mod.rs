//! Target-side execution: the install contract, runners and the pipeline

pub mod contract;
pub mod error;
pub mod executor;
pub mod markers;
pub mod probe;
pub mod provenance;
pub mod retry;
pub mod runner;

pub use contract::{ContractMachine, ContractState};
pub use error::*;
pub use executor::*;
pub use markers::{FileMarkerStore, MarkerStore, MemoryMarkerStore};
pub use probe::{version_matches, ComponentProbe, InstallOutcome, ProbeRegistry};
pub use provenance::{provenance_for, FileProvenanceSink, MemoryProvenanceSink, ProvenanceSink};
pub use retry::{retry_with_policy, BackoffStrategy, RetryPolicy};
pub use runner::{parse_result, ActionRunner, ContractRunner, RunOutcome, ScriptRunner};
