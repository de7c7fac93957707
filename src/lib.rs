//! GPU stack provisioner
//!
//! Resolves a declarative stack spec (kernel, GPU driver, container runtime,
//! container toolkit, Kubernetes distribution) into an ordered list of
//! actions, propagates cross-component version constraints, and runs each
//! action through an idempotent install contract on the target host.

pub mod cli;
pub mod payload;
pub mod resolver;
pub mod runtime;
pub mod spec;
pub mod types;

pub use payload::{Materializer, Payload, ScriptMaterializer, TargetContext};
pub use resolver::{ConstraintPropagator, DependencyResolver, ResolveError, ResolvedAction};
pub use runtime::{PipelineExecutor, PipelineReport, ProvisionConfig};
pub use spec::{SpecLoader, SpecValidator};
pub use types::*;
