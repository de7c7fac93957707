//! Dependency resolution and constraint propagation

pub mod action;
pub mod constraints;
pub mod defaults;
pub mod dependency;
pub mod error;

pub use action::*;
pub use constraints::{
    AppliedConstraint, ConstraintPropagator, RuntimeVersionRule, SourceClass,
    DEV_TRACK_MIN_CONTAINERD_VERSION, DEV_TRACK_MIN_DOCKER_VERSION,
};
pub use dependency::DependencyResolver;
pub use error::ResolveError;
