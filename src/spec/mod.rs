//! Loading and validating stack specs before resolution

pub mod error;
pub mod loader;
pub mod validator;

pub use error::SpecError;
pub use loader::{SpecFormat, SpecLoader};
pub use validator::SpecValidator;
