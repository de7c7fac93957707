//! Target-side payloads materialized from resolved actions

pub mod error;
pub mod interface;
pub mod renderer;
pub mod templates;

pub use error::PayloadError;
pub use interface::*;
pub use renderer::ScriptMaterializer;
