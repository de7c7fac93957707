pub mod component;
pub mod marker;
pub mod spec;

pub use component::*;
pub use marker::*;
pub use spec::*;
