//! Utility types shared by the attribute and geometry layers.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam, plus [`BBox3f`]
//! - [`init_tracing`] - Logging setup for tests and embedding applications

mod error;
mod logging;
mod math;

pub use error::*;
pub use logging::*;
pub use math::*;
