//! Custom Axum extractors.

mod caller;
mod validated;

pub use caller::*;
pub use validated::*;
