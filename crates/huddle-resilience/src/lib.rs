//! # Huddle Resilience
//!
//! Bounded retries for best-effort writes and deadlines for units of work.

pub mod retry;
pub mod timeout;

pub use retry::*;
pub use timeout::*;
