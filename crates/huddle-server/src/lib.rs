//! # Huddle Server
//!
//! Wires configuration, storage, cache and the HTTP surface into a running
//! process.

pub mod app;
pub mod di;
pub mod startup;

pub use app::*;
