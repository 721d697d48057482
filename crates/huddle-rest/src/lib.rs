//! # Huddle REST
//!
//! HTTP surface for the group coordinator, plus health and metrics endpoints.
//! The caller's identity arrives in the `X-User-Id` header from the gateway.

pub mod controllers;
pub mod extractors;
pub mod middleware;
pub mod responses;
pub mod router;
pub mod state;

pub use router::*;
pub use state::*;
