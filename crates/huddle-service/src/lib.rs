//! # Huddle Service
//!
//! Group membership coordination and the cache layer in front of it.
//! [`GroupServiceImpl`] validates every membership move against row-locked
//! state, commits it through the repository, then writes the new snapshots
//! through to the cache for every affected member.

pub mod cache;
pub mod dto;
pub mod group_service;
mod group_service_impl;
pub mod metrics;
pub mod token;

pub use cache::*;
pub use dto::*;
pub use group_service::*;
pub use group_service_impl::*;
pub use token::*;
