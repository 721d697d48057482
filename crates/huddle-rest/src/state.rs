//! Application state for Axum handlers.

use huddle_service::GroupService;
use shaku::{HasComponent, Module};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub group_service: Arc<dyn GroupService>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(group_service: Arc<dyn GroupService>) -> Self {
        Self { group_service }
    }

    /// Resolves the state's services from a Shaku module.
    pub fn from_module<M>(module: &M) -> Self
    where
        M: Module + HasComponent<dyn GroupService>,
    {
        Self::new(module.resolve())
    }
}
