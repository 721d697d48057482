//! Process-local backend.

mod group_repository;

pub use group_repository::{InMemoryGroupRepository, InMemoryGroupTransaction, MemoryStore};
