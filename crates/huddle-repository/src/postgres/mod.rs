//! Postgres backend.

mod group_repository;
mod rows;

pub use group_repository::{PgGroupRepository, PgGroupTransaction};
