//! Data Transfer Objects (DTOs).

mod group_dto;

pub use group_dto::*;
