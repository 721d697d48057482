//! # Huddle Repository
//!
//! Persistent access to groups and their members.
//!
//! ```text
//! GroupService
//!   ↓  Arc<dyn GroupRepository>       pool-level reads
//!   ↓  Box<dyn GroupTransaction>      locked reads and writes, one unit of work
//! PgGroupRepository                   Postgres / SQLx, SELECT ... FOR UPDATE
//! InMemoryGroupRepository             single-writer store for tests and local runs
//! ```

pub mod memory;
pub mod pool;
pub mod postgres;
pub mod traits;

pub use memory::*;
pub use pool::*;
pub use postgres::*;
pub use traits::*;
