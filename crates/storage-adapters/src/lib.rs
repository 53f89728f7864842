//! forum-api/crates/storage-adapters/src/lib.rs
//!
//! Implementations of the persistence ports in `domains`.
//!
//! - [`memory`]: process-local store for tests and database-less runs.
//! - `postgres` (feature `db-postgres`): the production store on sqlx.
//!
//! Both classify their failures into `DomainError` before returning and honour
//! the same conditional-write contract on `(id, version)`.

pub mod memory;
#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::InMemoryStore;
