//! forum-api/crates/domains/src/lib.rs
//!
//! The central domain types and port definitions for the forum API.
//! Nothing in here performs I/O; adapters implement the traits in [`ports`].

pub mod error;
pub mod models;
pub mod ports;
pub mod validation;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use ports::*;
pub use validation::ValidationErrors;
