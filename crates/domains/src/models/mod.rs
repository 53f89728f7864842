//! # Domain Models
//!
//! These structs represent the core entities of the forum API.
//! Identifiers are storage-assigned `i64` sequences; every mutable entity
//! carries a `version` used for optimistic concurrency.

pub mod filters;
pub mod forum;
pub mod mail;
pub mod token;
pub mod user;

pub use filters::*;
pub use forum::*;
pub use mail::*;
pub use token::*;
pub use user::*;
