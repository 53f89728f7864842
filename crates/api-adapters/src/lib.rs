//! # api-adapters
//!
//! The HTTP surface of the forum API.
//!
//! # Developer Note
//! Everything that touches axum sits behind the `web-axum` feature. The mail
//! renderer and the JSON mapping are transport-agnostic and always compiled.

pub mod dto;
pub mod mail;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod metrics;
#[cfg(feature = "web-axum")]
pub mod pipeline;
#[cfg(feature = "web-axum")]
pub mod router;
#[cfg(feature = "web-axum")]
pub mod stages;
#[cfg(feature = "web-axum")]
pub mod state;

pub use mail::LogMailer;

#[cfg(feature = "web-axum")]
pub use error::ApiError;
#[cfg(feature = "web-axum")]
pub use router::{build_router, RouterOptions};
#[cfg(feature = "web-axum")]
pub use state::AppState;
