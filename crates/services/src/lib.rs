//! Request-processing core of the forum API.
//!
//! - [`rate_limit`]: per-client token-bucket admission.
//! - [`auth`]: bearer-token authentication and login token issuing.
//! - [`authorization`]: the guards that gate handlers.
//! - [`forums`]: the optimistic-concurrency resource model.
//! - [`users`]: registration, activation and password changes.
//!
//! Everything here talks to storage only through the ports in `domains`.

pub mod auth;
pub mod authorization;
pub mod forums;
pub mod rate_limit;
mod tokens;
pub mod users;

pub use auth::AuthService;
pub use forums::ForumService;
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use users::UserService;
