//! # DomainError
//!
//! The closed set of failure kinds every layer of the forum API speaks.
//! Adapters classify their native errors into one of these before returning,
//! and the HTTP layer maps each variant to exactly one response shape.

use thiserror::Error;

use crate::validation::ValidationErrors;

/// The primary error type for all domain operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// One or more fields failed validation (including unique-key clashes).
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The record does not exist, or the id could never identify one.
    #[error("record not found")]
    NotFound,

    /// A version-checked write matched no row. The caller's view is stale;
    /// retry the whole read-modify-write cycle.
    #[error("edit conflict")]
    EditConflict,

    /// Login attempt with an unknown email or a wrong password.
    #[error("invalid authentication credentials")]
    InvalidCredentials,

    /// The Authorization header was present but malformed.
    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,

    /// The resource requires an authenticated identity.
    #[error("authentication required")]
    AuthenticationRequired,

    /// Authenticated, but the account has not been activated yet.
    #[error("user account is not activated")]
    InactiveAccount,

    /// Authenticated and activated, but missing the named permission.
    #[error("missing permission {0}")]
    NotPermitted(String),

    /// Per-client admission budget exhausted.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The storage engine failed, was unreachable, or missed its deadline.
    #[error("storage error: {0}")]
    Storage(String),

    /// Anything else that indicates a bug or a broken collaborator.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for DomainError {
    fn from(errors: ValidationErrors) -> Self {
        DomainError::Validation(errors)
    }
}

/// A specialized Result type for forum domain logic.
pub type Result<T> = std::result::Result<T, DomainError>;
