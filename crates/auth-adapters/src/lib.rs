//! # auth-adapters
//!
//! Credential primitives behind the `PasswordHasher` and `TokenCodec` ports:
//! Argon2id for passwords, random opaque tokens with a SHA-256 lookup digest.

mod password;
mod token;

pub use password::Argon2PasswordHasher;
pub use token::OpaqueTokenCodec;
