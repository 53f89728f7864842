//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be wired into the binary.
//! Every method returns a classified [`DomainError`](crate::DomainError);
//! raw driver errors never cross this boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    Enrollment, Filters, Forum, Mail, NewForum, NewUser, Permissions, Token, TokenScope, User,
};

/// Persistence contract for forum threads.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ForumRepository: Send + Sync {
    /// Stores a thread and returns it with storage-assigned id, timestamp and `version = 1`.
    async fn insert(&self, owner_id: i64, forum: &NewForum) -> Result<Forum>;

    /// `NotFound` when no row matches.
    async fn get(&self, id: i64) -> Result<Forum>;

    /// Conditional write keyed on `(id, version)`. Returns the new version,
    /// or `EditConflict` when zero rows matched.
    async fn update(&self, forum: &Forum) -> Result<i32>;

    /// Physical delete. `NotFound` when zero rows were affected.
    async fn delete(&self, id: i64) -> Result<()>;

    /// One page of matches plus the total match count from the same query.
    async fn list(&self, search: &str, filters: &Filters) -> Result<(Vec<Forum>, i64)>;
}

/// Persistence contract for accounts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Duplicate email or username surfaces as a field-level `Validation` error.
    async fn insert(&self, user: &NewUser) -> Result<User>;

    /// Stores the account together with its grants and activation token.
    /// Either all three persist or none do; duplicates fail like `insert`.
    async fn enroll(&self, enrollment: &Enrollment) -> Result<User>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Conditional write keyed on `(id, version)`; `EditConflict` on mismatch.
    async fn update(&self, user: &User) -> Result<i32>;

    /// The owner of an unexpired token with this digest and scope, if any.
    async fn get_for_token(
        &self,
        scope: TokenScope,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<User>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn insert(&self, token: &Token) -> Result<()>;

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<()>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions>;

    /// Grants the listed codes; codes unknown to the catalogue are ignored.
    async fn add_for_user(&self, user_id: i64, codes: &[String]) -> Result<()>;
}

/// Slow, salted password hashing.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, plaintext: &str) -> Result<String>;

    async fn verify(&self, plaintext: &str, hash: &str) -> Result<bool>;
}

/// Opaque token minting and the deterministic digest used for lookups.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenCodec: Send + Sync {
    fn generate(&self) -> String;

    fn digest(&self, plaintext: &str) -> Vec<u8>;
}

/// Out-of-band delivery.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, mail: &Mail) -> Result<()>;
}
