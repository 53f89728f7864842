use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::validation::{matches_email, ValidationErrors};

pub const USERNAME_MAX_BYTES: usize = 500;
pub const PASSWORD_MIN_BYTES: usize = 8;
pub const PASSWORD_MAX_BYTES: usize = 72;

/// A registered account.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub email: String,
    /// PHC-formatted hash; the plaintext never leaves the request that carried it.
    pub password_hash: String,
    pub activated: bool,
    pub version: i32,
}

/// A user as it is handed to storage at registration time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Everything a registration writes: the account, its initial grants and
/// its activation token. The token's owner id is assigned on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub user: NewUser,
    pub permissions: Vec<String>,
    pub activation_hash: Vec<u8>,
    pub activation_expiry: DateTime<Utc>,
}

/// Registration input before the password is hashed.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    pub fn validate(&self) -> ValidationErrors {
        let mut v = ValidationErrors::new();
        v.check(!self.username.is_empty(), "username", "must be provided");
        v.check(
            self.username.len() <= USERNAME_MAX_BYTES,
            "username",
            "must not be more than 500 bytes long",
        );
        validate_email(&mut v, &self.email);
        validate_password_plaintext(&mut v, "password", &self.password);
        v
    }
}

pub fn validate_email(v: &mut ValidationErrors, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(matches_email(email), "email", "must be a valid email address");
}

pub fn validate_password_plaintext(v: &mut ValidationErrors, field: &str, password: &str) {
    v.check(!password.is_empty(), field, "must be provided");
    v.check(
        password.len() >= PASSWORD_MIN_BYTES,
        field,
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= PASSWORD_MAX_BYTES,
        field,
        "must not be more than 72 bytes long",
    );
}

/// Who is behind the current request.
///
/// Transitions only ever move forward within a request:
/// `Anonymous -> User(activated = false) -> User(activated = true)` is decided
/// once by the authenticator and never re-evaluated.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    User(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::User(user) => Some(user),
        }
    }
}

pub const FORUMS_READ: &str = "forums:read";
pub const FORUMS_WRITE: &str = "forums:write";

/// Capability codes granted to one user, e.g. `forums:write`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(BTreeSet<String>);

impl Permissions {
    pub fn includes(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(username: &str, email: &str, password: &str) -> Registration {
        Registration {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn accepts_valid_registration() {
        assert!(registration("alice", "a@x.com", "secret123")
            .validate()
            .is_valid());
    }

    #[test]
    fn rejects_short_password_and_bad_email() {
        let v = registration("alice", "nope", "short").validate();
        assert_eq!(v.get("email"), Some("must be a valid email address"));
        assert_eq!(v.get("password"), Some("must be at least 8 bytes long"));
    }

    #[test]
    fn permissions_lookup() {
        let perms: Permissions = [FORUMS_READ].into_iter().collect();
        assert!(perms.includes(FORUMS_READ));
        assert!(!perms.includes(FORUMS_WRITE));
    }
}
