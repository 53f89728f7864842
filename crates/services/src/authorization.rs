//! Guards that gate handlers on the request's identity.
//!
//! Each guard either hands back the user it vouched for or the one error
//! kind that explains the refusal. Guards compose outward:
//! `require_authenticated` → `require_activated` → `require_permission`.

use domains::{DomainError, Identity, Permissions, User};

/// Rejects anonymous identities.
pub fn require_authenticated(identity: &Identity) -> Result<&User, DomainError> {
    identity.user().ok_or(DomainError::AuthenticationRequired)
}

/// Rejects anonymous and not-yet-activated identities.
///
/// Reads the `activated` flag from the user resolved for this request, so an
/// activation performed by another request is seen on the next one.
pub fn require_activated(identity: &Identity) -> Result<&User, DomainError> {
    let user = require_authenticated(identity)?;
    if !user.activated {
        return Err(DomainError::InactiveAccount);
    }
    Ok(user)
}

pub fn require_permission(permissions: &Permissions, code: &str) -> Result<(), DomainError> {
    if permissions.includes(code) {
        Ok(())
    } else {
        Err(DomainError::NotPermitted(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(activated: bool) -> User {
        User {
            id: 1,
            created_at: Utc::now(),
            username: "alice".into(),
            email: "a@x.com".into(),
            password_hash: "$argon2id$stub".into(),
            activated,
            version: 1,
        }
    }

    #[test]
    fn anonymous_is_unauthenticated() {
        assert_eq!(
            require_authenticated(&Identity::Anonymous).unwrap_err(),
            DomainError::AuthenticationRequired
        );
        assert_eq!(
            require_activated(&Identity::Anonymous).unwrap_err(),
            DomainError::AuthenticationRequired
        );
    }

    #[test]
    fn inactive_user_is_forbidden_not_unauthenticated() {
        let identity = Identity::User(user(false));
        assert!(require_authenticated(&identity).is_ok());
        assert_eq!(
            require_activated(&identity).unwrap_err(),
            DomainError::InactiveAccount
        );
    }

    #[test]
    fn activated_user_passes() {
        let identity = Identity::User(user(true));
        assert_eq!(require_activated(&identity).unwrap().id, 1);
    }

    #[test]
    fn permission_check() {
        let perms: Permissions = ["forums:read"].into_iter().collect();
        assert!(require_permission(&perms, "forums:read").is_ok());
        assert_eq!(
            require_permission(&perms, "forums:write").unwrap_err(),
            DomainError::NotPermitted("forums:write".into())
        );
    }
}
