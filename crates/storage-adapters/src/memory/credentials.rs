//! Users, tokens and permission grants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    error::Result, DomainError, Enrollment, NewUser, PermissionRepository, Permissions, Token,
    TokenRepository, TokenScope, User, UserRepository, ValidationErrors,
};

use super::InMemoryStore;

impl InMemoryStore {
    /// Rejects `email`/`username` already used by a user other than `except`.
    /// Email comparison is case-insensitive.
    fn check_user_keys(&self, email: &str, username: &str, except: Option<i64>) -> Result<()> {
        for entry in self.inner.users.iter() {
            if Some(entry.id) == except {
                continue;
            }
            if entry.email.eq_ignore_ascii_case(email) {
                return Err(ValidationErrors::single(
                    "email",
                    "a user with this email address already exists",
                )
                .into());
            }
            if entry.username == username {
                return Err(ValidationErrors::single(
                    "username",
                    "a user with this username already exists",
                )
                .into());
            }
        }
        Ok(())
    }

    /// Caller holds `user_keys` and has checked uniqueness.
    fn store_user(&self, user: &NewUser) -> User {
        let created = User {
            id: self.next_user_id(),
            created_at: Utc::now(),
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            activated: false,
            version: 1,
        };
        self.inner.users.insert(created.id, created.clone());
        created
    }

    fn grant(&self, user_id: i64, codes: &[String]) {
        let mut granted = self.inner.grants.entry(user_id).or_default();
        granted.extend(
            codes
                .iter()
                .filter(|code| self.inner.catalogue.contains(*code))
                .cloned(),
        );
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert(&self, user: &NewUser) -> Result<User> {
        let _keys = self
            .inner
            .user_keys
            .lock()
            .map_err(|_| DomainError::Internal("user index lock poisoned".into()))?;
        self.check_user_keys(&user.email, &user.username, None)?;
        Ok(self.store_user(user))
    }

    async fn enroll(&self, enrollment: &Enrollment) -> Result<User> {
        let _keys = self
            .inner
            .user_keys
            .lock()
            .map_err(|_| DomainError::Internal("user index lock poisoned".into()))?;
        self.check_user_keys(&enrollment.user.email, &enrollment.user.username, None)?;
        if self.inner.tokens.contains_key(&enrollment.activation_hash) {
            return Err(DomainError::Storage("duplicate token hash".into()));
        }

        let created = self.store_user(&enrollment.user);
        self.grant(created.id, &enrollment.permissions);
        self.inner.tokens.insert(
            enrollment.activation_hash.clone(),
            Token {
                hash: enrollment.activation_hash.clone(),
                user_id: created.id,
                expiry: enrollment.activation_expiry,
                scope: TokenScope::Activation,
            },
        );
        Ok(created)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .users
            .iter()
            .find(|entry| entry.email.eq_ignore_ascii_case(email))
            .map(|entry| entry.value().clone()))
    }

    async fn update(&self, user: &User) -> Result<i32> {
        let _keys = self
            .inner
            .user_keys
            .lock()
            .map_err(|_| DomainError::Internal("user index lock poisoned".into()))?;
        self.check_user_keys(&user.email, &user.username, Some(user.id))?;

        let mut stored = self
            .inner
            .users
            .get_mut(&user.id)
            .ok_or(DomainError::EditConflict)?;
        if stored.version != user.version {
            return Err(DomainError::EditConflict);
        }

        stored.username = user.username.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.activated = user.activated;
        stored.version += 1;
        Ok(stored.version)
    }

    async fn get_for_token(
        &self,
        scope: TokenScope,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let user_id = match self.inner.tokens.get(token_hash) {
            Some(token) if token.scope == scope && !token.is_expired_at(now) => token.user_id,
            _ => return Ok(None),
        };
        Ok(self
            .inner
            .users
            .get(&user_id)
            .map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl TokenRepository for InMemoryStore {
    async fn insert(&self, token: &Token) -> Result<()> {
        if !self.inner.users.contains_key(&token.user_id) {
            return Err(DomainError::Storage(format!(
                "token references unknown user {}",
                token.user_id
            )));
        }
        self.inner.tokens.insert(token.hash.clone(), token.clone());
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<()> {
        self.inner
            .tokens
            .retain(|_, token| !(token.scope == scope && token.user_id == user_id));
        Ok(())
    }
}

#[async_trait]
impl PermissionRepository for InMemoryStore {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions> {
        Ok(self
            .inner
            .grants
            .get(&user_id)
            .map(|codes| codes.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_for_user(&self, user_id: i64, codes: &[String]) -> Result<()> {
        self.grant(user_id, codes);
        Ok(())
    }
}
