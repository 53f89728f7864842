//! Token authentication and login.
//!
//! A bearer token is hashed once, looked up by digest within the
//! `authentication` scope and only while unexpired. No match is not an error:
//! the request simply continues as [`Identity::Anonymous`].

use std::sync::Arc;

use chrono::{Duration, Utc};
use domains::{
    models::{validate_email, validate_password_plaintext, validate_token_plaintext},
    DomainError, Identity, IssuedToken, PasswordHasher, PermissionRepository, Permissions,
    TokenCodec, TokenRepository, TokenScope, UserRepository, ValidationErrors,
};

use crate::tokens;

/// How long a login token stays valid.
pub const AUTHENTICATION_TOKEN_TTL: Duration = Duration::hours(24);

/// Resolves credentials to identities and mints login tokens.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenRepository>,
    permissions: Arc<dyn PermissionRepository>,
    hasher: Arc<dyn PasswordHasher>,
    codec: Arc<dyn TokenCodec>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn TokenRepository>,
        permissions: Arc<dyn PermissionRepository>,
        hasher: Arc<dyn PasswordHasher>,
        codec: Arc<dyn TokenCodec>,
    ) -> Self {
        Self {
            users,
            tokens,
            permissions,
            hasher,
            codec,
        }
    }

    /// Resolves the raw `Authorization` header value.
    ///
    /// # Returns
    /// - `Ok(Identity::Anonymous)` - no header, or no live token matches
    /// - `Ok(Identity::User(_))` - the token's owner, as stored right now
    /// - `Err(InvalidAuthenticationToken)` - the header is not `Bearer <token>`
    ///   or the token has the wrong shape
    /// - `Err(Storage(_))` - the lookup failed
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<Identity, DomainError> {
        let Some(header) = authorization else {
            return Ok(Identity::Anonymous);
        };

        let plaintext = parse_bearer(header)?;

        let mut v = ValidationErrors::new();
        validate_token_plaintext(&mut v, plaintext);
        if !v.is_valid() {
            return Err(DomainError::InvalidAuthenticationToken);
        }

        let hash = self.codec.digest(plaintext);
        let user = self
            .users
            .get_for_token(TokenScope::Authentication, &hash, Utc::now())
            .await?;

        Ok(user.map(Identity::User).unwrap_or_default())
    }

    /// Exchanges an email/password pair for a 24h authentication token.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn create_authentication_token(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IssuedToken, DomainError> {
        let mut v = ValidationErrors::new();
        validate_email(&mut v, email);
        validate_password_plaintext(&mut v, "password", password);
        v.into_result()?;

        let Some(user) = self.users.get_by_email(email).await? else {
            return Err(DomainError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            return Err(DomainError::InvalidCredentials);
        }

        let issued = tokens::issue(
            self.codec.as_ref(),
            user.id,
            AUTHENTICATION_TOKEN_TTL,
            TokenScope::Authentication,
        );
        self.tokens.insert(&issued.token).await?;

        tracing::info!(user_id = user.id, "authentication token issued");
        Ok(issued)
    }

    pub async fn permissions_for(&self, user_id: i64) -> Result<Permissions, DomainError> {
        self.permissions.get_all_for_user(user_id).await
    }
}

/// Splits `Bearer <token>`; anything else is a malformed header.
pub fn parse_bearer(header: &str) -> Result<&str, DomainError> {
    match header.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() && !token.contains(' ') => Ok(token),
        _ => Err(DomainError::InvalidAuthenticationToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{
        MockPasswordHasher, MockPermissionRepository, MockTokenCodec, MockTokenRepository,
        MockUserRepository, User,
    };

    const TOKEN: &str = "abcdefghijklmnopqrstuv";

    fn user(activated: bool) -> User {
        User {
            id: 42,
            created_at: Utc::now(),
            username: "alice".into(),
            email: "a@x.com".into(),
            password_hash: "$argon2id$stub".into(),
            activated,
            version: 1,
        }
    }

    fn codec() -> MockTokenCodec {
        let mut codec = MockTokenCodec::new();
        codec.expect_digest().returning(|_| b"digest".to_vec());
        codec
            .expect_generate()
            .returning(|| "ZZZZZZZZZZZZZZZZZZZZZZ".to_string());
        codec
    }

    fn service(
        users: MockUserRepository,
        tokens: MockTokenRepository,
        hasher: MockPasswordHasher,
    ) -> AuthService {
        AuthService::new(
            Arc::new(users),
            Arc::new(tokens),
            Arc::new(MockPermissionRepository::new()),
            Arc::new(hasher),
            Arc::new(codec()),
        )
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(parse_bearer("Bearer abc").unwrap(), "abc");
        assert!(parse_bearer("Basic abc").is_err());
        assert!(parse_bearer("Bearer").is_err());
        assert!(parse_bearer("Bearer ").is_err());
        assert!(parse_bearer("Bearer a b").is_err());
    }

    #[tokio::test]
    async fn missing_header_is_anonymous_without_lookup() {
        let auth = service(
            MockUserRepository::new(),
            MockTokenRepository::new(),
            MockPasswordHasher::new(),
        );
        assert_eq!(auth.authenticate(None).await.unwrap(), Identity::Anonymous);
    }

    #[tokio::test]
    async fn malformed_header_is_a_client_error() {
        let auth = service(
            MockUserRepository::new(),
            MockTokenRepository::new(),
            MockPasswordHasher::new(),
        );
        assert_eq!(
            auth.authenticate(Some("Token abc")).await.unwrap_err(),
            DomainError::InvalidAuthenticationToken
        );
        assert_eq!(
            auth.authenticate(Some("Bearer short")).await.unwrap_err(),
            DomainError::InvalidAuthenticationToken
        );
    }

    #[tokio::test]
    async fn unmatched_token_is_anonymous() {
        let mut users = MockUserRepository::new();
        users
            .expect_get_for_token()
            .withf(|scope, hash, _| {
                *scope == TokenScope::Authentication && hash == b"digest".as_slice()
            })
            .times(1)
            .returning(|_, _, _| Ok(None));

        let auth = service(users, MockTokenRepository::new(), MockPasswordHasher::new());
        let header = format!("Bearer {TOKEN}");
        assert_eq!(
            auth.authenticate(Some(&header)).await.unwrap(),
            Identity::Anonymous
        );
    }

    #[tokio::test]
    async fn matched_token_resolves_user() {
        let mut users = MockUserRepository::new();
        users
            .expect_get_for_token()
            .returning(|_, _, _| Ok(Some(user(true))));

        let auth = service(users, MockTokenRepository::new(), MockPasswordHasher::new());
        let header = format!("Bearer {TOKEN}");
        let identity = auth.authenticate(Some(&header)).await.unwrap();
        assert_eq!(identity.user().map(|u| u.id), Some(42));
    }

    #[tokio::test]
    async fn storage_failure_propagates() {
        let mut users = MockUserRepository::new();
        users
            .expect_get_for_token()
            .returning(|_, _, _| Err(DomainError::Storage("connection reset".into())));

        let auth = service(users, MockTokenRepository::new(), MockPasswordHasher::new());
        let header = format!("Bearer {TOKEN}");
        assert!(matches!(
            auth.authenticate(Some(&header)).await,
            Err(DomainError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let mut users = MockUserRepository::new();
        users
            .expect_get_by_email()
            .returning(|_| Ok(Some(user(true))));
        let mut hasher = MockPasswordHasher::new();
        hasher.expect_verify().returning(|_, _| Ok(false));

        let auth = service(users, MockTokenRepository::new(), hasher);
        assert_eq!(
            auth.create_authentication_token("a@x.com", "wrongpass1")
                .await
                .unwrap_err(),
            DomainError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn unknown_email_is_invalid_credentials() {
        let mut users = MockUserRepository::new();
        users.expect_get_by_email().returning(|_| Ok(None));

        let auth = service(users, MockTokenRepository::new(), MockPasswordHasher::new());
        assert_eq!(
            auth.create_authentication_token("b@x.com", "secret123")
                .await
                .unwrap_err(),
            DomainError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn login_stores_only_the_digest() {
        let mut users = MockUserRepository::new();
        users
            .expect_get_by_email()
            .returning(|_| Ok(Some(user(true))));
        let mut hasher = MockPasswordHasher::new();
        hasher.expect_verify().returning(|_, _| Ok(true));
        let mut tokens = MockTokenRepository::new();
        tokens
            .expect_insert()
            .withf(|token| {
                token.hash == b"digest".to_vec()
                    && token.user_id == 42
                    && token.scope == TokenScope::Authentication
                    && token.expiry > Utc::now() + Duration::hours(23)
            })
            .times(1)
            .returning(|_| Ok(()));

        let auth = service(users, tokens, hasher);
        let issued = auth
            .create_authentication_token("a@x.com", "secret123")
            .await
            .unwrap();
        assert_eq!(issued.plaintext, "ZZZZZZZZZZZZZZZZZZZZZZ");
    }

    #[tokio::test]
    async fn login_validates_input_first() {
        let auth = service(
            MockUserRepository::new(),
            MockTokenRepository::new(),
            MockPasswordHasher::new(),
        );
        let err = auth.create_authentication_token("", "").await.unwrap_err();
        let DomainError::Validation(v) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(v.get("email"), Some("must be provided"));
        assert_eq!(v.get("password"), Some("must be provided"));
    }
}
