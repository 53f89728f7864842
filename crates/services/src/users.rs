//! Account lifecycle: registration, activation and password changes.

use std::sync::Arc;

use chrono::{Duration, Utc};
use domains::{
    models::{validate_password_plaintext, validate_token_plaintext},
    DomainError, Enrollment, Mail, Mailer, NewUser, PasswordHasher, Registration, TokenCodec,
    TokenRepository, TokenScope, User, UserRepository, ValidationErrors,
};
use tokio_util::task::TaskTracker;

/// How long a freshly registered user has to activate.
pub const ACTIVATION_TOKEN_TTL: Duration = Duration::days(3);

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenRepository>,
    hasher: Arc<dyn PasswordHasher>,
    codec: Arc<dyn TokenCodec>,
    mailer: Arc<dyn Mailer>,
    default_permissions: Vec<String>,
    mail_tasks: TaskTracker,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn TokenRepository>,
        hasher: Arc<dyn PasswordHasher>,
        codec: Arc<dyn TokenCodec>,
        mailer: Arc<dyn Mailer>,
        default_permissions: Vec<String>,
    ) -> Self {
        Self {
            users,
            tokens,
            hasher,
            codec,
            mailer,
            default_permissions,
            mail_tasks: TaskTracker::new(),
        }
    }

    /// Tracker for mail deliveries still in flight.
    ///
    /// Close and wait on it during shutdown so no welcome mail is cut off.
    pub fn background_tasks(&self) -> TaskTracker {
        self.mail_tasks.clone()
    }

    /// Creates an inactive account, grants the default permissions and
    /// queues the welcome mail carrying the activation token.
    ///
    /// The account, grants and token are stored as one unit, so a failed
    /// registration never leaves an account that cannot be activated.
    ///
    /// # Returns
    /// - `Ok(User)` - the stored account, `activated = false`
    /// - `Err(Validation)` - bad input, or the email/username is taken
    pub async fn register(&self, registration: Registration) -> Result<User, DomainError> {
        registration.validate().into_result()?;

        let password_hash = self.hasher.hash(&registration.password).await?;
        let activation_token = self.codec.generate();
        let user = self
            .users
            .enroll(&Enrollment {
                user: NewUser {
                    username: registration.username,
                    email: registration.email,
                    password_hash,
                },
                permissions: self.default_permissions.clone(),
                activation_hash: self.codec.digest(&activation_token),
                activation_expiry: Utc::now() + ACTIVATION_TOKEN_TTL,
            })
            .await?;

        let mail = Mail::Welcome {
            user_id: user.id,
            username: user.username.clone(),
            activation_token,
        };
        let mailer = Arc::clone(&self.mailer);
        let recipient = user.email.clone();
        self.mail_tasks.spawn(async move {
            if let Err(err) = mailer.send(&recipient, &mail).await {
                tracing::error!(error = %err, kind = mail.kind(), "failed to deliver mail");
            }
        });

        tracing::info!(user_id = user.id, "user registered");
        Ok(user)
    }

    /// Consumes an activation token and flips the account to activated.
    ///
    /// Every outstanding activation token of the user is removed afterwards.
    pub async fn activate(&self, plaintext: &str) -> Result<User, DomainError> {
        let mut v = ValidationErrors::new();
        validate_token_plaintext(&mut v, plaintext);
        v.into_result()?;

        let hash = self.codec.digest(plaintext);
        let Some(mut user) = self
            .users
            .get_for_token(TokenScope::Activation, &hash, Utc::now())
            .await?
        else {
            return Err(
                ValidationErrors::single("token", "invalid or expired activation token").into(),
            );
        };

        user.activated = true;
        user.version = self.users.update(&user).await?;

        self.tokens
            .delete_all_for_user(TokenScope::Activation, user.id)
            .await?;

        tracing::info!(user_id = user.id, "user activated");
        Ok(user)
    }

    /// Replaces the password after checking the current one, then revokes
    /// every authentication token the user holds.
    pub async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<User, DomainError> {
        let mut v = ValidationErrors::new();
        v.check(
            !current_password.is_empty(),
            "current_password",
            "must be provided",
        );
        validate_password_plaintext(&mut v, "new_password", new_password);
        v.into_result()?;

        if !self
            .hasher
            .verify(current_password, &user.password_hash)
            .await?
        {
            return Err(ValidationErrors::single("current_password", "is incorrect").into());
        }

        let mut updated = user.clone();
        updated.password_hash = self.hasher.hash(new_password).await?;
        updated.version = self.users.update(&updated).await?;

        self.tokens
            .delete_all_for_user(TokenScope::Authentication, user.id)
            .await?;

        tracing::info!(user_id = user.id, "password changed");
        Ok(updated)
    }
}
