//! # seed
//!
//! Prepares a database for local use: applies migrations, creates (or
//! re-activates) an administrator account holding every forum permission,
//! and optionally fills the board with generated threads.
//!
//! ```text
//! SEED_ADMIN_EMAIL=admin@example.com SEED_ADMIN_PASSWORD=changeme123 \
//!     SEED_FORUMS=25 cargo run -p seed
//! ```
//!
//! Running it twice is harmless: an existing admin keeps its password.

use std::sync::Arc;

use anyhow::{bail, Context};
use auth_adapters::Argon2PasswordHasher;
use configs::Settings;
use domains::{
    ForumRepository, NewForum, NewUser, PasswordHasher, PermissionRepository, Registration,
    UserRepository, FORUMS_READ, FORUMS_WRITE, TOPIC_MAX_BYTES,
};
use fake::{
    faker::lorem::en::{Paragraph, Sentence},
    Fake,
};
use secrecy::ExposeSecret;
use storage_adapters::postgres::{self, PgStore, PoolSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let settings = Settings::load().context("loading configuration")?;
    let url = settings
        .database
        .url
        .as_ref()
        .map(|url| url.expose_secret().to_string())
        .unwrap_or_default();

    let pool = postgres::connect(&PoolSettings {
        url,
        max_open_conns: 2,
        max_idle_conns: 0,
        max_idle_time: settings.database.max_idle_time,
    })
    .await
    .context("connecting to postgres")?;
    postgres::migrate(&pool).await.context("running migrations")?;

    let store = Arc::new(PgStore::new(pool.clone(), settings.database.query_timeout()));

    let registration = Registration {
        username: env_or("SEED_ADMIN_USERNAME", "admin"),
        email: env_or("SEED_ADMIN_EMAIL", "admin@example.com"),
        password: std::env::var("SEED_ADMIN_PASSWORD")
            .context("SEED_ADMIN_PASSWORD must be set")?,
    };
    let errors = registration.validate();
    if !errors.is_valid() {
        bail!("invalid admin account: {errors:?}");
    }

    let admin_id = ensure_admin(store.as_ref(), &registration).await?;

    let forums: usize = env_or("SEED_FORUMS", "0")
        .parse()
        .context("SEED_FORUMS must be a non-negative integer")?;
    for _ in 0..forums {
        let forum = NewForum {
            topic: fake_topic(),
            discussion: Paragraph(2..5).fake(),
        };
        ForumRepository::insert(store.as_ref(), admin_id, &forum).await?;
    }
    if forums > 0 {
        tracing::info!(count = forums, "generated forum threads");
    }

    pool.close().await;
    Ok(())
}

async fn ensure_admin(store: &PgStore, registration: &Registration) -> anyhow::Result<i64> {
    let mut admin = match store.get_by_email(&registration.email).await? {
        Some(existing) => {
            tracing::info!(user_id = existing.id, "admin account already exists");
            existing
        }
        None => {
            let password_hash = Argon2PasswordHasher::new()
                .hash(&registration.password)
                .await?;
            let created = UserRepository::insert(
                store,
                &NewUser {
                    username: registration.username.clone(),
                    email: registration.email.clone(),
                    password_hash,
                },
            )
            .await?;
            tracing::info!(user_id = created.id, "admin account created");
            created
        }
    };

    if !admin.activated {
        admin.activated = true;
        admin.version = UserRepository::update(store, &admin).await?;
    }

    store
        .add_for_user(admin.id, &[FORUMS_READ.to_string(), FORUMS_WRITE.to_string()])
        .await?;
    Ok(admin.id)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// A lorem sentence cut back to fit the topic column.
fn fake_topic() -> String {
    let mut topic: String = Sentence(3..8).fake();
    while topic.len() > TOPIC_MAX_BYTES {
        topic.pop();
    }
    topic
}
