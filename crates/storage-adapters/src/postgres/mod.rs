//! # Postgres storage
//!
//! Repository implementations on a shared `sqlx` pool. Rows are mapped by
//! hand with `try_get` so a schema drift fails loudly instead of defaulting.
//!
//! Every statement runs under a per-query deadline; an elapsed deadline is
//! reported as `DomainError::Storage` like any other driver failure.

mod forums;
mod permissions;
mod tokens;
mod users;

use std::future::Future;
use std::time::Duration;

use domains::{error::Result, DomainError, ValidationErrors};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Pool sizing as read from configuration.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_open_conns: u32,
    /// Connections kept warm even when idle.
    pub max_idle_conns: u32,
    pub max_idle_time: Duration,
}

/// Opens the pool and proves it with one round trip.
pub async fn connect(settings: &PoolSettings) -> std::result::Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_open_conns)
        .min_connections(settings.max_idle_conns.min(settings.max_open_conns))
        .idle_timeout(Some(settings.max_idle_time))
        .acquire_timeout(Duration::from_secs(5))
        .connect(&settings.url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    tracing::info!(max_open = settings.max_open_conns, "database connection pool established");
    Ok(pool)
}

/// Applies the embedded migrations under `migrations/`.
pub async fn migrate(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("database migrations checked/applied");
    Ok(())
}

/// Implements every repository port on Postgres.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Bounds `query` by the configured deadline.
    async fn with_deadline<T, F>(&self, query: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?self.query_timeout, "query deadline exceeded");
                Err(DomainError::Storage("query deadline exceeded".into()))
            }
        }
    }
}

/// Driver failures collapse to `Storage`; the message is for logs only.
fn classify(err: sqlx::Error) -> DomainError {
    DomainError::Storage(err.to_string())
}

/// Maps the users table's unique keys to field errors.
fn classify_user_write(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some("users_email_key") => {
                    return ValidationErrors::single(
                        "email",
                        "a user with this email address already exists",
                    )
                    .into()
                }
                Some("users_username_key") => {
                    return ValidationErrors::single(
                        "username",
                        "a user with this username already exists",
                    )
                    .into()
                }
                _ => {}
            }
        }
    }
    classify(err)
}
