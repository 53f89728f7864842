use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    error::Result, DomainError, Enrollment, NewUser, TokenScope, User, UserRepository,
};
use sqlx::{postgres::PgRow, Row};

use super::{classify, classify_user_write, PgStore};

fn user_from_row(row: &PgRow) -> std::result::Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        created_at: row.try_get("created_at")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        activated: row.try_get("activated")?,
        version: row.try_get("version")?,
    })
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert(&self, user: &NewUser) -> Result<User> {
        self.with_deadline(async {
            let row = sqlx::query(
                r#"
                INSERT INTO users (username, email, password_hash)
                VALUES ($1, $2, $3)
                RETURNING id, created_at, username, email, password_hash, activated, version
                "#,
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(classify_user_write)?;

            user_from_row(&row).map_err(classify)
        })
        .await
    }

    async fn enroll(&self, enrollment: &Enrollment) -> Result<User> {
        self.with_deadline(async {
            let mut tx = self.pool.begin().await.map_err(classify)?;

            let row = sqlx::query(
                r#"
                INSERT INTO users (username, email, password_hash)
                VALUES ($1, $2, $3)
                RETURNING id, created_at, username, email, password_hash, activated, version
                "#,
            )
            .bind(&enrollment.user.username)
            .bind(&enrollment.user.email)
            .bind(&enrollment.user.password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify_user_write)?;
            let user = user_from_row(&row).map_err(classify)?;

            sqlx::query(
                r#"
                INSERT INTO users_permissions
                SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
                "#,
            )
            .bind(user.id)
            .bind(&enrollment.permissions)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

            sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)")
                .bind(&enrollment.activation_hash)
                .bind(user.id)
                .bind(enrollment.activation_expiry)
                .bind(TokenScope::Activation.as_str())
                .execute(&mut *tx)
                .await
                .map_err(classify)?;

            tx.commit().await.map_err(classify)?;
            Ok(user)
        })
        .await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_deadline(async {
            let row = sqlx::query(
                r#"
                SELECT id, created_at, username, email, password_hash, activated, version
                FROM users
                WHERE lower(email) = lower($1)
                "#,
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

            row.as_ref()
                .map(user_from_row)
                .transpose()
                .map_err(classify)
        })
        .await
    }

    async fn update(&self, user: &User) -> Result<i32> {
        self.with_deadline(async {
            sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE users
                SET username = $1, email = $2, password_hash = $3, activated = $4,
                    version = version + 1
                WHERE id = $5 AND version = $6
                RETURNING version
                "#,
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify_user_write)?
            .ok_or(DomainError::EditConflict)
        })
        .await
    }

    async fn get_for_token(
        &self,
        scope: TokenScope,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        self.with_deadline(async {
            let row = sqlx::query(
                r#"
                SELECT users.id, users.created_at, users.username, users.email,
                       users.password_hash, users.activated, users.version
                FROM users
                INNER JOIN tokens ON users.id = tokens.user_id
                WHERE tokens.hash = $1
                  AND tokens.scope = $2
                  AND tokens.expiry > $3
                "#,
            )
            .bind(token_hash)
            .bind(scope.as_str())
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

            row.as_ref()
                .map(user_from_row)
                .transpose()
                .map_err(classify)
        })
        .await
    }
}
