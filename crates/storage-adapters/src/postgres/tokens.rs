use async_trait::async_trait;
use domains::{error::Result, Token, TokenRepository, TokenScope};

use super::{classify, PgStore};

#[async_trait]
impl TokenRepository for PgStore {
    async fn insert(&self, token: &Token) -> Result<()> {
        self.with_deadline(async {
            sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)")
                .bind(&token.hash)
                .bind(token.user_id)
                .bind(token.expiry)
                .bind(token.scope.as_str())
                .execute(&self.pool)
                .await
                .map_err(classify)?;
            Ok(())
        })
        .await
    }

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<()> {
        self.with_deadline(async {
            let result = sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(classify)?;
            tracing::debug!(
                user_id,
                scope = scope.as_str(),
                removed = result.rows_affected(),
                "tokens revoked"
            );
            Ok(())
        })
        .await
    }
}
