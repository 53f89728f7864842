use async_trait::async_trait;
use domains::{error::Result, PermissionRepository, Permissions};

use super::{classify, PgStore};

#[async_trait]
impl PermissionRepository for PgStore {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions> {
        self.with_deadline(async {
            let codes: Vec<String> = sqlx::query_scalar(
                r#"
                SELECT permissions.code
                FROM permissions
                INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
                WHERE users_permissions.user_id = $1
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

            Ok(codes.into_iter().collect())
        })
        .await
    }

    async fn add_for_user(&self, user_id: i64, codes: &[String]) -> Result<()> {
        self.with_deadline(async {
            sqlx::query(
                r#"
                INSERT INTO users_permissions
                SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(codes)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
            Ok(())
        })
        .await
    }
}
