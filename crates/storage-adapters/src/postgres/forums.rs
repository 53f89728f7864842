use async_trait::async_trait;
use domains::{error::Result, DomainError, Filters, Forum, ForumRepository, NewForum};
use sqlx::{postgres::PgRow, Row};

use super::{classify, PgStore};

fn forum_from_row(row: &PgRow) -> std::result::Result<Forum, sqlx::Error> {
    Ok(Forum {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        topic: row.try_get("topic")?,
        discussion: row.try_get("discussion")?,
        comments: row.try_get("comments")?,
        version: row.try_get("version")?,
    })
}

#[async_trait]
impl ForumRepository for PgStore {
    async fn insert(&self, owner_id: i64, forum: &NewForum) -> Result<Forum> {
        self.with_deadline(async {
            let row = sqlx::query(
                r#"
                INSERT INTO forums (user_id, topic, discussion)
                VALUES ($1, $2, $3)
                RETURNING id, user_id, created_at, topic, discussion, comments, version
                "#,
            )
            .bind(owner_id)
            .bind(&forum.topic)
            .bind(&forum.discussion)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

            forum_from_row(&row).map_err(classify)
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Forum> {
        self.with_deadline(async {
            let row = sqlx::query(
                r#"
                SELECT id, user_id, created_at, topic, discussion, comments, version
                FROM forums
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?
            .ok_or(DomainError::NotFound)?;

            forum_from_row(&row).map_err(classify)
        })
        .await
    }

    async fn update(&self, forum: &Forum) -> Result<i32> {
        self.with_deadline(async {
            // Zero rows means the version moved on or the row is gone.
            sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE forums
                SET topic = $1, discussion = $2, comments = $3, version = version + 1
                WHERE id = $4 AND version = $5
                RETURNING version
                "#,
            )
            .bind(&forum.topic)
            .bind(&forum.discussion)
            .bind(&forum.comments)
            .bind(forum.id)
            .bind(forum.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?
            .ok_or(DomainError::EditConflict)
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.with_deadline(async {
            let result = sqlx::query("DELETE FROM forums WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(classify)?;

            if result.rows_affected() == 0 {
                return Err(DomainError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn list(&self, search: &str, filters: &Filters) -> Result<(Vec<Forum>, i64)> {
        // Both pieces come from the static safelist, never from the request.
        let column = filters.sort_column()?;
        let direction = filters.sort_direction().as_sql();

        let sql = format!(
            r#"
            SELECT count(*) OVER() AS total_records,
                   id, user_id, created_at, topic, discussion, comments, version
            FROM forums
            WHERE to_tsvector('simple', topic) @@ plainto_tsquery('simple', $1) OR $1 = ''
            ORDER BY {column} {direction}, id ASC
            LIMIT $2 OFFSET $3
            "#
        );

        self.with_deadline(async {
            let rows = sqlx::query(&sql)
                .bind(search)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await
                .map_err(classify)?;

            let mut total = 0_i64;
            let mut forums = Vec::with_capacity(rows.len());
            for row in &rows {
                total = row.try_get("total_records").map_err(classify)?;
                forums.push(forum_from_row(row).map_err(classify)?);
            }
            Ok((forums, total))
        })
        .await
    }
}
