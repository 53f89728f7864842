use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::Utc;
use domains::{
    error::Result, DomainError, Filters, Forum, ForumRepository, NewForum, SortDirection,
};

use super::{matches_simple_text, InMemoryStore};

#[async_trait]
impl ForumRepository for InMemoryStore {
    async fn insert(&self, owner_id: i64, forum: &NewForum) -> Result<Forum> {
        let created = Forum {
            id: self.next_forum_id(),
            user_id: owner_id,
            created_at: Utc::now(),
            topic: forum.topic.clone(),
            discussion: forum.discussion.clone(),
            comments: Vec::new(),
            version: 1,
        };
        self.inner.forums.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Forum> {
        self.inner
            .forums
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(DomainError::NotFound)
    }

    async fn update(&self, forum: &Forum) -> Result<i32> {
        // The shard write lock makes the version compare and the write one step.
        let mut stored = self
            .inner
            .forums
            .get_mut(&forum.id)
            .ok_or(DomainError::EditConflict)?;
        if stored.version != forum.version {
            return Err(DomainError::EditConflict);
        }

        stored.topic = forum.topic.clone();
        stored.discussion = forum.discussion.clone();
        stored.comments = forum.comments.clone();
        stored.version += 1;
        Ok(stored.version)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.inner
            .forums
            .remove(&id)
            .map(|_| ())
            .ok_or(DomainError::NotFound)
    }

    async fn list(&self, search: &str, filters: &Filters) -> Result<(Vec<Forum>, i64)> {
        let column = filters.sort_column()?;
        let direction = filters.sort_direction();

        let mut matched: Vec<Forum> = self
            .inner
            .forums
            .iter()
            .filter(|entry| matches_simple_text(&entry.topic, search))
            .map(|entry| entry.value().clone())
            .collect();

        matched.sort_by(|a, b| {
            let primary = match column {
                "topic" => a.topic.cmp(&b.topic),
                "created_at" => a.created_at.cmp(&b.created_at),
                _ => a.id.cmp(&b.id),
            };
            let primary = match direction {
                SortDirection::Ascending => primary,
                SortDirection::Descending => primary.reverse(),
            };
            match primary {
                Ordering::Equal => a.id.cmp(&b.id),
                other => other,
            }
        });

        // The total is only known alongside a non-empty page, as with a
        // window count in SQL.
        let total = matched.len() as i64;
        let page: Vec<Forum> = matched
            .into_iter()
            .skip(filters.offset().max(0) as usize)
            .take(filters.limit().max(0) as usize)
            .collect();
        let total = if page.is_empty() { 0 } else { total };
        Ok((page, total))
    }
}
