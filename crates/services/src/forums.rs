//! Forum threads under optimistic concurrency.
//!
//! Every mutation is a read-modify-write: fetch the current row, apply the
//! change in memory, validate, then write conditionally on the version that
//! was read. A stale version surfaces as `EditConflict` and nothing is
//! written; the caller decides whether to retry the whole cycle.

use std::sync::Arc;

use domains::{
    DomainError, Filters, Forum, ForumPatch, ForumRepository, Metadata, NewForum, User,
    ValidationErrors,
};

#[derive(Clone)]
pub struct ForumService {
    repo: Arc<dyn ForumRepository>,
}

impl ForumService {
    pub fn new(repo: Arc<dyn ForumRepository>) -> Self {
        Self { repo }
    }

    /// Creates a thread owned by `owner`.
    ///
    /// # Returns
    /// The stored thread with its id, `created_at` and `version = 1`.
    pub async fn insert(&self, owner: &User, forum: NewForum) -> Result<Forum, DomainError> {
        forum.validate().into_result()?;
        let created = self.repo.insert(owner.id, &forum).await?;
        tracing::info!(forum_id = created.id, user_id = owner.id, "forum created");
        Ok(created)
    }

    /// Ids below 1 can never exist and are answered without a lookup.
    pub async fn get(&self, id: i64) -> Result<Forum, DomainError> {
        if id < 1 {
            return Err(DomainError::NotFound);
        }
        self.repo.get(id).await
    }

    /// Writes `forum` conditionally on its current `version`.
    ///
    /// On success `forum.version` is advanced to the stored value. On
    /// `EditConflict` the record is left untouched and so is `forum`.
    pub async fn update(&self, forum: &mut Forum) -> Result<(), DomainError> {
        forum.validate().into_result()?;
        forum.version = self.repo.update(forum).await?;
        Ok(())
    }

    /// Applies a partial edit.
    ///
    /// When `expected_version` is given and differs from what is stored, the
    /// edit is refused with `EditConflict` before anything is written.
    pub async fn edit(
        &self,
        id: i64,
        patch: ForumPatch,
        expected_version: Option<i32>,
    ) -> Result<Forum, DomainError> {
        let mut forum = self.get(id).await?;
        check_expected_version(&forum, expected_version)?;

        forum.apply(patch);
        self.update(&mut forum).await?;

        tracing::info!(forum_id = forum.id, version = forum.version, "forum updated");
        Ok(forum)
    }

    /// Appends one comment through the same version-checked write.
    pub async fn add_comment(
        &self,
        id: i64,
        comment: String,
        expected_version: Option<i32>,
    ) -> Result<Forum, DomainError> {
        if comment.is_empty() {
            return Err(ValidationErrors::single("comment", "must be provided").into());
        }

        let mut forum = self.get(id).await?;
        check_expected_version(&forum, expected_version)?;

        forum.comments.push(comment);
        self.update(&mut forum).await?;
        Ok(forum)
    }

    pub async fn delete(&self, id: i64) -> Result<(), DomainError> {
        if id < 1 {
            return Err(DomainError::NotFound);
        }
        self.repo.delete(id).await?;
        tracing::info!(forum_id = id, "forum deleted");
        Ok(())
    }

    /// Full-text search over topics plus pagination.
    ///
    /// Filters are validated before storage is touched. An empty `search`
    /// matches every thread.
    pub async fn list(
        &self,
        search: &str,
        filters: &Filters,
    ) -> Result<(Vec<Forum>, Metadata), DomainError> {
        let mut v = ValidationErrors::new();
        filters.validate(&mut v);
        v.into_result()?;

        let (forums, total) = self.repo.list(search, filters).await?;
        let metadata = Metadata::calculate(total, filters.page, filters.page_size);
        Ok((forums, metadata))
    }
}

fn check_expected_version(forum: &Forum, expected: Option<i32>) -> Result<(), DomainError> {
    match expected {
        Some(version) if version != forum.version => Err(DomainError::EditConflict),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::MockForumRepository;

    fn owner() -> User {
        User {
            id: 7,
            created_at: Utc::now(),
            username: "alice".into(),
            email: "a@x.com".into(),
            password_hash: "$argon2id$stub".into(),
            activated: true,
            version: 1,
        }
    }

    fn stored(version: i32) -> Forum {
        Forum {
            id: 1,
            user_id: 7,
            created_at: Utc::now(),
            topic: "Rust".into(),
            discussion: "Ownership".into(),
            comments: vec![],
            version,
        }
    }

    fn service(repo: MockForumRepository) -> ForumService {
        ForumService::new(Arc::new(repo))
    }

    #[tokio::test]
    async fn invalid_forum_never_reaches_storage() {
        let mut repo = MockForumRepository::new();
        repo.expect_insert().never();

        let err = service(repo)
            .insert(
                &owner(),
                NewForum {
                    topic: String::new(),
                    discussion: "d".into(),
                },
            )
            .await
            .unwrap_err();
        let DomainError::Validation(v) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(v.get("topic"), Some("must be provided"));
    }

    #[tokio::test]
    async fn insert_records_owner() {
        let mut repo = MockForumRepository::new();
        repo.expect_insert()
            .withf(|owner_id, forum| *owner_id == 7 && forum.topic == "Rust")
            .times(1)
            .returning(|_, _| Ok(stored(1)));

        let forum = service(repo)
            .insert(
                &owner(),
                NewForum {
                    topic: "Rust".into(),
                    discussion: "Ownership".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(forum.version, 1);
        assert_eq!(forum.user_id, 7);
    }

    #[tokio::test]
    async fn non_positive_ids_short_circuit() {
        let mut repo = MockForumRepository::new();
        repo.expect_get().never();
        repo.expect_delete().never();
        let svc = service(repo);

        assert_eq!(svc.get(0).await.unwrap_err(), DomainError::NotFound);
        assert_eq!(svc.get(-3).await.unwrap_err(), DomainError::NotFound);
        assert_eq!(svc.delete(0).await.unwrap_err(), DomainError::NotFound);
    }

    #[tokio::test]
    async fn update_advances_version() {
        let mut repo = MockForumRepository::new();
        repo.expect_update()
            .withf(|forum| forum.version == 1)
            .returning(|_| Ok(2));

        let mut forum = stored(1);
        service(repo).update(&mut forum).await.unwrap();
        assert_eq!(forum.version, 2);
    }

    #[tokio::test]
    async fn conflicting_update_leaves_caller_copy_alone() {
        let mut repo = MockForumRepository::new();
        repo.expect_update()
            .returning(|_| Err(DomainError::EditConflict));

        let mut forum = stored(1);
        forum.topic = "Changed".into();
        assert_eq!(
            service(repo).update(&mut forum).await.unwrap_err(),
            DomainError::EditConflict
        );
        assert_eq!(forum.version, 1);
    }

    #[tokio::test]
    async fn edit_applies_only_present_fields() {
        let mut repo = MockForumRepository::new();
        repo.expect_get().returning(|_| Ok(stored(3)));
        repo.expect_update()
            .withf(|forum| {
                forum.topic == "Async" && forum.discussion == "Ownership" && forum.version == 3
            })
            .returning(|_| Ok(4));

        let forum = service(repo)
            .edit(
                1,
                ForumPatch {
                    topic: Some("Async".into()),
                    discussion: None,
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(forum.version, 4);
    }

    #[tokio::test]
    async fn stale_expected_version_is_refused_before_write() {
        let mut repo = MockForumRepository::new();
        repo.expect_get().returning(|_| Ok(stored(5)));
        repo.expect_update().never();

        let err = service(repo)
            .edit(1, ForumPatch::default(), Some(4))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::EditConflict);
    }

    #[tokio::test]
    async fn comments_append_with_version_bump() {
        let mut repo = MockForumRepository::new();
        repo.expect_get().returning(|_| {
            let mut forum = stored(2);
            forum.comments = vec!["first".into()];
            Ok(forum)
        });
        repo.expect_update()
            .withf(|forum| forum.comments == ["first", "second"])
            .returning(|_| Ok(3));

        let forum = service(repo)
            .add_comment(1, "second".into(), Some(2))
            .await
            .unwrap();
        assert_eq!(forum.comments.len(), 2);
        assert_eq!(forum.version, 3);
    }

    #[tokio::test]
    async fn duplicate_comment_is_a_validation_error() {
        let mut repo = MockForumRepository::new();
        repo.expect_get().returning(|_| {
            let mut forum = stored(1);
            forum.comments = vec!["same".into()];
            Ok(forum)
        });
        repo.expect_update().never();

        let err = service(repo)
            .add_comment(1, "same".into(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref v) if v.get("comments").is_some()));
    }

    #[tokio::test]
    async fn invalid_filters_never_reach_storage() {
        let mut repo = MockForumRepository::new();
        repo.expect_list().never();

        let err = service(repo)
            .list("", &Filters::new(1, 500, "id"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref v) if v.get("page_size").is_some()));
    }

    #[tokio::test]
    async fn list_derives_metadata_from_total() {
        let mut repo = MockForumRepository::new();
        repo.expect_list()
            .withf(|search, filters| search == "rust" && filters.offset() == 10)
            .returning(|_, _| Ok((vec![stored(1)], 25)));

        let (forums, metadata) = service(repo)
            .list("rust", &Filters::new(2, 10, "id"))
            .await
            .unwrap();
        assert_eq!(forums.len(), 1);
        assert_eq!(metadata.last_page, 3);
        assert_eq!(metadata.current_page, 2);
        assert_eq!(metadata.total_records, 25);
    }
}
