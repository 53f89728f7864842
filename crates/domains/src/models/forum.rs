use chrono::{DateTime, Utc};

use crate::validation::{unique, ValidationErrors};

pub const TOPIC_MAX_BYTES: usize = 200;

/// A discussion thread.
#[derive(Debug, Clone, PartialEq)]
pub struct Forum {
    pub id: i64,
    /// Owner; set from the authenticated identity, never from client input.
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub topic: String,
    pub discussion: String,
    pub comments: Vec<String>,
    /// Starts at 1 and advances by exactly 1 per successful update.
    pub version: i32,
}

/// Client-supplied fields for a new thread.
#[derive(Debug, Clone, PartialEq)]
pub struct NewForum {
    pub topic: String,
    pub discussion: String,
}

/// Partial edit; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForumPatch {
    pub topic: Option<String>,
    pub discussion: Option<String>,
}

pub fn validate_forum(
    v: &mut ValidationErrors,
    topic: &str,
    discussion: &str,
    comments: &[String],
) {
    v.check(!topic.is_empty(), "topic", "must be provided");
    v.check(
        topic.len() <= TOPIC_MAX_BYTES,
        "topic",
        "must not be more than 200 bytes long",
    );
    v.check(!discussion.is_empty(), "discussion", "must be provided");
    v.check(
        unique(comments),
        "comments",
        "must not contain duplicate entries",
    );
}

impl NewForum {
    pub fn validate(&self) -> ValidationErrors {
        let mut v = ValidationErrors::new();
        validate_forum(&mut v, &self.topic, &self.discussion, &[]);
        v
    }
}

impl Forum {
    pub fn validate(&self) -> ValidationErrors {
        let mut v = ValidationErrors::new();
        validate_forum(&mut v, &self.topic, &self.discussion, &self.comments);
        v
    }

    pub fn apply(&mut self, patch: ForumPatch) {
        if let Some(topic) = patch.topic {
            self.topic = topic;
        }
        if let Some(discussion) = patch.discussion {
            self.discussion = discussion;
        }
    }
}
