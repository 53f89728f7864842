//! In-process storage backed by `DashMap`.
//!
//! A single [`InMemoryStore`] implements every repository port so that tests
//! can hand the same value to all services. Clones share state.

mod credentials;
mod forums;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use domains::{Forum, Token, User, FORUMS_READ, FORUMS_WRITE};

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    forums: DashMap<i64, Forum>,
    next_forum_id: AtomicI64,

    users: DashMap<i64, User>,
    next_user_id: AtomicI64,
    /// Held across the uniqueness check and the write of a user row.
    user_keys: Mutex<()>,

    /// Keyed by token digest.
    tokens: DashMap<Vec<u8>, Token>,

    catalogue: BTreeSet<String>,
    grants: DashMap<i64, BTreeSet<String>>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            forums: DashMap::new(),
            next_forum_id: AtomicI64::new(1),
            users: DashMap::new(),
            next_user_id: AtomicI64::new(1),
            user_keys: Mutex::new(()),
            tokens: DashMap::new(),
            catalogue: [FORUMS_READ, FORUMS_WRITE]
                .into_iter()
                .map(String::from)
                .collect(),
            grants: DashMap::new(),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tokens, expired ones included.
    pub fn token_count(&self) -> usize {
        self.inner.tokens.len()
    }

    fn next_forum_id(&self) -> i64 {
        self.inner.next_forum_id.fetch_add(1, Ordering::Relaxed)
    }

    fn next_user_id(&self) -> i64 {
        self.inner.next_user_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Word-level match in the spirit of Postgres' `simple` text search
/// configuration: every lower-cased word of `query` must appear in `text`.
/// An empty query matches everything; a query with no words matches nothing.
pub(crate) fn matches_simple_text(text: &str, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let needles: Vec<String> = words(query).collect();
    if needles.is_empty() {
        return false;
    }
    let haystack: BTreeSet<String> = words(text).collect();
    needles.iter().all(|word| haystack.contains(word))
}

fn words(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}
