use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::content::{ContentItem, FeedEntry, SearchDocument};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("item not found")]
    NotFound,
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Canonical content storage: the single durable source of truth.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, item: &ContentItem) -> Result<(), StoreError>;
    async fn get(&self, id: &str) -> Result<Option<ContentItem>, StoreError>;

    /// Remove an item. Returns [`StoreError::NotFound`] when absent, so the
    /// write path can surface a delete of a nonexistent id.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// All items by one author (pull aggregation source).
    async fn by_author(&self, author_id: u64) -> Result<Vec<ContentItem>, StoreError>;
}

/// Per-recipient materialized feed storage.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Insert the entry unless one already exists for its
    /// `(recipient_id, content_id)` key. Returns `true` on first insert,
    /// `false` on replay.
    async fn upsert(&self, entry: &FeedEntry) -> Result<bool, StoreError>;

    /// A user's feed, `created_at` descending.
    async fn feed(&self, user_id: u64) -> Result<Vec<FeedEntry>, StoreError>;
}

/// Full-text index over content bodies.
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Insert or replace the document keyed by its `content_id`.
    async fn upsert(&self, doc: &SearchDocument) -> Result<(), StoreError>;

    /// Case-insensitive substring match against `body`, `created_at`
    /// descending. No match is an empty vec, not an error.
    async fn query(&self, text: &str) -> Result<Vec<SearchDocument>, StoreError>;
}

/// Hot-content cache. A miss is always a valid outcome, never an error.
#[async_trait]
pub trait ContentCache: Send + Sync {
    async fn set(&self, key: &str, item: &ContentItem, ttl: Duration) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Option<ContentItem>, StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
