use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::traits::{ContentCache, ContentStore, FeedStore, SearchStore, StoreError};
use crate::content::{ContentItem, FeedEntry, SearchDocument};

/// In-memory canonical store.
pub struct InMemoryContentStore {
    items: DashMap<String, ContentItem>,
}

impl InMemoryContentStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn put(&self, item: &ContentItem) -> Result<(), StoreError> {
        self.items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ContentItem>, StoreError> {
        Ok(self.items.get(id).map(|r| r.value().clone()))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        match self.items.remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    async fn by_author(&self, author_id: u64) -> Result<Vec<ContentItem>, StoreError> {
        Ok(self
            .items
            .iter()
            .filter(|r| r.value().author_id == author_id)
            .map(|r| r.value().clone())
            .collect())
    }
}

/// In-memory feed store keyed by `(recipient_id, content_id)`.
pub struct InMemoryFeedStore {
    entries: DashMap<(u64, String), FeedEntry>,
}

impl InMemoryFeedStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for InMemoryFeedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedStore for InMemoryFeedStore {
    async fn upsert(&self, entry: &FeedEntry) -> Result<bool, StoreError> {
        match self
            .entries
            .entry((entry.recipient_id, entry.content_id.clone()))
        {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
                Ok(true)
            }
        }
    }

    async fn feed(&self, user_id: u64) -> Result<Vec<FeedEntry>, StoreError> {
        let mut entries: Vec<FeedEntry> = self
            .entries
            .iter()
            .filter(|r| r.key().0 == user_id)
            .map(|r| r.value().clone())
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}

/// In-memory search index with substring matching.
pub struct InMemorySearchStore {
    docs: DashMap<String, SearchDocument>,
}

impl InMemorySearchStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }
}

impl Default for InMemorySearchStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchStore for InMemorySearchStore {
    async fn upsert(&self, doc: &SearchDocument) -> Result<(), StoreError> {
        self.docs.insert(doc.content_id.clone(), doc.clone());
        Ok(())
    }

    async fn query(&self, text: &str) -> Result<Vec<SearchDocument>, StoreError> {
        let needle = text.to_lowercase();
        let mut hits: Vec<SearchDocument> = self
            .docs
            .iter()
            .filter(|r| r.value().body.to_lowercase().contains(&needle))
            .map(|r| r.value().clone())
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(hits)
    }
}

/// In-memory TTL cache. Expiry is checked lazily on read.
pub struct InMemoryCache {
    entries: DashMap<String, (ContentItem, Instant)>,
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentCache for InMemoryCache {
    async fn set(&self, key: &str, item: &ContentItem, ttl: Duration) -> Result<(), StoreError> {
        self.entries
            .insert(key.to_string(), (item.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<ContentItem>, StoreError> {
        // The shard guard must be released before removing an expired entry.
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.value().1 > Instant::now() {
                    return Ok(Some(entry.value().0.clone()));
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}
