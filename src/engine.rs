// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Feed engine coordinator.
//!
//! The [`FeedEngine`] wires the pipeline together and exposes the operation
//! surface a thin HTTP controller or CLI would call:
//!
//! - [`create_content`](FeedEngine::create_content) / [`delete_content`](FeedEngine::delete_content)
//! - [`get_feed`](FeedEngine::get_feed) (materialized) / [`get_feed_by_pull`](FeedEngine::get_feed_by_pull) (on demand)
//! - [`search`](FeedEngine::search)
//! - [`get_content`](FeedEngine::get_content) (cache-first single item)
//!
//! # Lifecycle
//!
//! ```text
//! Created → Running → ShuttingDown
//! ```
//!
//! [`start`](FeedEngine::start) subscribes and spawns the consumer loops;
//! [`shutdown`](FeedEngine::shutdown) signals them and waits for them to
//! drain.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::aggregator::PullAggregator;
use crate::broker::{BrokerError, EventBroker};
use crate::config::FeedEngineConfig;
use crate::content::{ContentItem, FeedEntry, SearchDocument};
use crate::directory::DirectoryService;
use crate::indexer::SearchIndexer;
use crate::materializer::FeedMaterializer;
use crate::publisher::ResilientPublisher;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitConfig};
use crate::resilience::dead_letter::{DeadLetterQueue, DlqStats};
use crate::storage::memory::{
    InMemoryCache, InMemoryContentStore, InMemoryFeedStore, InMemorySearchStore,
};
use crate::storage::redis::RedisCache;
use crate::storage::traits::{ContentCache, ContentStore, FeedStore, SearchStore, StoreError};
use crate::write_path::{cache_key, ContentWritePath, WriteError};

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Running,
    ShuttingDown,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::ShuttingDown => write!(f, "shutting_down"),
        }
    }
}

/// Optional store overrides for [`FeedEngine::with_stores`].
///
/// Any field left `None` gets the default implementation (in-memory stores;
/// the cache additionally honors `redis_url`).
#[derive(Default)]
pub struct EngineStores {
    pub content: Option<Arc<dyn ContentStore>>,
    pub feed: Option<Arc<dyn FeedStore>>,
    pub search: Option<Arc<dyn SearchStore>>,
    pub cache: Option<Arc<dyn ContentCache>>,
}

/// Main pipeline coordinator.
pub struct FeedEngine {
    config: FeedEngineConfig,
    directory: Arc<dyn DirectoryService>,
    broker: Arc<dyn EventBroker>,
    content_store: Arc<dyn ContentStore>,
    feed_store: Arc<dyn FeedStore>,
    search_store: Arc<dyn SearchStore>,
    cache: Arc<dyn ContentCache>,
    dead_letters: Arc<DeadLetterQueue>,
    write_path: ContentWritePath,
    aggregator: PullAggregator,

    state: watch::Sender<EngineState>,
    state_rx: watch::Receiver<EngineState>,
    shutdown: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
}

impl FeedEngine {
    /// Create an engine with default (in-memory) stores.
    pub async fn new(
        config: FeedEngineConfig,
        directory: Arc<dyn DirectoryService>,
        broker: Arc<dyn EventBroker>,
    ) -> Result<Self, StoreError> {
        Self::with_stores(config, directory, broker, EngineStores::default()).await
    }

    /// Create an engine with store overrides.
    pub async fn with_stores(
        config: FeedEngineConfig,
        directory: Arc<dyn DirectoryService>,
        broker: Arc<dyn EventBroker>,
        stores: EngineStores,
    ) -> Result<Self, StoreError> {
        let content_store = stores
            .content
            .unwrap_or_else(|| Arc::new(InMemoryContentStore::new()));
        let feed_store = stores
            .feed
            .unwrap_or_else(|| Arc::new(InMemoryFeedStore::new()));
        let search_store = stores
            .search
            .unwrap_or_else(|| Arc::new(InMemorySearchStore::new()));
        let cache: Arc<dyn ContentCache> = match stores.cache {
            Some(cache) => cache,
            None => match config.redis_url {
                Some(ref url) => Arc::new(RedisCache::new(url).await?),
                None => Arc::new(InMemoryCache::new()),
            },
        };

        let dead_letters =
            Arc::new(DeadLetterQueue::open(config.dead_letter_path.as_deref()).await?);

        let publisher = Arc::new(ResilientPublisher::new(
            broker.clone(),
            dead_letters.clone(),
            &config.creation_topic,
            CircuitConfig::publisher(),
            config.publish_retry(),
        ));
        let directory_breaker = Arc::new(CircuitBreaker::new(
            "directory",
            CircuitConfig::directory(),
        ));

        let write_path = ContentWritePath::new(
            directory.clone(),
            content_store.clone(),
            cache.clone(),
            publisher,
            directory_breaker,
            &config,
        );
        let aggregator = PullAggregator::new(directory.clone(), content_store.clone());

        let (state, state_rx) = watch::channel(EngineState::Created);
        let (shutdown, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            directory,
            broker,
            content_store,
            feed_store,
            search_store,
            cache,
            dead_letters,
            write_path,
            aggregator,
            state,
            state_rx,
            shutdown,
            shutdown_rx,
            consumers: Mutex::new(Vec::new()),
        })
    }

    /// Subscribe and spawn the consumer loops.
    pub async fn start(&self) -> Result<(), BrokerError> {
        let materializer = FeedMaterializer::new(
            self.broker.as_ref(),
            self.directory.clone(),
            self.feed_store.clone(),
            &self.config,
        )
        .await?;
        let indexer = SearchIndexer::new(
            self.broker.as_ref(),
            self.search_store.clone(),
            &self.config,
        )
        .await?;

        let mut consumers = self.consumers.lock().await;
        consumers.push(tokio::spawn(materializer.run(self.shutdown_rx.clone())));
        consumers.push(tokio::spawn(indexer.run(self.shutdown_rx.clone())));

        let _ = self.state.send(EngineState::Running);
        info!("feed engine running");
        Ok(())
    }

    /// Signal the consumers and wait for them to stop.
    pub async fn shutdown(&self) {
        let _ = self.state.send(EngineState::ShuttingDown);
        let _ = self.shutdown.send(true);

        let mut consumers = self.consumers.lock().await;
        for handle in consumers.drain(..) {
            let _ = handle.await;
        }
        info!("feed engine stopped");
    }

    /// Get current engine state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    // --- Operation surface ---

    /// Create a content item; see [`ContentWritePath::create_content`].
    pub async fn create_content(
        &self,
        author_id: u64,
        body: impl Into<String>,
    ) -> Result<ContentItem, WriteError> {
        self.write_path.create_content(author_id, body.into()).await
    }

    /// Delete a content item from the canonical store.
    pub async fn delete_content(&self, id: &str) -> Result<(), WriteError> {
        self.write_path.delete_content(id).await
    }

    /// A user's materialized feed, newest first.
    pub async fn get_feed(&self, user_id: u64) -> Result<Vec<FeedEntry>, StoreError> {
        self.feed_store.feed(user_id).await
    }

    /// A user's feed computed on demand (pull fanout / fallback path).
    pub async fn get_feed_by_pull(&self, user_id: u64) -> Vec<ContentItem> {
        self.aggregator.feed_by_pull(user_id).await
    }

    /// Full-text search. An unreachable index degrades to an empty result
    /// set, never an error.
    pub async fn search(&self, query: &str) -> Vec<SearchDocument> {
        match self.search_store.query(query).await {
            Ok(docs) => docs,
            Err(err) => {
                warn!(query, error = %err, "search backend unavailable, returning empty result set");
                crate::metrics::record_operation("search", "query", "degraded");
                Vec::new()
            }
        }
    }

    /// Single-item lookup: cache first, canonical store on miss.
    ///
    /// Cache errors read as misses; the canonical store answers.
    pub async fn get_content(&self, id: &str) -> Result<Option<ContentItem>, StoreError> {
        match self.cache.get(&cache_key(id)).await {
            Ok(Some(item)) => {
                debug!(id, "cache hit");
                crate::metrics::record_operation("cache", "get", "hit");
                return Ok(Some(item));
            }
            Ok(None) => {
                crate::metrics::record_operation("cache", "get", "miss");
            }
            Err(err) => {
                warn!(id, error = %err, "cache lookup failed, falling back to canonical store");
                crate::metrics::record_operation("cache", "get", "error");
            }
        }
        self.content_store.get(id).await
    }

    /// Dead-letter queue counters.
    pub async fn dead_letter_stats(&self) -> Result<DlqStats, StoreError> {
        self.dead_letters.stats().await
    }

    /// Handle to the dead-letter queue (offline reconciliation tooling).
    #[must_use]
    pub fn dead_letters(&self) -> Arc<DeadLetterQueue> {
        self.dead_letters.clone()
    }
}
