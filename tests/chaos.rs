//! Chaos tests for the feed engine.
//!
//! Failure scenarios driven by error-injecting collaborator doubles:
//! broker outages, open circuits, directory partitions, cache and search
//! backend failures. The invariant under test throughout: a creation event is
//! delivered or durably dead-lettered, and reads degrade instead of erroring.
//!
//! # Test Organization
//! - `failure_*` - failure scenarios; happy paths live in `tests/integration.rs`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use feed_engine::{
    BrokerError, ContentCache, ContentItem, DirectoryError, DirectoryService, EngineStores,
    EventBroker, FeedEngine, FeedEngineConfig, InMemoryBroker, InMemoryDirectory, Record,
    SearchDocument, SearchStore, StoreError, Subscription, WriteError,
};

// =============================================================================
// Failure-injecting doubles
// =============================================================================

/// Broker whose publishes always fail; subscriptions exist but stay empty.
struct DownBroker {
    publishes: AtomicU64,
}

impl DownBroker {
    fn new() -> Self {
        Self {
            publishes: AtomicU64::new(0),
        }
    }

    fn publishes(&self) -> u64 {
        self.publishes.load(Ordering::SeqCst)
    }
}

struct EmptySubscription;

#[async_trait]
impl Subscription for EmptySubscription {
    async fn poll(&mut self) -> Result<Option<Record>, BrokerError> {
        Ok(None)
    }
    async fn commit(&mut self, _offset: u64) -> Result<(), BrokerError> {
        Ok(())
    }
}

#[async_trait]
impl EventBroker for DownBroker {
    async fn publish(&self, _topic: &str, _key: &str, _payload: Vec<u8>) -> Result<(), BrokerError> {
        self.publishes.fetch_add(1, Ordering::SeqCst);
        Err(BrokerError::Unavailable("broker unreachable".to_string()))
    }

    async fn subscribe(
        &self,
        _topic: &str,
        _group: &str,
    ) -> Result<Box<dyn Subscription>, BrokerError> {
        Ok(Box::new(EmptySubscription))
    }
}

/// Directory that is always unreachable.
struct DownDirectory;

#[async_trait]
impl DirectoryService for DownDirectory {
    async fn exists(&self, _user_id: u64) -> Result<bool, DirectoryError> {
        Err(DirectoryError::Unavailable("network partition".to_string()))
    }
    async fn follower_count(&self, _author_id: u64) -> Result<usize, DirectoryError> {
        Err(DirectoryError::Unavailable("network partition".to_string()))
    }
    async fn followers(&self, _author_id: u64) -> Result<Vec<u64>, DirectoryError> {
        Err(DirectoryError::Unavailable("network partition".to_string()))
    }
    async fn following(&self, _user_id: u64) -> Result<Vec<u64>, DirectoryError> {
        Err(DirectoryError::Unavailable("network partition".to_string()))
    }
}

/// Cache backend that rejects every operation.
struct DownCache;

#[async_trait]
impl ContentCache for DownCache {
    async fn set(&self, _key: &str, _item: &ContentItem, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Backend("cache down".to_string()))
    }
    async fn get(&self, _key: &str) -> Result<Option<ContentItem>, StoreError> {
        Err(StoreError::Backend("cache down".to_string()))
    }
    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("cache down".to_string()))
    }
}

/// Search backend that rejects every operation.
struct DownSearchStore;

#[async_trait]
impl SearchStore for DownSearchStore {
    async fn upsert(&self, _doc: &SearchDocument) -> Result<(), StoreError> {
        Err(StoreError::Backend("index down".to_string()))
    }
    async fn query(&self, _text: &str) -> Result<Vec<SearchDocument>, StoreError> {
        Err(StoreError::Backend("index down".to_string()))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn push_world() -> Arc<InMemoryDirectory> {
    let directory = Arc::new(InMemoryDirectory::new());
    directory.add_user(1);
    directory.add_user(2);
    directory.follow(2, 1).unwrap();
    directory
}

/// Tight publish backoff so exhaustion happens in milliseconds.
fn fast_publish_config() -> FeedEngineConfig {
    FeedEngineConfig {
        publish_initial_backoff_ms: 1,
        publish_max_backoff_ms: 5,
        ..Default::default()
    }
}

// =============================================================================
// Failure Scenarios
// =============================================================================

#[tokio::test]
async fn failure_broker_down_dead_letters_instead_of_losing() {
    let broker = Arc::new(DownBroker::new());
    let engine = FeedEngine::new(fast_publish_config(), push_world(), broker.clone())
        .await
        .expect("engine init");

    // The write itself succeeds: content durability never depends on the
    // event transport.
    let item = engine
        .create_content(1, "survives the outage")
        .await
        .expect("create");
    assert_eq!(
        engine.get_content(&item.id).await.unwrap().unwrap().id,
        item.id
    );

    // Full attempt budget burned, then dead-lettered with the event intact.
    assert_eq!(broker.publishes(), 3);
    let records = engine.dead_letters().records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content_id, item.id);
    assert_eq!(records[0].author_id, 1);
    assert_eq!(records[0].body, "survives the outage");
    assert_eq!(records[0].created_at, item.created_at);
    assert!(records[0].failure_reason.contains("exhausted"));
}

#[tokio::test]
async fn failure_open_circuit_sheds_broker_load() {
    let broker = Arc::new(DownBroker::new());
    let engine = FeedEngine::new(fast_publish_config(), push_world(), broker.clone())
        .await
        .expect("engine init");

    // Publisher breaker window is 8: creates 1-2 burn 3 failing attempts
    // each; create 3 fills the window mid-sequence and trips the circuit.
    for _ in 0..3 {
        engine.create_content(1, "doomed").await.expect("create");
    }
    let calls_after_trip = broker.publishes();
    assert_eq!(calls_after_trip, 8);

    // With the circuit open the broker is no longer contacted at all.
    engine.create_content(1, "shed").await.expect("create");
    assert_eq!(broker.publishes(), calls_after_trip);

    // Every event is accounted for in the dead-letter queue.
    let records = engine.dead_letters().records().await.unwrap();
    assert_eq!(records.len(), 4);
    assert!(records[0].failure_reason.contains("exhausted"));
    assert!(records[3].failure_reason.contains("circuit open"));
    assert_eq!(engine.dead_letter_stats().await.unwrap().pending, 4);
}

#[tokio::test]
async fn failure_directory_down_aborts_validation() {
    let broker = Arc::new(InMemoryBroker::new());
    let engine = FeedEngine::new(
        FeedEngineConfig::default(),
        Arc::new(DownDirectory),
        broker.clone(),
    )
    .await
    .expect("engine init");

    let result = engine.create_content(1, "never happens").await;

    assert!(matches!(result, Err(WriteError::UpstreamUnavailable(_))));
    // No partial write: nothing was published either.
    assert_eq!(broker.topic_len("creation-events"), 0);

    // Reads degrade instead of erroring.
    assert!(engine.get_feed_by_pull(1).await.is_empty());
}

#[tokio::test]
async fn failure_cache_down_is_contained() {
    let broker = Arc::new(InMemoryBroker::new());
    let stores = EngineStores {
        cache: Some(Arc::new(DownCache)),
        ..Default::default()
    };
    let engine = FeedEngine::with_stores(
        FeedEngineConfig::default(),
        push_world(),
        broker.clone(),
        stores,
    )
    .await
    .expect("engine init");
    engine.start().await.expect("start");

    // Push strategy wants a cache write; its failure is logged, not raised.
    let item = engine.create_content(1, "no cache today").await.unwrap();
    assert_eq!(broker.topic_len("creation-events"), 1);

    // Reads fall back to the canonical store through the failing cache.
    let read = engine.get_content(&item.id).await.unwrap();
    assert_eq!(read.unwrap().id, item.id);

    engine.shutdown().await;
}

#[tokio::test]
async fn failure_search_down_degrades_to_empty() {
    let broker = Arc::new(InMemoryBroker::new());
    let stores = EngineStores {
        search: Some(Arc::new(DownSearchStore)),
        ..Default::default()
    };
    let engine = FeedEngine::with_stores(
        FeedEngineConfig::default(),
        push_world(),
        broker,
        stores,
    )
    .await
    .expect("engine init");
    engine.start().await.expect("start");

    let _ = engine.create_content(1, "unindexable").await.unwrap();

    // The feed side still materializes even though indexing keeps failing.
    for _ in 0..200 {
        if engine.get_feed(2).await.unwrap().len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(engine.get_feed(2).await.unwrap().len(), 1);

    // Search is an empty result set, not an error.
    assert!(engine.search("unindexable").await.is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn failure_dead_letters_survive_for_reconciliation() {
    let broker = Arc::new(DownBroker::new());
    let engine = FeedEngine::new(fast_publish_config(), push_world(), broker)
        .await
        .expect("engine init");

    let a = engine.create_content(1, "first casualty").await.unwrap();
    let b = engine.create_content(1, "second casualty").await.unwrap();

    // Append order is preserved for offline replay tooling.
    let records = engine.dead_letters().records().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].content_id, a.id);
    assert_eq!(records[1].content_id, b.id);
    assert!(records.iter().all(|r| r.recorded_at > 0));
}
