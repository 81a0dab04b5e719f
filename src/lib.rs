//! # Feed Engine
//!
//! A resilient content-fanout pipeline. When a piece of content is created it
//! becomes visible to the author's followers through read-optimized views,
//! while every downstream dependency is allowed to fail without losing or
//! duplicating the author's intent to publish.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Content Write Path                      │
//! │  • Author validation via circuit breaker                    │
//! │  • Canonical persist, fanout decision, best-effort cache    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Resilient Publisher                      │
//! │  • Per-attempt timeout + circuit breaker                    │
//! │  • Bounded retry with increasing backoff                    │
//! │  • Dead-letter fallback (delivered or durably recorded)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                    (creation-events topic)
//!                              ▼
//!        ┌─────────────────────┴───────────────────────┐
//!        ▼                                             ▼
//! ┌─────────────────────┐                    ┌───────────────────┐
//! │  Feed Materializer  │                    │  Search Indexer   │
//! │  per-follower feed  │                    │ full-text upserts │
//! │ entries, idempotent │                    │ keyed by content  │
//! └─────────────────────┘                    └───────────────────┘
//! ```
//!
//! Read side: the materialized feed store serves push-fanout users; the
//! [`aggregator`] computes a feed on demand for pull-fanout users; single items
//! are served cache-first with a canonical-store fallback.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use feed_engine::{FeedEngine, FeedEngineConfig, InMemoryBroker, InMemoryDirectory};
//!
//! #[tokio::main]
//! async fn main() {
//!     let directory = Arc::new(InMemoryDirectory::new());
//!     directory.add_user(1);
//!     directory.add_user(2);
//!     directory.follow(2, 1).unwrap();
//!
//!     let broker = Arc::new(InMemoryBroker::new());
//!     let engine = FeedEngine::new(FeedEngineConfig::default(), directory, broker)
//!         .await
//!         .expect("engine init");
//!     engine.start().await.expect("consumer start");
//!
//!     let item = engine.create_content(1, "hello").await.expect("create");
//!     println!("published {}", item.id);
//!
//!     engine.shutdown().await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: the [`FeedEngine`] coordinator exposing the operation surface
//! - [`write_path`]: author validation, canonical persist, cache, publish
//! - [`publisher`]: circuit-broken, retried, dead-lettered broker publishes
//! - [`fanout`]: the pure push/pull decision
//! - [`materializer`] / [`indexer`]: idempotent broker consumers
//! - [`aggregator`]: read-time pull fallback
//! - [`resilience`]: circuit breaker, retry, dead-letter queue
//! - [`broker`] / [`storage`] / [`directory`]: collaborator seams

pub mod config;
pub mod content;
pub mod directory;
pub mod broker;
pub mod storage;
pub mod resilience;
pub mod fanout;
pub mod publisher;
pub mod write_path;
pub mod materializer;
pub mod indexer;
pub mod aggregator;
pub mod engine;
pub mod metrics;

pub use config::FeedEngineConfig;
pub use content::{ContentItem, CreationEvent, FeedEntry, MalformedEvent, SearchDocument};
pub use directory::{DirectoryError, DirectoryService, InMemoryDirectory};
pub use broker::{BrokerError, EventBroker, InMemoryBroker, Record, Subscription};
pub use storage::traits::{ContentCache, ContentStore, FeedStore, SearchStore, StoreError};
pub use storage::memory::{
    InMemoryCache, InMemoryContentStore, InMemoryFeedStore, InMemorySearchStore,
};
pub use resilience::circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitError, CircuitState};
pub use resilience::retry::RetryConfig;
pub use resilience::dead_letter::{DeadLetterQueue, DeadLetterRecord, DlqStats};
pub use fanout::{decide, FanoutStrategy};
pub use publisher::{PublishOutcome, ResilientPublisher};
pub use write_path::{ContentWritePath, WriteError};
pub use materializer::FeedMaterializer;
pub use indexer::SearchIndexer;
pub use aggregator::PullAggregator;
pub use engine::{EngineState, EngineStores, FeedEngine};
