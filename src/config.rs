//! Configuration for the feed engine.
//!
//! # Example
//!
//! ```
//! use feed_engine::FeedEngineConfig;
//!
//! // Minimal config (uses defaults)
//! let config = FeedEngineConfig::default();
//! assert_eq!(config.fanout_threshold, 10);
//! assert_eq!(config.publish_max_attempts, 3);
//!
//! // Full config
//! let config = FeedEngineConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     dead_letter_path: Some("./dead_letters.db".into()),
//!     fanout_threshold: 50,
//!     cache_ttl_secs: 600,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::resilience::retry::RetryConfig;

/// Configuration for the feed engine.
///
/// All fields have sensible defaults. Configure `redis_url` to back the
/// hot-content cache with Redis and `dead_letter_path` to persist dead-lettered
/// events across restarts; without them the engine uses in-process fallbacks.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEngineConfig {
    /// Redis connection string for the hot-content cache
    /// (e.g., "redis://localhost:6379"). `None` uses the in-memory cache.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// SQLite file for the dead-letter queue. `None` keeps dead letters in an
    /// in-memory database (lost on restart).
    #[serde(default)]
    pub dead_letter_path: Option<String>,

    /// Follower count at or above which fanout switches from push to pull
    /// (default: 10)
    #[serde(default = "default_fanout_threshold")]
    pub fanout_threshold: usize,

    /// TTL for cache entries written under the push strategy (default: 1h)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Topic creation events are published on
    #[serde(default = "default_creation_topic")]
    pub creation_topic: String,

    /// Consumer group for the feed materializer
    #[serde(default = "default_feed_consumer_group")]
    pub feed_consumer_group: String,

    /// Consumer group for the search indexer
    #[serde(default = "default_search_consumer_group")]
    pub search_consumer_group: String,

    /// Idle poll interval for consumer loops, in milliseconds
    #[serde(default = "default_consumer_poll_ms")]
    pub consumer_poll_ms: u64,

    /// Publish attempt budget before an event is dead-lettered (default: 3)
    #[serde(default = "default_publish_max_attempts")]
    pub publish_max_attempts: usize,

    /// Backoff before the second publish attempt, in milliseconds
    #[serde(default = "default_publish_initial_backoff_ms")]
    pub publish_initial_backoff_ms: u64,

    /// Backoff cap between publish attempts, in milliseconds
    #[serde(default = "default_publish_max_backoff_ms")]
    pub publish_max_backoff_ms: u64,
}

fn default_fanout_threshold() -> usize {
    10
}
fn default_cache_ttl_secs() -> u64 {
    3600
}
fn default_creation_topic() -> String {
    "creation-events".to_string()
}
fn default_feed_consumer_group() -> String {
    "newsfeed-group".to_string()
}
fn default_search_consumer_group() -> String {
    "search-group".to_string()
}
fn default_consumer_poll_ms() -> u64 {
    25
}
fn default_publish_max_attempts() -> usize {
    3
}
fn default_publish_initial_backoff_ms() -> u64 {
    100
}
fn default_publish_max_backoff_ms() -> u64 {
    2000
}

impl Default for FeedEngineConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            dead_letter_path: None,
            fanout_threshold: default_fanout_threshold(),
            cache_ttl_secs: default_cache_ttl_secs(),
            creation_topic: default_creation_topic(),
            feed_consumer_group: default_feed_consumer_group(),
            search_consumer_group: default_search_consumer_group(),
            consumer_poll_ms: default_consumer_poll_ms(),
            publish_max_attempts: default_publish_max_attempts(),
            publish_initial_backoff_ms: default_publish_initial_backoff_ms(),
            publish_max_backoff_ms: default_publish_max_backoff_ms(),
        }
    }
}

impl FeedEngineConfig {
    /// Cache entry TTL as a [`Duration`].
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Idle poll interval for consumer loops as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.consumer_poll_ms)
    }

    /// Retry schedule for the publish path, derived from the publish knobs.
    #[must_use]
    pub fn publish_retry(&self) -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(self.publish_initial_backoff_ms),
            max_delay: Duration::from_millis(self.publish_max_backoff_ms),
            factor: 2.0,
            max_attempts: Some(self.publish_max_attempts),
        }
    }
}
