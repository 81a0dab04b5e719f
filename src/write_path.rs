// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Content write path.
//!
//! `create_content` is the pipeline's entry point: validate the author,
//! persist the canonical item, pick a fanout strategy, pre-stage the cache on
//! push, and hand the creation event to the resilient publisher.
//!
//! Failure containment is deliberate and asymmetric. Anything before the
//! canonical write aborts the whole operation (no partial state). Anything
//! after it (cache write, publish) is best-effort: the item is already
//! durable, and the event is the retry/dead-letter path's responsibility.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::FeedEngineConfig;
use crate::content::{ContentItem, CreationEvent};
use crate::directory::{DirectoryError, DirectoryService};
use crate::fanout::{self, FanoutStrategy};
use crate::publisher::{PublishOutcome, ResilientPublisher};
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitError};
use crate::storage::traits::{ContentCache, ContentStore, StoreError};

/// Errors surfaced by the write path.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Unknown author: user-correctable, a 4xx-equivalent.
    #[error("author {0} not found")]
    UnknownAuthor(u64),

    /// Breaker open or directory timeout during validation: a 503-equivalent,
    /// the caller is expected to retry.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Delete of nonexistent content.
    #[error("content {0} not found")]
    NotFound(String),

    /// Canonical store failure.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Cache key for a content item.
#[must_use]
pub fn cache_key(content_id: &str) -> String {
    format!("content:{content_id}")
}

pub struct ContentWritePath {
    directory: Arc<dyn DirectoryService>,
    content_store: Arc<dyn ContentStore>,
    cache: Arc<dyn ContentCache>,
    publisher: Arc<ResilientPublisher>,
    /// Shared breaker for all directory calls on this path: `exists` and
    /// `follower_count` hit the same dependency, so they share one failure
    /// history instead of each call-site (or worse, each invocation) getting
    /// its own.
    directory_breaker: Arc<CircuitBreaker>,
    fanout_threshold: usize,
    cache_ttl: Duration,
}

impl ContentWritePath {
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        content_store: Arc<dyn ContentStore>,
        cache: Arc<dyn ContentCache>,
        publisher: Arc<ResilientPublisher>,
        directory_breaker: Arc<CircuitBreaker>,
        config: &FeedEngineConfig,
    ) -> Self {
        Self {
            directory,
            content_store,
            cache,
            publisher,
            directory_breaker,
            fanout_threshold: config.fanout_threshold,
            cache_ttl: config.cache_ttl(),
        }
    }

    /// Create a content item.
    ///
    /// Externally observable side effects: one canonical write, zero-or-one
    /// cache write, one publish attempt sequence.
    #[tracing::instrument(skip(self, body))]
    pub async fn create_content(
        &self,
        author_id: u64,
        body: String,
    ) -> Result<ContentItem, WriteError> {
        let start = Instant::now();

        // 1. Validate authorship. Nothing is persisted on any failure here.
        match self
            .directory_breaker
            .call(|| self.directory.exists(author_id))
            .await
        {
            Ok(true) => {}
            Ok(false) | Err(CircuitError::Inner(DirectoryError::NotFound(_))) => {
                crate::metrics::record_operation("write_path", "create", "unknown_author");
                return Err(WriteError::UnknownAuthor(author_id));
            }
            Err(err) => {
                crate::metrics::record_operation("write_path", "create", "upstream_unavailable");
                return Err(WriteError::UpstreamUnavailable(err.to_string()));
            }
        }

        // 2. Canonical write: the source of truth.
        let item = ContentItem::new(author_id, body);
        self.content_store
            .put(&item)
            .await
            .map_err(|e| WriteError::Storage(e.to_string()))?;

        // 3./4. Fanout decision. An unavailable follower count degrades to
        // pull: never cache on unknown cardinality, never fail the write.
        let strategy = match self
            .directory_breaker
            .call(|| self.directory.follower_count(author_id))
            .await
        {
            Ok(count) => fanout::decide(count, self.fanout_threshold),
            Err(err) => {
                warn!(
                    author_id,
                    error = %err,
                    "follower count unavailable, degrading to pull fanout"
                );
                FanoutStrategy::Pull
            }
        };
        crate::metrics::record_fanout_decision(strategy.as_str());

        if strategy == FanoutStrategy::Push {
            match self
                .cache
                .set(&cache_key(&item.id), &item, self.cache_ttl)
                .await
            {
                Ok(()) => {
                    debug!(id = %item.id, "content pre-staged in cache");
                    crate::metrics::record_operation("cache", "set", "success");
                }
                Err(err) => {
                    warn!(id = %item.id, error = %err, "cache write failed, continuing");
                    crate::metrics::record_operation("cache", "set", "error");
                }
            }
        }

        // 5. Publish. The outcome is observed but never fails the write: the
        // item is durable, the event is now delivered-or-dead-lettered.
        let event = CreationEvent::from_item(&item);
        match self.publisher.publish(&event).await {
            PublishOutcome::Delivered { attempts } => {
                debug!(id = %item.id, attempts, "creation event delivered");
            }
            PublishOutcome::DeadLettered { reason } => {
                warn!(id = %item.id, reason = %reason, "creation event dead-lettered");
            }
        }

        info!(id = %item.id, author_id, strategy = %strategy, "content created");
        crate::metrics::record_operation("write_path", "create", "success");
        crate::metrics::record_latency("write_path", "create", start.elapsed());
        Ok(item)
    }

    /// Delete a content item from the canonical store.
    ///
    /// Feed entries, search documents, and cache copies are not retracted;
    /// they go stale and expire or get reconciled out of band.
    #[tracing::instrument(skip(self))]
    pub async fn delete_content(&self, id: &str) -> Result<(), WriteError> {
        match self.content_store.delete(id).await {
            Ok(()) => {
                info!(id, "content deleted from canonical store");
                crate::metrics::record_operation("write_path", "delete", "success");
                Ok(())
            }
            Err(StoreError::NotFound) => {
                crate::metrics::record_operation("write_path", "delete", "not_found");
                Err(WriteError::NotFound(id.to_string()))
            }
            Err(err) => Err(WriteError::Storage(err.to_string())),
        }
    }
}
