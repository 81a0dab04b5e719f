// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Feed materializer: creation events → per-recipient feed entries.
//!
//! A standing consumer on the creation-event stream (group `newsfeed-group`,
//! from the earliest offset on first activation, so a cold start replays
//! history instead of missing it).
//!
//! Recipients are the author's *followers*: one feed entry per follower per
//! event, keyed `(recipient_id, content_id)`. The transport is at-least-once,
//! so the upsert must absorb replays: reprocessing after a crash-before-
//! commit is a no-op.
//!
//! Disposition per record:
//! - malformed payload: log, commit, skip. A poison message never blocks the
//!   stream
//! - follower lookup or store failure: log, leave uncommitted. The record
//!   redelivers once the dependency recovers
//! - success: upsert every recipient, then commit

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::broker::{BrokerError, EventBroker, Subscription};
use crate::config::FeedEngineConfig;
use crate::content::{CreationEvent, FeedEntry};
use crate::directory::DirectoryService;
use crate::storage::traits::FeedStore;

pub struct FeedMaterializer {
    subscription: Box<dyn Subscription>,
    directory: Arc<dyn DirectoryService>,
    feed_store: Arc<dyn FeedStore>,
    poll_interval: Duration,
}

impl FeedMaterializer {
    /// Subscribe to the creation-event stream.
    pub async fn new(
        broker: &dyn EventBroker,
        directory: Arc<dyn DirectoryService>,
        feed_store: Arc<dyn FeedStore>,
        config: &FeedEngineConfig,
    ) -> Result<Self, BrokerError> {
        let subscription = broker
            .subscribe(&config.creation_topic, &config.feed_consumer_group)
            .await?;
        Ok(Self {
            subscription,
            directory,
            feed_store,
            poll_interval: config.poll_interval(),
        })
    }

    /// Consume until the shutdown signal flips.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("feed materializer started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("feed materializer shutting down");
                    break;
                }
                polled = self.poll_once() => match polled {
                    // More work may be queued; poll again immediately.
                    Ok(true) => {}
                    // Caught up (or deferring a failed record): idle briefly.
                    Ok(false) => tokio::time::sleep(self.poll_interval).await,
                    Err(err) => {
                        warn!(error = %err, "feed materializer poll failed");
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
            }
        }
    }

    /// Process at most one record.
    ///
    /// Returns `Ok(true)` when a record was consumed and committed, `Ok(false)`
    /// when caught up or when processing was deferred for redelivery.
    pub async fn poll_once(&mut self) -> Result<bool, BrokerError> {
        let Some(record) = self.subscription.poll().await? else {
            return Ok(false);
        };
        let offset = record.offset;

        let event = match CreationEvent::decode(&record.payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(offset, error = %err, "skipping malformed creation event");
                crate::metrics::record_consumer_event("feed_materializer", "malformed");
                self.subscription.commit(offset).await?;
                return Ok(true);
            }
        };

        let recipients = match self.directory.followers(event.author_id).await {
            Ok(followers) => followers,
            Err(err) => {
                warn!(
                    offset,
                    author_id = event.author_id,
                    error = %err,
                    "follower lookup failed, leaving event for redelivery"
                );
                crate::metrics::record_consumer_event("feed_materializer", "deferred");
                return Ok(false);
            }
        };

        let mut inserted = 0usize;
        for recipient in &recipients {
            let entry = FeedEntry::from_event(&event, *recipient);
            match self.feed_store.upsert(&entry).await {
                Ok(true) => inserted += 1,
                // Replayed event: the entry is already materialized.
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        offset,
                        recipient,
                        error = %err,
                        "feed upsert failed, leaving event for redelivery"
                    );
                    crate::metrics::record_consumer_event("feed_materializer", "deferred");
                    return Ok(false);
                }
            }
        }

        self.subscription.commit(offset).await?;
        debug!(
            offset,
            content_id = %event.content_id,
            recipients = recipients.len(),
            inserted,
            "creation event materialized"
        );
        crate::metrics::record_consumer_event("feed_materializer", "processed");
        Ok(true)
    }
}
