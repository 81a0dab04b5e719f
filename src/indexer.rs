// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search indexer: creation events → searchable documents.
//!
//! Consumes the same creation-event stream as the feed materializer but in
//! its own consumer group (`search-group`), so its offset progress is
//! decoupled. Documents are keyed by `content_id` and upserted: reindexing a
//! replayed event replaces rather than duplicates.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::broker::{BrokerError, EventBroker, Subscription};
use crate::config::FeedEngineConfig;
use crate::content::{CreationEvent, SearchDocument};
use crate::storage::traits::SearchStore;

pub struct SearchIndexer {
    subscription: Box<dyn Subscription>,
    search_store: Arc<dyn SearchStore>,
    poll_interval: Duration,
}

impl SearchIndexer {
    /// Subscribe to the creation-event stream.
    pub async fn new(
        broker: &dyn EventBroker,
        search_store: Arc<dyn SearchStore>,
        config: &FeedEngineConfig,
    ) -> Result<Self, BrokerError> {
        let subscription = broker
            .subscribe(&config.creation_topic, &config.search_consumer_group)
            .await?;
        Ok(Self {
            subscription,
            search_store,
            poll_interval: config.poll_interval(),
        })
    }

    /// Consume until the shutdown signal flips.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("search indexer started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("search indexer shutting down");
                    break;
                }
                polled = self.poll_once() => match polled {
                    Ok(true) => {}
                    Ok(false) => tokio::time::sleep(self.poll_interval).await,
                    Err(err) => {
                        warn!(error = %err, "search indexer poll failed");
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
            }
        }
    }

    /// Process at most one record; same disposition contract as the feed
    /// materializer.
    pub async fn poll_once(&mut self) -> Result<bool, BrokerError> {
        let Some(record) = self.subscription.poll().await? else {
            return Ok(false);
        };
        let offset = record.offset;

        let event = match CreationEvent::decode(&record.payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(offset, error = %err, "skipping malformed creation event");
                crate::metrics::record_consumer_event("search_indexer", "malformed");
                self.subscription.commit(offset).await?;
                return Ok(true);
            }
        };

        let doc = SearchDocument::from_event(&event);
        if let Err(err) = self.search_store.upsert(&doc).await {
            warn!(
                offset,
                content_id = %event.content_id,
                error = %err,
                "index upsert failed, leaving event for redelivery"
            );
            crate::metrics::record_consumer_event("search_indexer", "deferred");
            return Ok(false);
        }

        self.subscription.commit(offset).await?;
        debug!(offset, content_id = %event.content_id, "content indexed");
        crate::metrics::record_consumer_event("search_indexer", "processed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::broker::InMemoryBroker;
    use crate::storage::memory::InMemorySearchStore;

    fn payload(content_id: &str, body: &str) -> Vec<u8> {
        CreationEvent {
            content_id: content_id.to_string(),
            author_id: 1,
            body: body.to_string(),
            created_at: 100,
        }
        .encode()
    }

    async fn indexer(broker: &InMemoryBroker, store: Arc<InMemorySearchStore>) -> SearchIndexer {
        SearchIndexer::new(broker, store, &FeedEngineConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_indexes_valid_event() {
        let broker = InMemoryBroker::new();
        let store = Arc::new(InMemorySearchStore::new());
        let mut idx = indexer(&broker, store.clone()).await;

        broker
            .publish("creation-events", "1", payload("c-1", "searchable text"))
            .await
            .unwrap();

        assert!(idx.poll_once().await.unwrap());
        assert_eq!(store.query("searchable").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replay_does_not_duplicate() {
        let broker = InMemoryBroker::new();
        let store = Arc::new(InMemorySearchStore::new());
        let mut idx = indexer(&broker, store.clone()).await;

        let p = payload("c-1", "same doc");
        broker
            .publish("creation-events", "1", p.clone())
            .await
            .unwrap();
        broker.publish("creation-events", "1", p).await.unwrap();

        assert!(idx.poll_once().await.unwrap());
        assert!(idx.poll_once().await.unwrap());

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_event_skipped() {
        let broker = InMemoryBroker::new();
        let store = Arc::new(InMemorySearchStore::new());
        let mut idx = indexer(&broker, store.clone()).await;

        broker
            .publish("creation-events", "1", b"\xff\xfe not json".to_vec())
            .await
            .unwrap();
        broker
            .publish("creation-events", "1", payload("c-2", "good"))
            .await
            .unwrap();

        assert!(idx.poll_once().await.unwrap());
        assert!(idx.poll_once().await.unwrap());

        assert_eq!(store.len(), 1);
        assert_eq!(store.query("good").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_independent_of_feed_group() {
        let broker = InMemoryBroker::new();
        let store = Arc::new(InMemorySearchStore::new());
        let mut idx = indexer(&broker, store.clone()).await;

        broker
            .publish("creation-events", "1", payload("c-1", "text"))
            .await
            .unwrap();

        // Another group consuming the topic does not affect this group.
        let mut other = broker
            .subscribe("creation-events", "newsfeed-group")
            .await
            .unwrap();
        let record = other.poll().await.unwrap().unwrap();
        other.commit(record.offset).await.unwrap();

        assert!(idx.poll_once().await.unwrap());
        assert_eq!(store.len(), 1);
    }
}
