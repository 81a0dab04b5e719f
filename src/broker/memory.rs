//! In-process broker: append-only topic logs with per-group offsets.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::{BrokerError, EventBroker, Record, Subscription};

struct TopicLog {
    records: RwLock<Vec<Record>>,
}

/// An in-memory [`EventBroker`].
///
/// Topics are created on first use. Records are retained for the lifetime of
/// the broker, so any group subscribing later still sees the full history.
pub struct InMemoryBroker {
    topics: DashMap<String, Arc<TopicLog>>,
    /// (topic, group) -> next offset to deliver
    offsets: Arc<DashMap<(String, String), u64>>,
}

impl InMemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
            offsets: Arc::new(DashMap::new()),
        }
    }

    fn topic(&self, name: &str) -> Arc<TopicLog> {
        self.topics
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(TopicLog {
                    records: RwLock::new(Vec::new()),
                })
            })
            .clone()
    }

    /// Number of records in a topic (0 for an unknown topic).
    #[must_use]
    pub fn topic_len(&self, name: &str) -> usize {
        self.topics.get(name).map_or(0, |t| t.records.read().len())
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBroker for InMemoryBroker {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let log = self.topic(topic);
        let mut records = log.records.write();
        let offset = records.len() as u64;
        records.push(Record {
            offset,
            key: key.to_string(),
            payload,
        });
        debug!(topic, key, offset, "record appended");
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn Subscription>, BrokerError> {
        Ok(Box::new(MemorySubscription {
            log: self.topic(topic),
            offsets: self.offsets.clone(),
            key: (topic.to_string(), group.to_string()),
        }))
    }
}

struct MemorySubscription {
    log: Arc<TopicLog>,
    offsets: Arc<DashMap<(String, String), u64>>,
    key: (String, String),
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn poll(&mut self) -> Result<Option<Record>, BrokerError> {
        let next = self.offsets.get(&self.key).map_or(0, |v| *v);
        Ok(self.log.records.read().get(next as usize).cloned())
    }

    async fn commit(&mut self, offset: u64) -> Result<(), BrokerError> {
        self.offsets.insert(self.key.clone(), offset + 1);
        Ok(())
    }
}
