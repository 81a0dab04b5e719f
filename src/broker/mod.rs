// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Event broker seam.
//!
//! The pipeline assumes a log-structured broker: per-topic ordered delivery
//! and at-least-once semantics per consumer group. Each group tracks its own
//! committed position, so the feed materializer and the search indexer consume
//! the same stream independently.
//!
//! Consumption contract: [`Subscription::poll`] returns the next record at or
//! after the group's committed position without advancing it;
//! [`Subscription::commit`] advances the position past the given offset. A
//! consumer that crashes between applying effects and committing will see the
//! record again, so downstream effects must be idempotent.

mod memory;

pub use memory::InMemoryBroker;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// One record in a topic log.
#[derive(Debug, Clone)]
pub struct Record {
    /// Position within the topic, contiguous from 0.
    pub offset: u64,
    /// Partitioning key (the author id, so an author's events stay ordered).
    pub key: String,
    pub payload: Vec<u8>,
}

/// Publish/subscribe surface of the event broker.
#[async_trait]
pub trait EventBroker: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Open a subscription for `group` on `topic`.
    ///
    /// A group with no committed position starts from the earliest retained
    /// offset, so a cold-started consumer replays history rather than missing
    /// it.
    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn Subscription>, BrokerError>;
}

/// A consumer group's cursor over one topic.
#[async_trait]
pub trait Subscription: Send {
    /// Next uncommitted record, or `None` when the group is caught up.
    async fn poll(&mut self) -> Result<Option<Record>, BrokerError>;

    /// Mark `offset` (and everything before it) as durably applied.
    async fn commit(&mut self, offset: u64) -> Result<(), BrokerError>;
}
