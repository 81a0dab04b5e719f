// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Resilient broker publisher.
//!
//! Wraps [`EventBroker::publish`] with a circuit breaker (per-attempt
//! timeout), a bounded retry budget with increasing backoff, and a
//! dead-letter fallback. The caller never sees an error: a publish either
//! reaches the broker or the event is durably recorded for manual replay,
//! and the outcome says which.
//!
//! Rejection by an open breaker short-circuits the remaining budget: there
//! is no point spacing attempts against a dependency that is being shed.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::broker::EventBroker;
use crate::content::CreationEvent;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitError};
use crate::resilience::dead_letter::{DeadLetterQueue, DeadLetterRecord};
use crate::resilience::retry::RetryConfig;

/// Terminal result of a publish sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// The event reached the broker on the given attempt (1-based).
    Delivered { attempts: usize },
    /// The event was appended to the dead-letter queue instead.
    DeadLettered { reason: String },
}

impl PublishOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

pub struct ResilientPublisher {
    broker: Arc<dyn EventBroker>,
    dead_letters: Arc<DeadLetterQueue>,
    breaker: CircuitBreaker,
    retry: RetryConfig,
    topic: String,
}

impl ResilientPublisher {
    pub fn new(
        broker: Arc<dyn EventBroker>,
        dead_letters: Arc<DeadLetterQueue>,
        topic: impl Into<String>,
        breaker_config: CircuitConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            broker,
            dead_letters,
            breaker: CircuitBreaker::new("broker_publish", breaker_config),
            retry,
            topic: topic.into(),
        }
    }

    /// The publish circuit breaker (for health reporting).
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Publish a creation event, falling back to the dead-letter queue.
    ///
    /// Events are keyed by author id so one author's events stay ordered
    /// within a partition.
    #[tracing::instrument(skip(self, event), fields(content_id = %event.content_id))]
    pub async fn publish(&self, event: &CreationEvent) -> PublishOutcome {
        let payload = event.encode();
        let key = event.author_id.to_string();
        let max_attempts = self.retry.max_attempts.unwrap_or(1).max(1);

        let mut delay = self.retry.initial_delay;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let result = self
                .breaker
                .call(|| self.broker.publish(&self.topic, &key, payload.clone()))
                .await;

            match result {
                Ok(()) => {
                    debug!(attempt, "creation event published");
                    crate::metrics::record_publish("delivered");
                    return PublishOutcome::Delivered { attempts: attempt };
                }
                Err(CircuitError::Rejected) => {
                    return self
                        .dead_letter(event, "publish circuit open".to_string())
                        .await;
                }
                Err(err) => {
                    last_error = err.to_string();
                    warn!(
                        attempt,
                        max_attempts,
                        error = %last_error,
                        "publish attempt failed"
                    );
                    if attempt < max_attempts {
                        sleep(delay).await;
                        delay = (delay.mul_f64(self.retry.factor)).min(self.retry.max_delay);
                    }
                }
            }
        }

        let reason = format!(
            "publish retries exhausted after {} attempts: {}",
            max_attempts, last_error
        );
        self.dead_letter(event, reason).await
    }

    async fn dead_letter(&self, event: &CreationEvent, reason: String) -> PublishOutcome {
        let record = DeadLetterRecord::from_event(event, reason.as_str());
        if let Err(err) = self.dead_letters.append(&record).await {
            // Both the broker and the dead-letter store are down; the event
            // survives only in this log line.
            error!(
                content_id = %event.content_id,
                error = %err,
                "failed to append dead-letter record"
            );
        }
        crate::metrics::record_publish("dead_lettered");
        PublishOutcome::DeadLettered { reason }
    }
}
