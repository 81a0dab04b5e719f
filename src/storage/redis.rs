// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis-backed hot-content cache.
//!
//! Items are stored as JSON strings under `SET key value EX ttl`. A corrupt
//! or missing value reads as a miss; the canonical store is the source of
//! truth, the cache only shaves latency off the hot path.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::warn;

use super::traits::{ContentCache, StoreError};
use crate::content::ContentItem;
use crate::resilience::retry::{retry, RetryConfig};

pub struct RedisCache {
    connection: ConnectionManager,
    /// Optional key prefix for namespacing (e.g., "feed:" → "feed:content:42")
    prefix: String,
}

impl RedisCache {
    /// Create a new Redis cache without a key prefix.
    pub async fn new(connection_string: &str) -> Result<Self, StoreError> {
        Self::with_prefix(connection_string, None).await
    }

    /// Create a new Redis cache with an optional key prefix.
    ///
    /// The prefix is prepended to all keys, enabling namespacing when sharing
    /// a Redis instance with other applications.
    pub async fn with_prefix(
        connection_string: &str,
        prefix: Option<&str>,
    ) -> Result<Self, StoreError> {
        let client =
            Client::open(connection_string).map_err(|e| StoreError::Backend(e.to_string()))?;

        // Startup config: fail fast on a bad URL instead of hanging forever.
        let connection = retry("redis_connect", &RetryConfig::startup(), || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(|e: redis::RedisError| StoreError::Backend(e.to_string()))?;

        Ok(Self {
            connection,
            prefix: prefix.unwrap_or("").to_string(),
        })
    }

    #[inline]
    fn prefixed_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }

    /// Get the configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[async_trait]
impl ContentCache for RedisCache {
    async fn set(&self, key: &str, item: &ContentItem, ttl: Duration) -> Result<(), StoreError> {
        let payload = serde_json::to_string(item).map_err(|e| StoreError::Backend(e.to_string()))?;
        // Redis rejects a zero expiry; clamp to the minimum representable TTL.
        let seconds = ttl.as_secs().max(1);
        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(self.prefixed_key(key), payload, seconds)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<ContentItem>, StoreError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn
            .get(self.prefixed_key(key))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match value {
            None => Ok(None),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(item) => Ok(Some(item)),
                Err(e) => {
                    warn!(key, error = %e, "discarding unparseable cache entry");
                    Ok(None)
                }
            },
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .del(self.prefixed_key(key))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}
