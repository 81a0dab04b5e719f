// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Dead-letter queue for undeliverable creation events.
//!
//! When a publish exhausts its retry budget, or the publish circuit is open,
//! the event is appended here instead of being dropped: every creation event
//! is either delivered to the broker or durably recorded for manual replay.
//!
//! Records are write-once and append-only. Nothing in the pipeline reads them
//! back automatically; [`DeadLetterQueue::records`] exists for offline
//! reconciliation tooling.
//!
//! Backed by a local SQLite database so dead letters survive a broker outage
//! and (with a configured path) a process restart.

use std::sync::atomic::{AtomicU64, Ordering};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{info, warn};

use crate::content::{now_millis, CreationEvent};
use crate::resilience::retry::{retry, RetryConfig};
use crate::storage::traits::StoreError;

/// One undeliverable event, preserved verbatim plus the failure context.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetterRecord {
    pub content_id: String,
    pub author_id: u64,
    pub body: String,
    pub created_at: i64,
    pub failure_reason: String,
    /// When the record was appended (epoch millis)
    pub recorded_at: i64,
}

impl DeadLetterRecord {
    /// Capture an event that could not be published.
    #[must_use]
    pub fn from_event(event: &CreationEvent, failure_reason: impl Into<String>) -> Self {
        Self {
            content_id: event.content_id.clone(),
            author_id: event.author_id,
            body: event.body.clone(),
            created_at: event.created_at,
            failure_reason: failure_reason.into(),
            recorded_at: now_millis(),
        }
    }
}

/// Dead-letter queue counters for observability.
#[derive(Debug, Clone, Copy)]
pub struct DlqStats {
    /// Records currently awaiting offline reconciliation
    pub pending: u64,
    /// Records appended since this process started
    pub appended_total: u64,
}

/// Append-only dead-letter store backed by SQLite.
pub struct DeadLetterQueue {
    pool: SqlitePool,
    appended_total: AtomicU64,
}

impl DeadLetterQueue {
    /// Open (or create) the queue.
    ///
    /// `None` uses an in-memory database: dead letters survive broker outages
    /// but not a process restart. Pass a path for full durability.
    pub async fn open(path: Option<&str>) -> Result<Self, StoreError> {
        // A pooled in-memory SQLite gets one database per connection; a
        // single connection keeps all appends in the same database.
        let (url, max_connections) = match path {
            Some(p) => (format!("sqlite://{}?mode=rwc", p), 4),
            None => ("sqlite::memory:".to_string(), 1),
        };

        let pool = retry("dead_letter_connect", &RetryConfig::startup(), || async {
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect(&url)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))
        })
        .await?;

        let queue = Self {
            pool,
            appended_total: AtomicU64::new(0),
        };
        queue.init_schema().await?;

        let pending = queue.pending().await?;
        if pending > 0 {
            warn!(pending, "dead-letter queue has records from a previous run");
        }
        info!(backing = %url, "dead-letter queue ready");

        Ok(queue)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dead_letters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_id TEXT NOT NULL,
                author_id INTEGER NOT NULL,
                body TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                failure_reason TEXT NOT NULL,
                recorded_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    /// Append a record. Callers treat this as fire-and-forget: a failed
    /// append is logged by the caller, never propagated to the write path.
    pub async fn append(&self, record: &DeadLetterRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO dead_letters \
             (content_id, author_id, body, created_at, failure_reason, recorded_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.content_id)
        .bind(record.author_id as i64)
        .bind(&record.body)
        .bind(record.created_at)
        .bind(&record.failure_reason)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        self.appended_total.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_dead_letter();
        warn!(
            content_id = %record.content_id,
            reason = %record.failure_reason,
            "creation event dead-lettered"
        );
        Ok(())
    }

    /// Number of records awaiting reconciliation.
    pub async fn pending(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) FROM dead_letters")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let count: i64 = row.get(0);
        Ok(count as u64)
    }

    /// All records in append order, for offline reconciliation tooling.
    pub async fn records(&self) -> Result<Vec<DeadLetterRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT content_id, author_id, body, created_at, failure_reason, recorded_at \
             FROM dead_letters ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| DeadLetterRecord {
                content_id: row.get("content_id"),
                author_id: row.get::<i64, _>("author_id") as u64,
                body: row.get("body"),
                created_at: row.get("created_at"),
                failure_reason: row.get("failure_reason"),
                recorded_at: row.get("recorded_at"),
            })
            .collect())
    }

    /// Current stats. Also refreshes the pending gauge.
    pub async fn stats(&self) -> Result<DlqStats, StoreError> {
        let pending = self.pending().await?;
        crate::metrics::set_dead_letter_pending(pending);
        Ok(DlqStats {
            pending,
            appended_total: self.appended_total.load(Ordering::Relaxed),
        })
    }
}
