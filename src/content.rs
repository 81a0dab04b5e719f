//! Core data model for the fanout pipeline.
//!
//! [`ContentItem`] is the canonical unit: one authored post. A successful
//! write publishes a [`CreationEvent`] on the broker; the consumers
//! materialize it into [`FeedEntry`] rows and [`SearchDocument`]s.
//!
//! Wire payloads are JSON with camelCase keys. Consumers must treat a payload
//! that fails to decode (or carries an empty `contentId`) as malformed and
//! skip it rather than crash: the transport is at-least-once and a poison
//! message must never block the stream.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current wall-clock time as epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// A canonical content item. Immutable once created, except for deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// UUIDv4 assigned by the write path
    pub id: String,
    pub author_id: u64,
    pub body: String,
    /// Creation timestamp (epoch millis)
    pub created_at: i64,
}

impl ContentItem {
    /// Create a new item with a fresh id and the current timestamp.
    pub fn new(author_id: u64, body: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author_id,
            body: body.into(),
            created_at: now_millis(),
        }
    }
}

/// Error for a creation event that cannot be processed.
///
/// Consumer-local: logged and skipped, never surfaced to callers.
#[derive(Debug, Error)]
#[error("malformed creation event: {reason}")]
pub struct MalformedEvent {
    pub reason: String,
}

/// The wire payload published for every successful content write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationEvent {
    pub content_id: String,
    pub author_id: u64,
    pub body: String,
    pub created_at: i64,
}

impl CreationEvent {
    /// Build the event for a freshly persisted item.
    #[must_use]
    pub fn from_item(item: &ContentItem) -> Self {
        Self {
            content_id: item.id.clone(),
            author_id: item.author_id,
            body: item.body.clone(),
            created_at: item.created_at,
        }
    }

    /// Serialize for the broker.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Parse a broker payload.
    ///
    /// A payload that is not valid JSON, is missing fields, or carries an
    /// empty `contentId` is rejected as [`MalformedEvent`] so the consumer can
    /// skip-and-log instead of crashing.
    pub fn decode(payload: &[u8]) -> Result<Self, MalformedEvent> {
        let event: CreationEvent = serde_json::from_slice(payload).map_err(|e| MalformedEvent {
            reason: e.to_string(),
        })?;
        if event.content_id.is_empty() {
            return Err(MalformedEvent {
                reason: "empty contentId".to_string(),
            });
        }
        Ok(event)
    }
}

/// One materialized row in a recipient's feed.
///
/// Uniqueness invariant: at most one entry per `(recipient_id, content_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub recipient_id: u64,
    pub content_id: String,
    pub author_id: u64,
    pub body: String,
    pub created_at: i64,
}

impl FeedEntry {
    /// Materialize an event for one recipient.
    #[must_use]
    pub fn from_event(event: &CreationEvent, recipient_id: u64) -> Self {
        Self {
            recipient_id,
            content_id: event.content_id.clone(),
            author_id: event.author_id,
            body: event.body.clone(),
            created_at: event.created_at,
        }
    }
}

/// A document in the search index, keyed by `content_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocument {
    pub content_id: String,
    pub body: String,
    pub author_id: u64,
    pub created_at: i64,
}

impl SearchDocument {
    #[must_use]
    pub fn from_event(event: &CreationEvent) -> Self {
        Self {
            content_id: event.content_id.clone(),
            body: event.body.clone(),
            author_id: event.author_id,
            created_at: event.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_has_id_and_timestamp() {
        let item = ContentItem::new(7, "hello world");

        assert!(!item.id.is_empty());
        assert_eq!(item.author_id, 7);
        assert_eq!(item.body, "hello world");
        assert!(item.created_at > 0);
    }

    #[test]
    fn test_item_ids_are_unique() {
        let a = ContentItem::new(1, "a");
        let b = ContentItem::new(1, "b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_event_round_trip() {
        let item = ContentItem::new(3, "roundtrip");
        let event = CreationEvent::from_item(&item);

        let decoded = CreationEvent::decode(&event.encode()).unwrap();

        assert_eq!(decoded, event);
        assert_eq!(decoded.content_id, item.id);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let event = CreationEvent {
            content_id: "c-1".into(),
            author_id: 1,
            body: "hi".into(),
            created_at: 100,
        };

        let json = String::from_utf8(event.encode()).unwrap();

        assert!(json.contains("contentId"));
        assert!(json.contains("authorId"));
        assert!(json.contains("createdAt"));
    }

    #[test]
    fn test_decode_rejects_missing_content_id() {
        let payload = br#"{"authorId":1,"body":"x","createdAt":1}"#;

        let err = CreationEvent::decode(payload).unwrap_err();
        assert!(err.reason.contains("contentId"));
    }

    #[test]
    fn test_decode_rejects_empty_content_id() {
        let payload = br#"{"contentId":"","authorId":1,"body":"x","createdAt":1}"#;

        let err = CreationEvent::decode(payload).unwrap_err();
        assert!(err.reason.contains("empty"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(CreationEvent::decode(b"not json at all").is_err());
        assert!(CreationEvent::decode(b"").is_err());
        assert!(CreationEvent::decode(br#"{"contentId":42}"#).is_err());
    }

    #[test]
    fn test_feed_entry_from_event() {
        let event = CreationEvent {
            content_id: "c-9".into(),
            author_id: 5,
            body: "fanned out".into(),
            created_at: 200,
        };

        let entry = FeedEntry::from_event(&event, 42);

        assert_eq!(entry.recipient_id, 42);
        assert_eq!(entry.content_id, "c-9");
        assert_eq!(entry.author_id, 5);
        assert_eq!(entry.created_at, 200);
    }

    #[test]
    fn test_search_document_from_event() {
        let event = CreationEvent {
            content_id: "c-2".into(),
            author_id: 8,
            body: "indexed".into(),
            created_at: 300,
        };

        let doc = SearchDocument::from_event(&event);

        assert_eq!(doc.content_id, "c-2");
        assert_eq!(doc.body, "indexed");
    }
}
