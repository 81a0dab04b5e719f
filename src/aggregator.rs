//! Pull-path aggregator: read-time feed computation.
//!
//! Serves the `Pull` fanout case and acts as the correctness fallback when
//! materialized entries are not (yet) available. Fetches the user's
//! follow-list, then each followee's content, merges and sorts newest-first.
//!
//! Degradation is total-order: a directory failure yields an empty feed, a
//! single followee's failure is skipped. The caller never sees an error.

use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use crate::content::ContentItem;
use crate::directory::DirectoryService;
use crate::storage::traits::ContentStore;

pub struct PullAggregator {
    directory: Arc<dyn DirectoryService>,
    content_store: Arc<dyn ContentStore>,
}

impl PullAggregator {
    pub fn new(directory: Arc<dyn DirectoryService>, content_store: Arc<dyn ContentStore>) -> Self {
        Self {
            directory,
            content_store,
        }
    }

    /// Compute a user's feed on demand, `created_at` descending.
    ///
    /// Ties beyond the timestamp are not further ordered.
    #[tracing::instrument(skip(self))]
    pub async fn feed_by_pull(&self, user_id: u64) -> Vec<ContentItem> {
        let start = Instant::now();

        let followed = match self.directory.following(user_id).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(user_id, error = %err, "follow list unavailable, serving empty feed");
                crate::metrics::record_operation("aggregator", "pull", "degraded");
                return Vec::new();
            }
        };

        let mut items = Vec::new();
        for followee in followed {
            match self.content_store.by_author(followee).await {
                Ok(mut batch) => items.append(&mut batch),
                Err(err) => {
                    // Isolated: one bad followee never aborts the whole read.
                    warn!(user_id, followee, error = %err, "content fetch failed, skipping followee");
                }
            }
        }

        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        crate::metrics::record_operation("aggregator", "pull", "success");
        crate::metrics::record_latency("aggregator", "pull", start.elapsed());
        items
    }
}
