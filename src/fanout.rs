//! Push/pull fanout decision.
//!
//! A low-fanout author is cheap to pre-stage: cache the item and let the
//! materializer build feed entries eagerly. A high-fanout author would trigger
//! unbounded write amplification, so cost is deferred to read time instead.
//!
//! [`decide`] is deterministic and side-effect-free so it can be tested in
//! isolation from the pipeline.

/// Fanout strategy selected at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutStrategy {
    /// Eagerly pre-stage: cache the item, materializers fan out per follower.
    Push,
    /// Defer to read time: the pull aggregator computes the feed on demand.
    Pull,
}

impl FanoutStrategy {
    /// Stable label for logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }
}

impl std::fmt::Display for FanoutStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Select the fanout strategy for an author with `follower_count` followers.
///
/// Push iff `follower_count < threshold`; the boundary case
/// `follower_count == threshold` selects Pull.
#[must_use]
pub fn decide(follower_count: usize, threshold: usize) -> FanoutStrategy {
    if follower_count < threshold {
        FanoutStrategy::Push
    } else {
        FanoutStrategy::Pull
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_threshold_is_push() {
        assert_eq!(decide(0, 10), FanoutStrategy::Push);
        assert_eq!(decide(9, 10), FanoutStrategy::Push);
    }

    #[test]
    fn test_boundary_is_pull() {
        assert_eq!(decide(10, 10), FanoutStrategy::Pull);
    }

    #[test]
    fn test_above_threshold_is_pull() {
        assert_eq!(decide(11, 10), FanoutStrategy::Pull);
        assert_eq!(decide(1_000_000, 10), FanoutStrategy::Pull);
    }

    #[test]
    fn test_zero_threshold_always_pulls() {
        assert_eq!(decide(0, 0), FanoutStrategy::Pull);
    }

    #[test]
    fn test_labels() {
        assert_eq!(FanoutStrategy::Push.as_str(), "push");
        assert_eq!(FanoutStrategy::Pull.to_string(), "pull");
    }
}
