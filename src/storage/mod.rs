//! Storage backends for the read-optimized views.
//!
//! Traits define the seams (canonical store, feed store, search index,
//! hot-content cache); [`memory`] provides process-local implementations and
//! [`redis`] a Redis-backed cache.

pub mod traits;
pub mod memory;
pub mod redis;
