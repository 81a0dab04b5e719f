// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Circuit breaker with an explicit three-state machine.
//!
//! Protects the pipeline from cascading failures when a dependency (directory
//! lookups, broker publishes) is unhealthy. Call outcomes feed a rolling
//! window; once the window is full and the failure fraction exceeds the
//! threshold, the breaker trips and sheds load by failing fast.
//!
//! States:
//! - Closed: normal operation, calls pass through
//! - Open: dependency unhealthy, calls rejected without attempting
//! - HalfOpen: reset interval elapsed, exactly one trial call probes recovery
//!
//! Transitions are mutex-guarded so concurrent callers observe them
//! atomically; one breaker instance guards one dependency and is shared by
//! every caller of that dependency.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    HalfOpen,
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::HalfOpen => write!(f, "half_open"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// Error type for circuit-protected operations
#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    /// The circuit breaker rejected the call (circuit is open)
    #[error("circuit breaker open, request rejected")]
    Rejected,

    /// The call exceeded the per-call timeout
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The underlying operation failed
    #[error("operation failed: {0}")]
    Inner(#[source] E),
}

/// Configuration for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitConfig {
    /// Failure fraction that must be exceeded over a full window to trip
    pub failure_rate_threshold: f64,
    /// Number of recent call outcomes considered
    pub window_size: usize,
    /// How long the circuit stays open before admitting a trial call
    pub reset_timeout: Duration,
    /// Per-call timeout; a timed-out call counts as a failure
    pub call_timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            window_size: 8,
            reset_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(1),
        }
    }
}

impl CircuitConfig {
    /// Config for directory lookups (author validation sits on the request
    /// path, so trip fast and probe again quickly).
    #[must_use]
    pub fn directory() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            window_size: 8,
            reset_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(1),
        }
    }

    /// Config for broker publishes (the retry loop already spaces attempts,
    /// so tolerate a slightly longer outage before probing).
    #[must_use]
    pub fn publisher() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            window_size: 8,
            reset_timeout: Duration::from_secs(15),
            call_timeout: Duration::from_secs(2),
        }
    }

    /// Fast transitions for tests
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            window_size: 4,
            reset_timeout: Duration::from_millis(50),
            call_timeout: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Admission {
    Normal,
    Trial,
}

struct BreakerInner {
    state: CircuitState,
    /// Recent call outcomes, `true` = success, capped at `window_size`
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// A named circuit breaker guarding one dependency.
pub struct CircuitBreaker {
    name: String,
    config: CircuitConfig,
    inner: Mutex<BreakerInner>,

    // Metrics
    calls_total: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and config
    pub fn new(name: impl Into<String>, config: CircuitConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                trial_in_flight: false,
            }),
            calls_total: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        }
    }

    /// Get the circuit breaker name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current circuit state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Execute an async operation through the circuit breaker.
    ///
    /// The closure is only invoked if the call is admitted; while the circuit
    /// is open (and the reset interval has not elapsed) the downstream is
    /// never contacted. Admitted calls are bounded by the configured per-call
    /// timeout, and a timeout counts as a failure.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.calls_total.fetch_add(1, Ordering::Relaxed);

        let admission = match self.admit() {
            Some(admission) => admission,
            None => {
                self.rejections.fetch_add(1, Ordering::Relaxed);
                warn!(circuit = %self.name, "circuit breaker rejected call (open)");
                crate::metrics::record_circuit_call(&self.name, "rejected");
                return Err(CircuitError::Rejected);
            }
        };

        match tokio::time::timeout(self.config.call_timeout, f()).await {
            Ok(Ok(value)) => {
                self.successes.fetch_add(1, Ordering::Relaxed);
                self.record(admission, true);
                crate::metrics::record_circuit_call(&self.name, "success");
                Ok(value)
            }
            Ok(Err(e)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.record(admission, false);
                debug!(circuit = %self.name, "circuit call failed");
                crate::metrics::record_circuit_call(&self.name, "failure");
                Err(CircuitError::Inner(e))
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.record(admission, false);
                warn!(circuit = %self.name, timeout = ?self.config.call_timeout, "circuit call timed out");
                crate::metrics::record_circuit_call(&self.name, "timeout");
                Err(CircuitError::Timeout(self.config.call_timeout))
            }
        }
    }

    /// Decide whether a call may proceed, applying the Open → HalfOpen
    /// transition once the reset interval has elapsed.
    fn admit(&self) -> Option<Admission> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map_or(true, |at| at.elapsed() >= self.config.reset_timeout);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    debug!(circuit = %self.name, "reset interval elapsed, admitting trial call");
                    Some(Admission::Trial)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    // Only one probe at a time
                    None
                } else {
                    inner.trial_in_flight = true;
                    Some(Admission::Trial)
                }
            }
        }
    }

    fn record(&self, admission: Admission, success: bool) {
        let mut inner = self.inner.lock();
        match admission {
            Admission::Trial => {
                inner.trial_in_flight = false;
                if success {
                    inner.state = CircuitState::Closed;
                    inner.window.clear();
                    inner.opened_at = None;
                    debug!(circuit = %self.name, "trial call succeeded, circuit closed");
                } else {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(circuit = %self.name, "trial call failed, circuit reopened");
                }
            }
            Admission::Normal => {
                if inner.window.len() == self.config.window_size {
                    inner.window.pop_front();
                }
                inner.window.push_back(success);

                if !success && inner.window.len() >= self.config.window_size {
                    let failed = inner.window.iter().filter(|ok| !**ok).count();
                    let rate = failed as f64 / inner.window.len() as f64;
                    if rate > self.config.failure_rate_threshold {
                        inner.state = CircuitState::Open;
                        inner.opened_at = Some(Instant::now());
                        inner.window.clear();
                        warn!(
                            circuit = %self.name,
                            failure_rate = rate,
                            "failure rate over threshold, circuit opened"
                        );
                    }
                }
            }
        }
    }

    /// Get total number of calls
    #[must_use]
    pub fn calls_total(&self) -> u64 {
        self.calls_total.load(Ordering::Relaxed)
    }

    /// Get number of successful calls
    #[must_use]
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Get number of failed calls (operation errors and timeouts)
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Get number of rejected calls (circuit open)
    #[must_use]
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fail(cb: &CircuitBreaker) {
        let _: Result<i32, CircuitError<&str>> = cb.call(|| async { Err("boom") }).await;
    }

    async fn succeed(cb: &CircuitBreaker) {
        let _: Result<i32, CircuitError<&str>> = cb.call(|| async { Ok(1) }).await;
    }

    #[tokio::test]
    async fn test_passes_successful_calls() {
        let cb = CircuitBreaker::new("test", CircuitConfig::test());

        let result: Result<i32, CircuitError<&str>> = cb.call(|| async { Ok(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(cb.successes(), 1);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_tracks_failures_without_tripping_early() {
        let cb = CircuitBreaker::new("test", CircuitConfig::test());

        // Window of 4: two failures are not enough evidence to trip.
        fail(&cb).await;
        fail(&cb).await;

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failures(), 2);
    }

    #[tokio::test]
    async fn test_opens_when_window_full_of_failures() {
        let cb = CircuitBreaker::new("test", CircuitConfig::test());

        // 2 consecutive failures followed by 2 more fill the window of 4
        // at 100% > 50% and trip the circuit.
        for _ in 0..4 {
            fail(&cb).await;
        }

        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_half_failure_rate_does_not_trip() {
        let cb = CircuitBreaker::new("test", CircuitConfig::test());

        // Exactly 50% is not *over* the threshold.
        succeed(&cb).await;
        fail(&cb).await;
        succeed(&cb).await;
        fail(&cb).await;

        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let cb = CircuitBreaker::new("test", CircuitConfig::test());
        for _ in 0..4 {
            fail(&cb).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let invoked = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
        let invoked_clone = invoked.clone();
        let result: Result<i32, CircuitError<&str>> = cb
            .call(|| async move {
                invoked_clone.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await;

        assert!(matches!(result, Err(CircuitError::Rejected)));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(cb.rejections(), 1);
    }

    #[tokio::test]
    async fn test_trial_after_reset_interval_closes_on_success() {
        let cb = CircuitBreaker::new("test", CircuitConfig::test());
        for _ in 0..4 {
            fail(&cb).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(70)).await;

        // The next call runs as the half-open trial and closes the circuit.
        let result: Result<i32, CircuitError<&str>> = cb.call(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_trial_failure_reopens() {
        let cb = CircuitBreaker::new("test", CircuitConfig::test());
        for _ in 0..4 {
            fail(&cb).await;
        }
        tokio::time::sleep(Duration::from_millis(70)).await;

        fail(&cb).await;

        assert_eq!(cb.state(), CircuitState::Open);

        // And rejects again without waiting.
        let result: Result<i32, CircuitError<&str>> = cb.call(|| async { Ok(1) }).await;
        assert!(matches!(result, Err(CircuitError::Rejected)));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let cb = CircuitBreaker::new("test", CircuitConfig::test());

        let result: Result<i32, CircuitError<&str>> = cb
            .call(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            })
            .await;

        assert!(matches!(result, Err(CircuitError::Timeout(_))));
        assert_eq!(cb.failures(), 1);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let cb = CircuitBreaker::new("test", CircuitConfig::test());

        // Rolling window: successes displace old failures.
        fail(&cb).await;
        fail(&cb).await;
        for _ in 0..4 {
            succeed(&cb).await;
        }
        fail(&cb).await;

        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_metrics_accumulate() {
        let cb = CircuitBreaker::new("test", CircuitConfig::test());

        succeed(&cb).await;
        succeed(&cb).await;
        fail(&cb).await;

        assert_eq!(cb.calls_total(), 3);
        assert_eq!(cb.successes(), 2);
        assert_eq!(cb.failures(), 1);
        assert_eq!(cb.rejections(), 0);
        assert_eq!(cb.name(), "test");
    }
}
