// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Three-state circuit breaker guarding one remote dependency.
//!
//! The breaker stops calling a failing dependency after a run of consecutive
//! failures, waits out a cooldown, then lets a bounded number of probe calls
//! through. Enough consecutive probe successes close it again; any probe
//! failure re-opens it.
//!
//! The breaker does not log. Observers register a state-change callback.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use strum::Display;
use thiserror::Error;
use voxquote_core::Clock;

/// Thresholds for a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in closed state that open the circuit.
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close the circuit.
    pub success_threshold: u32,
    /// Time spent open before the next call probes.
    pub open_timeout: Duration,
    /// Probe calls allowed in flight while half-open.
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
            half_open_max_requests: 1,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn with_half_open_max_requests(mut self, max: u32) -> Self {
        self.half_open_max_requests = max.max(1);
        self
    }
}

/// Breaker state, labelled `closed`, `open` or `half-open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected without being attempted.
    Open,
    /// A limited number of probe calls pass through.
    HalfOpen,
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not attempted.
    #[error("circuit `{name}` is open")]
    Open { name: String },

    /// The circuit is half-open and every probe slot is taken; the operation
    /// was not attempted.
    #[error("circuit `{name}` is half-open and at its probe limit")]
    HalfOpenSaturated { name: String },

    /// The operation ran and failed.
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// True when the breaker refused the call.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, BreakerError::Inner(_))
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

/// Diagnostic snapshot of a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub rejections: u64,
}

type StateChangeFn = dyn Fn(&str, CircuitState, CircuitState) + Send + Sync;

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    half_open_in_flight: u32,
    last_transition: Instant,
    /// Bumped on every transition so results from calls admitted under an
    /// earlier state are ignored.
    generation: u64,
}

impl Inner {
    fn transition(&mut self, to: CircuitState, now: Instant) -> Option<(CircuitState, CircuitState)> {
        let from = self.state;
        self.state = to;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.half_open_in_flight = 0;
        self.last_transition = now;
        self.generation += 1;
        (from != to).then_some((from, to))
    }
}

#[derive(Debug, Clone, Copy)]
struct Admission {
    generation: u64,
    probe: bool,
}

/// Releases a half-open probe slot if the guarded future is dropped before
/// it reports a result.
struct ProbeSlot<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    armed: bool,
}

impl Drop for ProbeSlot<'_> {
    fn drop(&mut self) {
        if self.armed && self.admission.probe {
            let mut inner = self.breaker.write();
            if inner.generation == self.admission.generation {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
            }
        }
    }
}

/// A named circuit breaker.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: RwLock<Inner>,
    on_state_change: Option<Box<StateChangeFn>>,
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            name: name.into(),
            config,
            clock,
            inner: RwLock::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                half_open_in_flight: 0,
                last_transition: now,
                generation: 0,
            }),
            on_state_change: None,
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        }
    }

    /// Register a callback invoked as `(name, from, to)` after each
    /// transition. It runs outside the breaker's lock.
    pub fn with_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Box::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, change: Option<(CircuitState, CircuitState)>) {
        if let (Some((from, to)), Some(cb)) = (change, &self.on_state_change) {
            cb(&self.name, from, to);
        }
    }

    /// Current state. An open breaker whose timeout has elapsed still reads
    /// as open until the next call probes.
    pub fn state(&self) -> CircuitState {
        self.read().state
    }

    /// Run `f` through the breaker. Every `Err` counts as a failure.
    pub async fn execute<T, E, F, Fut>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_if(f, |_| true).await
    }

    /// Run `f` through the breaker, counting an `Err` as a failure only when
    /// `is_failure` says so. Errors that are not failures (for example a
    /// caller's own cancellation) leave the counters untouched.
    pub async fn execute_if<T, E, F, Fut, P>(&self, f: F, is_failure: P) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnOnce(&E) -> bool,
    {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let admission = self.admit()?;
        let mut slot = ProbeSlot {
            breaker: self,
            admission,
            armed: true,
        };

        let result = f().await;
        slot.armed = false;
        drop(slot);

        match &result {
            Ok(_) => self.record_success(admission),
            Err(e) if is_failure(e) => self.record_failure(admission),
            Err(_) => self.record_neutral(admission),
        }
        result.map_err(BreakerError::Inner)
    }

    fn admit<E>(&self) -> Result<Admission, BreakerError<E>> {
        let now = self.clock.now();
        let (admission, change) = {
            let mut inner = self.write();
            match inner.state {
                CircuitState::Closed => (
                    Ok(Admission {
                        generation: inner.generation,
                        probe: false,
                    }),
                    None,
                ),
                CircuitState::Open => {
                    if now.saturating_duration_since(inner.last_transition) >= self.config.open_timeout {
                        let change = inner.transition(CircuitState::HalfOpen, now);
                        inner.half_open_in_flight = 1;
                        (
                            Ok(Admission {
                                generation: inner.generation,
                                probe: true,
                            }),
                            change,
                        )
                    } else {
                        (
                            Err(BreakerError::Open {
                                name: self.name.clone(),
                            }),
                            None,
                        )
                    }
                }
                CircuitState::HalfOpen => {
                    if inner.half_open_in_flight < self.config.half_open_max_requests {
                        inner.half_open_in_flight += 1;
                        (
                            Ok(Admission {
                                generation: inner.generation,
                                probe: true,
                            }),
                            None,
                        )
                    } else {
                        (
                            Err(BreakerError::HalfOpenSaturated {
                                name: self.name.clone(),
                            }),
                            None,
                        )
                    }
                }
            }
        };

        if admission.is_err() {
            self.rejections.fetch_add(1, Ordering::Relaxed);
        }
        self.notify(change);
        admission
    }

    fn record_success(&self, admission: Admission) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        let change = {
            let mut inner = self.write();
            if inner.generation != admission.generation {
                return;
            }
            match inner.state {
                CircuitState::Closed => {
                    inner.consecutive_failures = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                    inner.consecutive_successes += 1;
                    if inner.consecutive_successes >= self.config.success_threshold {
                        inner.transition(CircuitState::Closed, self.clock.now())
                    } else {
                        None
                    }
                }
                CircuitState::Open => None,
            }
        };
        self.notify(change);
    }

    fn record_failure(&self, admission: Admission) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        let change = {
            let mut inner = self.write();
            if inner.generation != admission.generation {
                return;
            }
            match inner.state {
                CircuitState::Closed => {
                    inner.consecutive_failures += 1;
                    if inner.consecutive_failures >= self.config.failure_threshold {
                        inner.transition(CircuitState::Open, self.clock.now())
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => inner.transition(CircuitState::Open, self.clock.now()),
                CircuitState::Open => None,
            }
        };
        self.notify(change);
    }

    fn record_neutral(&self, admission: Admission) {
        if !admission.probe {
            return;
        }
        let mut inner = self.write();
        if inner.generation == admission.generation {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
    }

    /// Force the breaker closed with zeroed counters.
    pub fn reset(&self) {
        let change = self.write().transition(CircuitState::Closed, self.clock.now());
        self.notify(change);
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.read();
        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;
    use voxquote_core::ManualClock;

    fn breaker(config: CircuitBreakerConfig) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (CircuitBreaker::new("summarizer", config, clock.clone()), clock)
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        cb.execute(|| async { Err::<(), _>("boom") }).await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        cb.execute(|| async { Ok::<(), &'static str>(()) }).await
    }

    #[tokio::test]
    async fn starts_closed() {
        let (cb, _) = breaker(CircuitBreakerConfig::default());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(succeed(&cb).await.is_ok());
    }

    #[tokio::test]
    async fn opens_after_threshold_and_skips_the_call() {
        let (cb, _) = breaker(CircuitBreakerConfig::default().with_failure_threshold(3));
        for _ in 0..3 {
            assert!(matches!(fail(&cb).await, Err(BreakerError::Inner("boom"))));
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let calls = AtomicU32::new(0);
        let result = cb
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), &'static str>(())
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Open { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cb.stats().rejections, 1);
    }

    #[tokio::test]
    async fn non_consecutive_failures_do_not_trip() {
        let (cb, _) = breaker(CircuitBreakerConfig::default().with_failure_threshold(3));
        fail(&cb).await.ok();
        fail(&cb).await.ok();
        succeed(&cb).await.unwrap();
        fail(&cb).await.ok();
        fail(&cb).await.ok();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_closes_after_success_threshold() {
        let config = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_success_threshold(2)
            .with_open_timeout(Duration::from_secs(10));
        let (cb, clock) = breaker(config);
        fail(&cb).await.ok();
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(10));
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let config = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_success_threshold(3)
            .with_open_timeout(Duration::from_secs(5));
        let (cb, clock) = breaker(config);
        fail(&cb).await.ok();
        clock.advance(Duration::from_secs(5));
        succeed(&cb).await.unwrap();
        fail(&cb).await.ok();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(matches!(succeed(&cb).await, Err(BreakerError::Open { .. })));
    }

    #[tokio::test]
    async fn half_open_caps_concurrent_probes() {
        let config = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_open_timeout(Duration::from_secs(1));
        let (cb, clock) = breaker(config);
        fail(&cb).await.ok();
        clock.advance(Duration::from_secs(1));

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let probe = cb.execute(|| async move {
            rx.await.ok();
            Ok::<(), &'static str>(())
        });
        let second = async {
            tokio::task::yield_now().await;
            let r = succeed(&cb).await;
            tx.send(()).ok();
            r
        };
        let (first, second) = tokio::join!(probe, second);
        assert!(first.is_ok());
        assert!(matches!(second, Err(BreakerError::HalfOpenSaturated { .. })));
    }

    #[tokio::test]
    async fn reset_forces_closed() {
        let (cb, _) = breaker(CircuitBreakerConfig::default().with_failure_threshold(1));
        fail(&cb).await.ok();
        assert_eq!(cb.state(), CircuitState::Open);
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn state_change_callback_sees_transitions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let clock = Arc::new(ManualClock::new());
        let cb = CircuitBreaker::new(
            "summarizer",
            CircuitBreakerConfig::default()
                .with_failure_threshold(1)
                .with_success_threshold(1)
                .with_open_timeout(Duration::from_secs(1)),
            clock.clone(),
        )
        .with_state_change(move |_, from, to| sink.lock().unwrap().push((from, to)));

        fail(&cb).await.ok();
        clock.advance(Duration::from_secs(1));
        succeed(&cb).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[tokio::test]
    async fn neutral_errors_do_not_count() {
        let (cb, _) = breaker(CircuitBreakerConfig::default().with_failure_threshold(1));
        let r = cb
            .execute_if(|| async { Err::<(), _>("cancelled") }, |_| false)
            .await;
        assert!(r.is_err());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn stats_count_every_outcome() {
        let (cb, _) = breaker(CircuitBreakerConfig::default().with_failure_threshold(2));
        succeed(&cb).await.unwrap();
        fail(&cb).await.ok();
        fail(&cb).await.ok();
        fail(&cb).await.ok();
        let stats = cb.stats();
        assert_eq!(stats.name, "summarizer");
        assert_eq!(stats.state, CircuitState::Open);
        assert_eq!(stats.requests, 4);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.rejections, 1);
        assert_eq!(CircuitState::HalfOpen.to_string(), "half-open");
        assert_eq!(
            serde_json::to_value(CircuitState::HalfOpen).unwrap(),
            serde_json::json!("half-open")
        );
        assert_eq!(serde_json::to_value(&stats).unwrap()["state"], "open");
    }
}
