// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential backoff with jitter, plus an adaptive variant that tunes its
//! multiplier from recent success and failure streaks.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::circuit_breaker::BreakerError;

/// Classification hooks the backoff engine uses to decide whether an error
/// is worth retrying.
pub trait Retryable {
    /// HTTP-style status code carried by the error, if any.
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Server-supplied delay hint.
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// The caller's own cancellation or deadline. Never retried.
    fn is_cancelled(&self) -> bool {
        false
    }

    /// Known to fail again if repeated (bad request, auth failure).
    fn is_terminal(&self) -> bool {
        false
    }
}

/// A circuit-open rejection is terminal: retrying it only burns the budget
/// while the breaker cools down.
impl<E: Retryable> Retryable for BreakerError<E> {
    fn status_code(&self) -> Option<u16> {
        match self {
            BreakerError::Inner(e) => e.status_code(),
            _ => None,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            BreakerError::Inner(e) => e.retry_after(),
            _ => None,
        }
    }

    fn is_cancelled(&self) -> bool {
        matches!(self, BreakerError::Inner(e) if e.is_cancelled())
    }

    fn is_terminal(&self) -> bool {
        match self {
            BreakerError::Inner(e) => e.is_terminal(),
            _ => true,
        }
    }
}

/// Error returned by [`Backoff::execute`].
#[derive(Debug, Error)]
pub enum BackoffError<E> {
    /// The cancellation token fired, during an attempt or a delay.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation failed with an error that is not retried.
    #[error("non-retryable failure: {0}")]
    NotRetryable(#[source] E),

    /// Every allowed attempt failed.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: E,
    },
}

impl<E> BackoffError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BackoffError::Cancelled)
    }

    /// The last operation error, if the operation ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BackoffError::Cancelled => None,
            BackoffError::NotRetryable(e) => Some(e),
            BackoffError::RetriesExhausted { last, .. } => Some(last),
        }
    }
}

/// Retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Retries after the first attempt. 0 retries without limit.
    pub max_retries: u32,
    /// Noise fraction in `[0, 1]`, applied as `delay * (1 +/- jitter)`.
    pub jitter: f64,
    /// Status codes that are retried. Errors without a status are always
    /// retried.
    pub retryable_status_codes: Vec<u16>,
    pub always_retry_429: bool,
    pub honor_retry_after: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: 3,
            jitter: 0.1,
            retryable_status_codes: vec![408, 429, 500, 502, 503, 504, 529],
            always_retry_429: true,
            honor_retry_after: true,
        }
    }
}

impl BackoffConfig {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn with_retryable_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.retryable_status_codes = codes;
        self
    }

    /// Un-jittered delay before retry number `attempt + 1`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else if capped.is_nan() {
            self.initial_delay.min(self.max_delay)
        } else {
            self.max_delay
        }
    }

    /// Delay with jitter applied, clamped to `[0, max_delay]`.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        if self.jitter <= 0.0 {
            return Duration::from_secs_f64(base);
        }
        let noise = rand::thread_rng().gen_range(-1.0..=1.0) * self.jitter * base;
        Duration::from_secs_f64((base + noise).clamp(0.0, self.max_delay.as_secs_f64()))
    }

    /// Whether `err` is eligible for another attempt, ignoring the budget.
    pub fn is_retryable<E: Retryable>(&self, err: &E) -> bool {
        if err.is_cancelled() || err.is_terminal() {
            return false;
        }
        match err.status_code() {
            Some(429) if self.always_retry_429 => true,
            Some(code) => self.retryable_status_codes.contains(&code),
            None => true,
        }
    }

    fn delay_for<E: Retryable>(&self, attempt: u32, err: &E) -> Duration {
        if self.honor_retry_after
            && let Some(hint) = err.retry_after()
        {
            return hint.min(self.max_delay);
        }
        self.jittered_delay(attempt)
    }
}

/// What happened during one retry sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SequenceReport {
    /// Failures that were eligible for retry, budget aside.
    retryable_failures: u32,
    succeeded: bool,
}

/// Retries a fallible async operation with exponential, jittered delay.
#[derive(Debug, Clone, Default)]
pub struct Backoff {
    config: BackoffConfig,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Run `op` until it succeeds, fails terminally, exhausts the retry
    /// budget, or `cancel` fires. `op` receives the zero-based attempt number.
    ///
    /// Cancellation wins immediately over both an in-flight attempt and a
    /// pending delay.
    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T, BackoffError<E>>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        run(&self.config, cancel, op).await.0
    }
}

async fn run<T, E, F, Fut>(
    config: &BackoffConfig,
    cancel: &CancellationToken,
    mut op: F,
) -> (Result<T, BackoffError<E>>, SequenceReport)
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    let mut report = SequenceReport::default();
    loop {
        if cancel.is_cancelled() {
            return (Err(BackoffError::Cancelled), report);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return (Err(BackoffError::Cancelled), report),
            r = op(attempt) => r,
        };

        let err = match outcome {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "operation succeeded after retry");
                }
                report.succeeded = true;
                return (Ok(value), report);
            }
            Err(e) => e,
        };

        if err.is_cancelled() {
            return (Err(BackoffError::Cancelled), report);
        }
        if !config.is_retryable(&err) {
            debug!(attempt, error = %err, "failure is not retryable");
            return (Err(BackoffError::NotRetryable(err)), report);
        }
        report.retryable_failures += 1;
        if config.max_retries != 0 && attempt >= config.max_retries {
            return (
                Err(BackoffError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: err,
                }),
                report,
            );
        }

        let delay = config.delay_for(attempt, &err);
        debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after transient failure"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return (Err(BackoffError::Cancelled), report),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt = attempt.saturating_add(1);
    }
}

/// Bounds and step sizes for [`AdaptiveBackoff`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveConfig {
    /// Consecutive successful attempts before the multiplier shrinks.
    pub success_streak: u32,
    /// Consecutive failed attempts before the multiplier grows.
    pub failure_streak: u32,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
    pub step: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            success_streak: 5,
            failure_streak: 3,
            min_multiplier: 1.5,
            max_multiplier: 4.0,
            step: 0.25,
        }
    }
}

impl AdaptiveConfig {
    fn sanitized(self) -> Self {
        let min = if self.min_multiplier.is_finite() {
            self.min_multiplier.max(1.0)
        } else {
            1.0
        };
        let max = if self.max_multiplier.is_finite() {
            self.max_multiplier.max(min)
        } else {
            min
        };
        let step = if self.step.is_finite() {
            self.step.max(0.0)
        } else {
            0.0
        };
        Self {
            min_multiplier: min,
            max_multiplier: max,
            step,
            ..self
        }
    }
}

/// Diagnostic view of an [`AdaptiveBackoff`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdaptiveSnapshot {
    pub multiplier: f64,
    pub success_streak: u32,
    pub failure_streak: u32,
}

#[derive(Debug)]
struct Streaks {
    multiplier: f64,
    successes: u32,
    failures: u32,
}

/// A [`Backoff`] whose multiplier drifts toward `min_multiplier` while the
/// upstream is healthy and toward `max_multiplier` under sustained failure.
///
/// The multiplier is read once at the start of each sequence and adjusted
/// after it ends, never mid-sequence.
#[derive(Debug)]
pub struct AdaptiveBackoff {
    base: BackoffConfig,
    adaptive: AdaptiveConfig,
    streaks: Mutex<Streaks>,
}

impl AdaptiveBackoff {
    /// Out-of-range bounds are repaired rather than rejected: a non-finite
    /// or sub-1.0 floor becomes 1.0, a ceiling below the floor becomes the
    /// floor, and a non-finite or negative step becomes zero.
    pub fn new(base: BackoffConfig, adaptive: AdaptiveConfig) -> Self {
        let adaptive = adaptive.sanitized();
        let multiplier = if base.multiplier.is_finite() {
            base.multiplier
                .clamp(adaptive.min_multiplier, adaptive.max_multiplier)
        } else {
            adaptive.min_multiplier
        };
        Self {
            base,
            adaptive,
            streaks: Mutex::new(Streaks {
                multiplier,
                successes: 0,
                failures: 0,
            }),
        }
    }

    pub fn snapshot(&self) -> AdaptiveSnapshot {
        let s = self.streaks.lock().unwrap_or_else(PoisonError::into_inner);
        AdaptiveSnapshot {
            multiplier: s.multiplier,
            success_streak: s.successes,
            failure_streak: s.failures,
        }
    }

    pub fn multiplier(&self) -> f64 {
        self.snapshot().multiplier
    }

    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T, BackoffError<E>>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let config = BackoffConfig {
            multiplier: self.multiplier(),
            ..self.base.clone()
        };
        let (result, report) = run(&config, cancel, op).await;
        self.observe(report.retryable_failures, report.succeeded);
        result
    }

    /// Feed `failed_attempts` failures, then one success if `succeeded`.
    fn observe(&self, failed_attempts: u32, succeeded: bool) {
        let mut s = self.streaks.lock().unwrap_or_else(PoisonError::into_inner);
        let a = &self.adaptive;
        let max = a.max_multiplier;

        for _ in 0..failed_attempts {
            s.successes = 0;
            s.failures += 1;
            if s.failures >= a.failure_streak.max(1) {
                s.multiplier = (s.multiplier + a.step).min(max);
                s.failures = 0;
                debug!(multiplier = s.multiplier, "backoff multiplier raised after failure streak");
            }
        }
        if succeeded {
            s.failures = 0;
            s.successes += 1;
            if s.successes >= a.success_streak.max(1) {
                s.multiplier = (s.multiplier - a.step).max(a.min_multiplier);
                s.successes = 0;
                debug!(multiplier = s.multiplier, "backoff multiplier lowered after success streak");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        status: Option<u16>,
        retry_after: Option<Duration>,
        cancelled: bool,
    }

    impl TestError {
        fn status(code: u16) -> Self {
            Self {
                status: Some(code),
                retry_after: None,
                cancelled: false,
            }
        }

        fn network() -> Self {
            Self {
                status: None,
                retry_after: None,
                cancelled: false,
            }
        }
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error {:?}", self.status)
        }
    }

    impl std::error::Error for TestError {}

    impl Retryable for TestError {
        fn status_code(&self) -> Option<u16> {
            self.status
        }
        fn retry_after(&self) -> Option<Duration> {
            self.retry_after
        }
        fn is_cancelled(&self) -> bool {
            self.cancelled
        }
    }

    fn fast() -> BackoffConfig {
        BackoffConfig::default()
            .with_initial_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(100))
            .with_jitter(0.0)
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let config = fast();
        assert_eq!(config.base_delay(0), Duration::from_millis(10));
        assert_eq!(config.base_delay(1), Duration::from_millis(20));
        assert_eq!(config.base_delay(2), Duration::from_millis(40));
        assert_eq!(config.base_delay(10), Duration::from_millis(100));
        assert_eq!(config.base_delay(u32::MAX), Duration::from_millis(100));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let config = fast().with_jitter(0.5);
        for _ in 0..200 {
            let d = config.jittered_delay(1);
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(30), "{d:?}");
        }
    }

    #[test]
    fn classification() {
        let config = fast().with_retryable_status_codes(vec![503]);
        assert!(config.is_retryable(&TestError::status(503)));
        assert!(config.is_retryable(&TestError::status(429)));
        assert!(!config.is_retryable(&TestError::status(400)));
        assert!(config.is_retryable(&TestError::network()));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let backoff = Backoff::new(fast().with_max_retries(3));
        let result = backoff
            .execute(&CancellationToken::new(), |_| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError::status(503))
                } else {
                    Ok("done")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_makes_one_attempt() {
        let calls = AtomicU32::new(0);
        let backoff = Backoff::new(fast());
        let result: Result<(), _> = backoff
            .execute(&CancellationToken::new(), |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::status(401))
            })
            .await;
        assert!(matches!(result, Err(BackoffError::NotRetryable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let backoff = Backoff::new(fast());
        let result: Result<(), _> = backoff
            .execute(&CancellationToken::new(), |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError {
                    cancelled: true,
                    ..TestError::network()
                })
            })
            .await;
        assert!(matches!(result, Err(BackoffError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_budget_is_distinguishable() {
        let calls = AtomicU32::new(0);
        let backoff = Backoff::new(fast().with_max_retries(2));
        let result: Result<(), _> = backoff
            .execute(&CancellationToken::new(), |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::network())
            })
            .await;
        match result {
            Err(BackoffError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_delay() {
        let backoff = Backoff::new(
            fast()
                .with_initial_delay(Duration::from_secs(3600))
                .with_max_delay(Duration::from_secs(3600)),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let started = tokio::time::Instant::now();

        let run = backoff.execute(&cancel, |_| async { Err::<(), _>(TestError::network()) });
        let cancel_soon = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        };
        let (result, ()) = tokio::join!(run, cancel_soon);

        assert!(matches!(result, Err(BackoffError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_hint_is_honored_and_capped() {
        let backoff = Backoff::new(fast().with_max_retries(1));
        let started = tokio::time::Instant::now();
        let calls = AtomicU32::new(0);
        let _ = backoff
            .execute(&CancellationToken::new(), |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError {
                    retry_after: Some(Duration::from_secs(60)),
                    ..TestError::status(429)
                })
            })
            .await;
        // Capped at max_delay (100ms), not the 60s hint.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100) && elapsed < Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn circuit_rejection_is_terminal_for_backoff() {
        let calls = AtomicU32::new(0);
        let backoff = Backoff::new(fast());
        let result: Result<(), _> = backoff
            .execute(&CancellationToken::new(), |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BreakerError::<TestError>::Open {
                    name: "summarizer".into(),
                })
            })
            .await;
        assert!(matches!(result, Err(BackoffError::NotRetryable(BreakerError::Open { .. }))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn adaptive_multiplier_moves_with_streaks() {
        let adaptive = AdaptiveBackoff::new(
            fast().with_multiplier(2.0).with_max_retries(5),
            AdaptiveConfig {
                success_streak: 2,
                failure_streak: 2,
                min_multiplier: 1.5,
                max_multiplier: 3.0,
                step: 0.5,
            },
        );
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            adaptive
                .execute(&cancel, |_| async { Ok::<_, TestError>(()) })
                .await
                .unwrap();
        }
        assert_eq!(adaptive.multiplier(), 1.5);

        let calls = AtomicU32::new(0);
        adaptive
            .execute(&cancel, |_| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 4 {
                    Err(TestError::network())
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap();
        // Four failures raise twice; the closing success starts a new streak.
        let snap = adaptive.snapshot();
        assert_eq!(snap.multiplier, 2.5);
        assert_eq!(snap.success_streak, 1);
        assert_eq!(snap.failure_streak, 0);
    }

    #[test]
    fn adaptive_repairs_unusable_bounds() {
        let inverted = AdaptiveBackoff::new(
            fast().with_multiplier(2.0),
            AdaptiveConfig {
                min_multiplier: 5.0,
                max_multiplier: 2.0,
                ..AdaptiveConfig::default()
            },
        );
        assert_eq!(inverted.multiplier(), 5.0);

        let nan = AdaptiveBackoff::new(
            fast().with_multiplier(2.0),
            AdaptiveConfig {
                min_multiplier: f64::NAN,
                max_multiplier: f64::INFINITY,
                step: f64::NAN,
                ..AdaptiveConfig::default()
            },
        );
        assert_eq!(nan.multiplier(), 1.0);
        nan.observe(10, true);
        assert_eq!(nan.multiplier(), 1.0);
    }
}
