// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost guard for the paid summarization call: a concurrency cap plus
//! minute, hour and day quotas.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use voxquote_core::Clock;

use crate::error::LimitError;
use crate::token_bucket::{WindowBuckets, WindowRemaining};

/// Quota settings for a [`QuoteLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteLimits {
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
    pub max_concurrent: u32,
    /// How often [`QuoteLimiter::wait`] retries.
    pub poll_interval: Duration,
}

impl Default for QuoteLimits {
    fn default() -> Self {
        Self {
            per_minute: 10,
            per_hour: 100,
            per_day: 500,
            max_concurrent: 3,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl QuoteLimits {
    pub fn with_per_minute(mut self, n: u32) -> Self {
        self.per_minute = n;
        self
    }

    pub fn with_per_hour(mut self, n: u32) -> Self {
        self.per_hour = n;
        self
    }

    pub fn with_per_day(mut self, n: u32) -> Self {
        self.per_day = n;
        self
    }

    pub fn with_max_concurrent(mut self, n: u32) -> Self {
        self.max_concurrent = n;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Diagnostic snapshot of a [`QuoteLimiter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteLimiterStats {
    pub in_flight: u32,
    pub max_concurrent: u32,
    pub remaining: WindowRemaining,
    pub accepted: u64,
    pub rejected: u64,
    /// Reason label of the most recent rejection.
    pub last_rejection: Option<&'static str>,
}

#[derive(Debug)]
struct State {
    buckets: WindowBuckets,
    in_flight: u32,
    accepted: u64,
    rejected: u64,
    last_rejection: Option<&'static str>,
}

/// Multi-window, concurrency-capped gate.
///
/// Every successful [`acquire`](Self::acquire) must be paired with exactly
/// one [`release`](Self::release); [`acquire_permit`](Self::acquire_permit)
/// does the pairing automatically.
#[derive(Debug)]
pub struct QuoteLimiter {
    limits: QuoteLimits,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl QuoteLimiter {
    pub fn new(limits: QuoteLimits, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(State {
                buckets: WindowBuckets::new(limits.per_minute, limits.per_hour, limits.per_day, now),
                in_flight: 0,
                accepted: 0,
                rejected: 0,
                last_rejection: None,
            }),
            limits,
            clock,
        }
    }

    pub fn limits(&self) -> &QuoteLimits {
        &self.limits
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit one request or say which guard refused it.
    ///
    /// A rejection leaves every bucket and the concurrency count exactly as
    /// they were.
    pub fn acquire(&self) -> Result<(), LimitError> {
        let outcome = self.admit();
        if let Err(e) = &outcome {
            self.record_rejection(e);
        }
        outcome
    }

    fn admit(&self) -> Result<(), LimitError> {
        let now = self.clock.now();
        let mut state = self.lock();

        if state.in_flight >= self.limits.max_concurrent {
            return Err(LimitError::Concurrency {
                max: self.limits.max_concurrent,
            });
        }
        if let Err(window) = state.buckets.try_acquire(now) {
            return Err(LimitError::for_window(
                window,
                state.buckets.bucket(window).reset_in(now),
            ));
        }
        state.in_flight += 1;
        state.accepted += 1;
        Ok(())
    }

    fn record_rejection(&self, e: &LimitError) {
        let mut state = self.lock();
        state.rejected += 1;
        state.last_rejection = Some(e.reason());
        debug!(reason = e.reason(), "quote request rejected");
    }

    /// Give back a concurrency slot. Never drops below zero.
    pub fn release(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    /// Acquire and return a guard that releases on drop.
    pub fn acquire_permit(&self) -> Result<QuotePermit<'_>, LimitError> {
        self.acquire()?;
        Ok(QuotePermit { limiter: self })
    }

    /// Retry [`acquire`](Self::acquire) every poll interval until it
    /// succeeds, `cancel` fires, or `max_wait` elapses.
    ///
    /// Polls are not counted individually: a wait that ends in success
    /// records no rejection, a wait that gives up records one.
    pub async fn wait(
        &self,
        cancel: &CancellationToken,
        max_wait: Option<Duration>,
    ) -> Result<(), LimitError> {
        let started = tokio::time::Instant::now();
        let mut refused: Option<LimitError> = None;
        let outcome = loop {
            if cancel.is_cancelled() {
                break Err(LimitError::Cancelled);
            }
            match self.admit() {
                Ok(()) => return Ok(()),
                Err(e) => refused = Some(e),
            }

            let waited = started.elapsed();
            let mut pause = self.limits.poll_interval;
            if let Some(max) = max_wait {
                if waited >= max {
                    break Err(LimitError::WaitTimeout { waited });
                }
                pause = pause.min(max - waited);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(LimitError::Cancelled),
                _ = tokio::time::sleep(pause) => {}
            }
        };

        // One rejection per abandoned wait, labelled with the last refusal.
        if let Some(e) = &refused {
            self.record_rejection(e);
        }
        outcome
    }

    /// [`wait`](Self::wait), returning a guard that releases on drop.
    pub async fn wait_permit(
        &self,
        cancel: &CancellationToken,
        max_wait: Option<Duration>,
    ) -> Result<QuotePermit<'_>, LimitError> {
        self.wait(cancel, max_wait).await?;
        Ok(QuotePermit { limiter: self })
    }

    pub fn in_flight(&self) -> u32 {
        self.lock().in_flight
    }

    pub fn remaining(&self) -> WindowRemaining {
        let now = self.clock.now();
        self.lock().buckets.remaining(now)
    }

    pub fn stats(&self) -> QuoteLimiterStats {
        let now = self.clock.now();
        let state = self.lock();
        QuoteLimiterStats {
            in_flight: state.in_flight,
            max_concurrent: self.limits.max_concurrent,
            remaining: state.buckets.remaining(now),
            accepted: state.accepted,
            rejected: state.rejected,
            last_rejection: state.last_rejection,
        }
    }
}

/// A held concurrency slot. Released when dropped, including during unwind.
#[derive(Debug)]
#[must_use = "dropping the permit releases the slot immediately"]
pub struct QuotePermit<'a> {
    limiter: &'a QuoteLimiter,
}

impl Drop for QuotePermit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxquote_core::ManualClock;

    fn limiter(limits: QuoteLimits) -> (QuoteLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (QuoteLimiter::new(limits, clock.clone()), clock)
    }

    #[test]
    fn sixth_request_in_a_minute_is_rejected() {
        let (q, _) = limiter(
            QuoteLimits::default()
                .with_per_minute(5)
                .with_max_concurrent(100),
        );
        for _ in 0..5 {
            q.acquire().unwrap();
        }
        let err = q.acquire().unwrap_err();
        assert!(matches!(err, LimitError::Minute { .. }), "{err:?}");
        assert_eq!(q.in_flight(), 5);
    }

    #[test]
    fn concurrency_cap_checked_first() {
        let (q, _) = limiter(QuoteLimits::default().with_max_concurrent(1));
        q.acquire().unwrap();
        let before = q.remaining();
        assert_eq!(
            q.acquire().unwrap_err(),
            LimitError::Concurrency { max: 1 }
        );
        assert_eq!(q.remaining(), before);
        q.release();
        assert!(q.acquire().is_ok());
    }

    #[test]
    fn day_rejection_returns_minute_and_hour_tokens() {
        let (q, _) = limiter(
            QuoteLimits::default()
                .with_per_minute(10)
                .with_per_hour(10)
                .with_per_day(1)
                .with_max_concurrent(10),
        );
        q.acquire().unwrap();
        let before = q.remaining();
        assert!(matches!(q.acquire(), Err(LimitError::Day { .. })));
        assert_eq!(q.remaining(), before);
        assert_eq!(q.stats().last_rejection, Some("day"));
    }

    #[test]
    fn minute_window_refills() {
        let (q, clock) = limiter(
            QuoteLimits::default()
                .with_per_minute(1)
                .with_max_concurrent(10),
        );
        q.acquire().unwrap();
        match q.acquire() {
            Err(LimitError::Minute { retry_after }) => {
                assert_eq!(retry_after, Duration::from_secs(60))
            }
            other => panic!("expected minute rejection, got {other:?}"),
        }
        clock.advance(Duration::from_secs(60));
        assert!(q.acquire().is_ok());
    }

    #[test]
    fn release_never_underflows() {
        let (q, _) = limiter(QuoteLimits::default());
        q.release();
        q.release();
        assert_eq!(q.in_flight(), 0);
    }

    #[test]
    fn permit_releases_on_drop_and_panic() {
        let (q, _) = limiter(QuoteLimits::default().with_max_concurrent(1));
        {
            let _permit = q.acquire_permit().unwrap();
            assert_eq!(q.in_flight(), 1);
        }
        assert_eq!(q.in_flight(), 0);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _permit = q.acquire_permit().unwrap();
            panic!("summarizer blew up");
        }));
        assert!(result.is_err());
        assert_eq!(q.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_succeeds_once_a_slot_frees() {
        let (q, _) = limiter(QuoteLimits::default().with_max_concurrent(1));
        let q = Arc::new(q);
        q.acquire().unwrap();

        let releaser = Arc::clone(&q);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            releaser.release();
        });

        let cancel = CancellationToken::new();
        q.wait(&cancel, Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(q.in_flight(), 1);
        assert_eq!(q.stats().rejected, 0);
        assert_eq!(q.stats().accepted, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out() {
        let (q, _) = limiter(QuoteLimits::default().with_max_concurrent(1));
        q.acquire().unwrap();
        let err = q
            .wait(&CancellationToken::new(), Some(Duration::from_millis(350)))
            .await
            .unwrap_err();
        assert!(matches!(err, LimitError::WaitTimeout { .. }), "{err:?}");
        let stats = q.stats();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.last_rejection, Some("concurrency"));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_honors_cancellation() {
        let (q, _) = limiter(QuoteLimits::default().with_max_concurrent(1));
        q.acquire().unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        assert_eq!(q.wait(&cancel, None).await, Err(LimitError::Cancelled));
    }
}
