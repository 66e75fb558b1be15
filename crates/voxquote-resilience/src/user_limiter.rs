// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-principal minute/hour/day rate limiting for authenticated endpoints.
//!
//! [`UserRateLimit`] is the seam: [`UserRateLimiter`] keeps buckets in
//! memory, and an external store (shared across replicas) can implement the
//! same trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use voxquote_core::{Clock, VoxquoteError};

use crate::token_bucket::{Window, WindowBuckets, WindowRemaining};

/// Settings for a [`UserRateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserLimits {
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
    /// Principals idle this long are evicted by the sweep.
    pub stale_after: Duration,
    pub sweep_interval: Duration,
}

impl Default for UserLimits {
    fn default() -> Self {
        Self {
            per_minute: 60,
            per_hour: 1_000,
            per_day: 10_000,
            stale_after: Duration::from_secs(86_400),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

/// Result of one rate-limit check, shaped for `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitOutcome {
    /// Quota of the reported window.
    pub limit: u32,
    /// Tokens left in the reported window after this check.
    pub remaining: u32,
    /// Time until the reported window refills.
    pub reset_in: Duration,
    /// The window that refused the request, if any. When `None` the
    /// reported window is the one closest to exhaustion.
    pub rejected: Option<Window>,
}

impl RateLimitOutcome {
    pub fn is_allowed(&self) -> bool {
        self.rejected.is_none()
    }

    /// `Retry-After` advice for rejected requests.
    pub fn retry_after(&self) -> Option<Duration> {
        self.rejected.map(|_| self.reset_in)
    }
}

/// Diagnostic snapshot of a user limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserLimiterStats {
    pub tracked_principals: usize,
    pub accepted: u64,
    pub rejected: u64,
    pub last_rejection: Option<Window>,
}

/// Per-principal rate limiting, in memory or backed by a shared store.
#[async_trait]
pub trait UserRateLimit: Send + Sync {
    /// Count one request for `principal` and report whether it is allowed.
    async fn check(&self, principal: &str) -> Result<RateLimitOutcome, VoxquoteError>;

    async fn stats(&self) -> Result<UserLimiterStats, VoxquoteError>;
}

#[derive(Debug)]
struct Entry {
    buckets: WindowBuckets,
    last_seen: Instant,
}

#[derive(Debug)]
struct Shared {
    limits: UserLimits,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Arc<Mutex<Entry>>>>,
    accepted: AtomicU64,
    rejected: AtomicU64,
    last_rejection: Mutex<Option<Window>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn entry(&self, principal: &str, now: Instant) -> Arc<Mutex<Entry>> {
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get(principal) {
            return Arc::clone(entry);
        }
        let entry = Arc::new(Mutex::new(Entry {
            buckets: WindowBuckets::new(
                self.limits.per_minute,
                self.limits.per_hour,
                self.limits.per_day,
                now,
            ),
            last_seen: now,
        }));
        entries.insert(principal.to_string(), Arc::clone(&entry));
        entry
    }

    fn check(&self, principal: &str) -> RateLimitOutcome {
        let now = self.clock.now();
        let entry = self.entry(principal, now);
        let mut entry = lock(&entry);
        entry.last_seen = now;

        match entry.buckets.try_acquire(now) {
            Ok(()) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                let window = entry.buckets.tightest(now);
                let bucket = entry.buckets.bucket(window);
                RateLimitOutcome {
                    limit: bucket.max(),
                    remaining: bucket.remaining_at(now),
                    reset_in: bucket.reset_in(now),
                    rejected: None,
                }
            }
            Err(window) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                *lock(&self.last_rejection) = Some(window);
                debug!(principal, window = %window, "user rate limit exceeded");
                let bucket = entry.buckets.bucket(window);
                RateLimitOutcome {
                    limit: bucket.max(),
                    remaining: 0,
                    reset_in: bucket.reset_in(now),
                    rejected: Some(window),
                }
            }
        }
    }

    /// Evict principals idle longer than `stale_after`.
    ///
    /// The map lock is held only to snapshot and to remove; each entry's
    /// idleness is read under its own lock.
    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let snapshot: Vec<(String, Arc<Mutex<Entry>>)> = lock(&self.entries)
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        let is_stale =
            |entry: &Mutex<Entry>| now.saturating_duration_since(lock(entry).last_seen) >= self.limits.stale_after;

        let stale: Vec<(String, Arc<Mutex<Entry>>)> = snapshot
            .into_iter()
            .filter(|(_, entry)| is_stale(entry))
            .collect();
        if stale.is_empty() {
            return 0;
        }

        let mut entries = lock(&self.entries);
        let mut evicted = 0;
        for (key, seen) in stale {
            // Skip entries replaced or touched since the snapshot.
            let still_same = entries
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &seen) && is_stale(current));
            if still_same {
                entries.remove(&key);
                evicted += 1;
            }
        }
        evicted
    }
}

/// In-memory [`UserRateLimit`] with one bucket set per principal.
///
/// When built with [`UserRateLimiter::with_sweeper`] a background task evicts
/// idle principals until [`shutdown`](Self::shutdown) is called or the
/// limiter is dropped.
#[derive(Debug)]
pub struct UserRateLimiter {
    shared: Arc<Shared>,
    sweeper: CancellationToken,
}

impl UserRateLimiter {
    /// A limiter without a background sweep. Call [`sweep`](Self::sweep)
    /// manually if principals churn.
    pub fn new(limits: UserLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                limits,
                clock,
                entries: Mutex::new(HashMap::new()),
                accepted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                last_rejection: Mutex::new(None),
            }),
            sweeper: CancellationToken::new(),
        }
    }

    /// A limiter whose sweep runs every `sweep_interval` on the current
    /// tokio runtime.
    pub fn with_sweeper(limits: UserLimits, clock: Arc<dyn Clock>) -> Self {
        let limiter = Self::new(limits, clock);
        let shared = Arc::clone(&limiter.shared);
        let cancel = limiter.sweeper.clone();
        let interval = limits.sweep_interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("user rate limiter sweep stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = shared.sweep();
                        if evicted > 0 {
                            debug!(evicted, "evicted idle rate-limit principals");
                        }
                    }
                }
            }
        });

        limiter
    }

    pub fn limits(&self) -> &UserLimits {
        &self.shared.limits
    }

    /// Synchronous form of [`UserRateLimit::check`].
    pub fn check_now(&self, principal: &str) -> RateLimitOutcome {
        self.shared.check(principal)
    }

    /// Remaining tokens for `principal` without consuming any.
    pub fn remaining(&self, principal: &str) -> WindowRemaining {
        let now = self.shared.clock.now();
        let entry = lock(&self.shared.entries).get(principal).cloned();
        match entry {
            Some(entry) => lock(&entry).buckets.remaining(now),
            None => WindowRemaining {
                minute: self.shared.limits.per_minute,
                hour: self.shared.limits.per_hour,
                day: self.shared.limits.per_day,
            },
        }
    }

    /// Forget `principal`'s usage.
    pub fn reset(&self, principal: &str) {
        lock(&self.shared.entries).remove(principal);
    }

    /// Run one eviction pass now. Returns the number of principals removed.
    pub fn sweep(&self) -> usize {
        self.shared.sweep()
    }

    pub fn tracked_principals(&self) -> usize {
        lock(&self.shared.entries).len()
    }

    pub fn stats_now(&self) -> UserLimiterStats {
        UserLimiterStats {
            tracked_principals: self.tracked_principals(),
            accepted: self.shared.accepted.load(Ordering::Relaxed),
            rejected: self.shared.rejected.load(Ordering::Relaxed),
            last_rejection: *lock(&self.shared.last_rejection),
        }
    }

    /// Stop the background sweep, if any.
    pub fn shutdown(&self) {
        self.sweeper.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.sweeper.is_cancelled()
    }
}

impl Drop for UserRateLimiter {
    fn drop(&mut self) {
        self.sweeper.cancel();
    }
}

#[async_trait]
impl UserRateLimit for UserRateLimiter {
    async fn check(&self, principal: &str) -> Result<RateLimitOutcome, VoxquoteError> {
        Ok(self.check_now(principal))
    }

    async fn stats(&self) -> Result<UserLimiterStats, VoxquoteError> {
        Ok(self.stats_now())
    }
}
