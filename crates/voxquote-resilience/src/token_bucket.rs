// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window token bucket and the minute/hour/day bucket set built on it.
//!
//! Neither type is synchronized; the limiters that own them hold a mutex.

use std::time::{Duration, Instant};

use serde::Serialize;
use strum::{Display, EnumString};

/// A rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Minute,
    Hour,
    Day,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Minute, Window::Hour, Window::Day];

    pub fn period(self) -> Duration {
        match self {
            Window::Minute => Duration::from_secs(60),
            Window::Hour => Duration::from_secs(60 * 60),
            Window::Day => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// A counter of up to `max` permits that refills completely once `period`
/// has elapsed since the last refill.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    max: u32,
    period: Duration,
    tokens: u32,
    last_reset: Instant,
}

impl TokenBucket {
    /// A full bucket whose first window starts at `now`.
    pub fn new(max: u32, period: Duration, now: Instant) -> Self {
        Self {
            max,
            period,
            tokens: max,
            last_reset: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_reset) >= self.period {
            self.tokens = self.max;
            self.last_reset = now;
        }
    }

    /// Take one token if any remain after applying a pending refill.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Return one token, never exceeding `max`.
    pub fn release(&mut self) {
        self.tokens = self.tokens.saturating_add(1).min(self.max);
    }

    /// Tokens currently held, without applying a pending refill.
    pub fn remaining(&self) -> u32 {
        self.tokens
    }

    /// Tokens a caller would see at `now`.
    pub fn remaining_at(&self, now: Instant) -> u32 {
        if now.saturating_duration_since(self.last_reset) >= self.period {
            self.max
        } else {
            self.tokens
        }
    }

    /// Time until the next full refill. Zero if one is already due.
    pub fn reset_in(&self, now: Instant) -> Duration {
        self.period
            .saturating_sub(now.saturating_duration_since(self.last_reset))
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Per-window remaining counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowRemaining {
    pub minute: u32,
    pub hour: u32,
    pub day: u32,
}

/// Minute, hour and day buckets acquired together.
#[derive(Debug, Clone)]
pub struct WindowBuckets {
    minute: TokenBucket,
    hour: TokenBucket,
    day: TokenBucket,
}

impl WindowBuckets {
    pub fn new(per_minute: u32, per_hour: u32, per_day: u32, now: Instant) -> Self {
        Self {
            minute: TokenBucket::new(per_minute, Window::Minute.period(), now),
            hour: TokenBucket::new(per_hour, Window::Hour.period(), now),
            day: TokenBucket::new(per_day, Window::Day.period(), now),
        }
    }

    pub fn bucket(&self, window: Window) -> &TokenBucket {
        match window {
            Window::Minute => &self.minute,
            Window::Hour => &self.hour,
            Window::Day => &self.day,
        }
    }

    /// Take one token from every window in minute, hour, day order.
    ///
    /// On rejection, tokens already taken from earlier windows are returned
    /// and the rejecting window is reported.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Window> {
        if !self.minute.try_acquire(now) {
            return Err(Window::Minute);
        }
        if !self.hour.try_acquire(now) {
            self.minute.release();
            return Err(Window::Hour);
        }
        if !self.day.try_acquire(now) {
            self.hour.release();
            self.minute.release();
            return Err(Window::Day);
        }
        Ok(())
    }

    /// Return one token to every window.
    pub fn release(&mut self) {
        self.minute.release();
        self.hour.release();
        self.day.release();
    }

    pub fn remaining(&self, now: Instant) -> WindowRemaining {
        WindowRemaining {
            minute: self.minute.remaining_at(now),
            hour: self.hour.remaining_at(now),
            day: self.day.remaining_at(now),
        }
    }

    /// The window with the fewest tokens left at `now`, ties going to the
    /// shorter window.
    pub fn tightest(&self, now: Instant) -> Window {
        Window::ALL
            .into_iter()
            .min_by_key(|w| self.bucket(*w).remaining_at(now))
            .unwrap_or(Window::Minute)
    }
}
