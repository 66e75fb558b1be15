// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the resilience primitives.

use std::time::Duration;

use thiserror::Error;

use crate::token_bucket::Window;

/// A rate limiter refused to admit a request.
///
/// Each exhausted dimension is a distinct variant so callers can give
/// different retry advice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("concurrency limit reached ({max} in flight)")]
    Concurrency { max: u32 },

    #[error("per-minute quota exhausted")]
    Minute { retry_after: Duration },

    #[error("per-hour quota exhausted")]
    Hour { retry_after: Duration },

    #[error("per-day quota exhausted")]
    Day { retry_after: Duration },

    #[error("wait for rate limit cancelled")]
    Cancelled,

    #[error("gave up waiting for rate limit after {waited:?}")]
    WaitTimeout { waited: Duration },
}

impl LimitError {
    pub(crate) fn for_window(window: Window, retry_after: Duration) -> Self {
        match window {
            Window::Minute => LimitError::Minute { retry_after },
            Window::Hour => LimitError::Hour { retry_after },
            Window::Day => LimitError::Day { retry_after },
        }
    }

    /// How long the caller should wait before trying again, if known.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LimitError::Minute { retry_after }
            | LimitError::Hour { retry_after }
            | LimitError::Day { retry_after } => Some(*retry_after),
            LimitError::Concurrency { .. } => Some(Duration::from_secs(1)),
            LimitError::Cancelled | LimitError::WaitTimeout { .. } => None,
        }
    }

    /// The exhausted time window, for quota rejections.
    pub fn window(&self) -> Option<Window> {
        match self {
            LimitError::Minute { .. } => Some(Window::Minute),
            LimitError::Hour { .. } => Some(Window::Hour),
            LimitError::Day { .. } => Some(Window::Day),
            _ => None,
        }
    }

    /// Short machine-readable label used in stats and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            LimitError::Concurrency { .. } => "concurrency",
            LimitError::Minute { .. } => "minute",
            LimitError::Hour { .. } => "hour",
            LimitError::Day { .. } => "day",
            LimitError::Cancelled => "cancelled",
            LimitError::WaitTimeout { .. } => "wait_timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_errors_carry_retry_advice() {
        let err = LimitError::for_window(Window::Hour, Duration::from_secs(90));
        assert_eq!(err, LimitError::Hour { retry_after: Duration::from_secs(90) });
        assert_eq!(err.retry_after(), Some(Duration::from_secs(90)));
        assert_eq!(err.window(), Some(Window::Hour));
        assert_eq!(err.reason(), "hour");
    }

    #[test]
    fn cancellation_has_no_retry_advice() {
        assert_eq!(LimitError::Cancelled.retry_after(), None);
        assert_eq!(LimitError::Cancelled.window(), None);
    }
}
