// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the summarization path.

use std::time::Duration;

use thiserror::Error;
use voxquote_resilience::{BackoffError, BreakerError, LimitError, Retryable};

/// One failed call to the remote summarizer.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The service answered with a non-success status.
    #[error("summarizer returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("request to summarizer failed: {0}")]
    Transport(String),

    #[error("summarizer request timed out")]
    Timeout,

    /// The reply arrived but could not be understood.
    #[error("invalid summarizer response: {0}")]
    Decode(String),

    #[error("summarizer request cancelled")]
    Cancelled,
}

impl Retryable for UpstreamError {
    fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            UpstreamError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    fn is_cancelled(&self) -> bool {
        matches!(self, UpstreamError::Cancelled)
    }

    fn is_terminal(&self) -> bool {
        matches!(self, UpstreamError::Decode(_))
    }
}

/// Why a resilient summarization did not produce a summary.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// The quote limiter refused the request; the upstream was not called.
    #[error("summarization rate limited: {0}")]
    RateLimited(LimitError),

    /// The circuit is open; the upstream was not called.
    #[error("circuit `{name}` is open")]
    CircuitOpen { name: String },

    #[error("circuit `{name}` is half-open and at its probe limit")]
    CircuitSaturated { name: String },

    #[error("summarizer failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: UpstreamError,
    },

    /// A failure the retry policy does not retry (bad request, auth).
    #[error("summarizer rejected the request: {0}")]
    Rejected(#[source] UpstreamError),

    #[error("summarization cancelled")]
    Cancelled,

    #[error("summarizer configuration error: {0}")]
    Config(String),
}

impl SummarizeError {
    /// Advice for a `Retry-After` response header.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SummarizeError::RateLimited(e) => e.retry_after(),
            SummarizeError::RetriesExhausted { last, .. } => last.retry_after(),
            _ => None,
        }
    }

    /// True when the upstream was never contacted.
    pub fn is_rejected_locally(&self) -> bool {
        matches!(
            self,
            SummarizeError::RateLimited(_)
                | SummarizeError::CircuitOpen { .. }
                | SummarizeError::CircuitSaturated { .. }
        )
    }
}

impl From<LimitError> for SummarizeError {
    fn from(e: LimitError) -> Self {
        match e {
            LimitError::Cancelled => SummarizeError::Cancelled,
            other => SummarizeError::RateLimited(other),
        }
    }
}

fn from_breaker(e: BreakerError<UpstreamError>) -> SummarizeError {
    match e {
        BreakerError::Open { name } => SummarizeError::CircuitOpen { name },
        BreakerError::HalfOpenSaturated { name } => SummarizeError::CircuitSaturated { name },
        BreakerError::Inner(UpstreamError::Cancelled) => SummarizeError::Cancelled,
        BreakerError::Inner(e) => SummarizeError::Rejected(e),
    }
}

impl From<BackoffError<BreakerError<UpstreamError>>> for SummarizeError {
    fn from(e: BackoffError<BreakerError<UpstreamError>>) -> Self {
        match e {
            BackoffError::Cancelled => SummarizeError::Cancelled,
            BackoffError::NotRetryable(inner) => from_breaker(inner),
            BackoffError::RetriesExhausted {
                attempts,
                last: BreakerError::Inner(last),
            } => SummarizeError::RetriesExhausted { attempts, last },
            BackoffError::RetriesExhausted { last, .. } => from_breaker(last),
        }
    }
}
