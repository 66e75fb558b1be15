// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for Voxquote.
//!
//! - [`TokenBucket`]: fixed-window permit counter underlying every limiter.
//! - [`CircuitBreaker`]: closed/open/half-open guard around one remote call.
//! - [`Backoff`] and [`AdaptiveBackoff`]: cancellable exponential retry.
//! - [`QuoteLimiter`]: concurrency cap plus minute/hour/day quotas for the
//!   paid summarization call.
//! - [`UserRateLimiter`]: per-principal quotas for authenticated endpoints.
//!
//! All timing decisions read an injected [`voxquote_core::Clock`]. Each
//! settings type converts `From` its `voxquote.toml` section.

pub mod backoff;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod quote_limiter;
pub mod token_bucket;
pub mod user_limiter;

pub use backoff::{
    AdaptiveBackoff, AdaptiveConfig, AdaptiveSnapshot, Backoff, BackoffConfig, BackoffError,
    Retryable,
};
pub use circuit_breaker::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState,
};
pub use error::LimitError;
pub use quote_limiter::{QuoteLimiter, QuoteLimiterStats, QuoteLimits, QuotePermit};
pub use token_bucket::{TokenBucket, Window, WindowBuckets, WindowRemaining};
pub use user_limiter::{
    RateLimitOutcome, UserLimiterStats, UserLimits, UserRateLimit, UserRateLimiter,
};
