// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversions from the TOML configuration sections.

use std::time::Duration;

use voxquote_config::model;

use crate::backoff::{AdaptiveConfig, BackoffConfig};
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::quote_limiter::QuoteLimits;
use crate::user_limiter::UserLimits;

impl From<&model::CircuitBreakerConfig> for CircuitBreakerConfig {
    fn from(c: &model::CircuitBreakerConfig) -> Self {
        CircuitBreakerConfig::default()
            .with_failure_threshold(c.failure_threshold)
            .with_success_threshold(c.success_threshold)
            .with_open_timeout(Duration::from_secs(c.open_timeout_secs))
            .with_half_open_max_requests(c.half_open_max_requests)
    }
}

impl From<&model::BackoffConfig> for BackoffConfig {
    fn from(c: &model::BackoffConfig) -> Self {
        BackoffConfig {
            initial_delay: Duration::from_millis(c.initial_delay_ms),
            max_delay: Duration::from_millis(c.max_delay_ms),
            multiplier: c.multiplier,
            max_retries: c.max_retries,
            jitter: c.jitter.clamp(0.0, 1.0),
            retryable_status_codes: c.retryable_status_codes.clone(),
            always_retry_429: c.always_retry_429,
            honor_retry_after: c.honor_retry_after,
        }
    }
}

impl From<&model::AdaptiveBackoffConfig> for AdaptiveConfig {
    fn from(c: &model::AdaptiveBackoffConfig) -> Self {
        AdaptiveConfig {
            success_streak: c.success_streak.max(1),
            failure_streak: c.failure_streak.max(1),
            min_multiplier: c.min_multiplier,
            max_multiplier: c.max_multiplier,
            step: c.step,
        }
    }
}

impl From<&model::QuoteLimitsConfig> for QuoteLimits {
    fn from(c: &model::QuoteLimitsConfig) -> Self {
        QuoteLimits {
            per_minute: c.max_per_minute,
            per_hour: c.max_per_hour,
            per_day: c.max_per_day,
            max_concurrent: c.max_concurrent,
            poll_interval: Duration::from_millis(c.wait_poll_ms.max(1)),
        }
    }
}

impl From<&model::UserLimitsConfig> for UserLimits {
    fn from(c: &model::UserLimitsConfig) -> Self {
        UserLimits {
            per_minute: c.max_per_minute,
            per_hour: c.max_per_hour,
            per_day: c.max_per_day,
            stale_after: Duration::from_secs(c.stale_after_secs),
            sweep_interval: Duration::from_secs(c.sweep_interval_secs.max(1)),
        }
    }
}
