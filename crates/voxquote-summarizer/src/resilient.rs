// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quote limiter, backoff and circuit breaker composed around a
//! [`Summarizer`].
//!
//! A call first takes a [`QuotePermit`](voxquote_resilience::QuotePermit)
//! (waiting up to `max_wait` when one is configured). The permit is held for
//! the whole retry sequence, so one logical summarization consumes one quota
//! token no matter how many attempts it takes. Each attempt runs through the
//! circuit breaker; an open breaker ends the sequence immediately.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use voxquote_core::{CallEvent, Clock};
use voxquote_config::VoxquoteConfig;
use voxquote_resilience::{
    AdaptiveBackoff, AdaptiveConfig, AdaptiveSnapshot, Backoff, BackoffConfig, BackoffError,
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState,
    QuoteLimiter, QuoteLimiterStats, QuoteLimits, Retryable,
};

use crate::error::{SummarizeError, UpstreamError};
use crate::summarizer::Summarizer;
use crate::types::{Summary, SummaryRequest};

const BREAKER_NAME: &str = "summarizer";

#[derive(Debug)]
enum RetryPolicy {
    Fixed(Backoff),
    Adaptive(AdaptiveBackoff),
}

/// Diagnostic view of the guards around the summarizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResilienceStats {
    pub breaker: CircuitBreakerStats,
    pub quotes: QuoteLimiterStats,
    pub adaptive: Option<AdaptiveSnapshot>,
}

/// A [`Summarizer`] guarded by a quote limiter, retry policy and circuit
/// breaker.
#[derive(Debug)]
pub struct ResilientSummarizer<S> {
    inner: S,
    limiter: Arc<QuoteLimiter>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    max_wait: Option<Duration>,
}

impl<S: Summarizer> ResilientSummarizer<S> {
    pub fn new(
        inner: S,
        limiter: Arc<QuoteLimiter>,
        breaker: CircuitBreaker,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            inner,
            limiter,
            breaker,
            retry: RetryPolicy::Fixed(Backoff::new(backoff)),
            max_wait: None,
        }
    }

    /// Switch to an adaptive multiplier seeded from the current base policy.
    pub fn with_adaptive(mut self, adaptive: AdaptiveConfig) -> Self {
        let base = match &self.retry {
            RetryPolicy::Fixed(b) => b.config().clone(),
            RetryPolicy::Adaptive(_) => return self,
        };
        self.retry = RetryPolicy::Adaptive(AdaptiveBackoff::new(base, adaptive));
        self
    }

    /// Wait up to `max_wait` for quota instead of failing fast.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Wire every guard from configuration. The breaker logs its
    /// transitions.
    pub fn from_config(inner: S, config: &VoxquoteConfig, clock: Arc<dyn Clock>) -> Self {
        let limiter = Arc::new(QuoteLimiter::new(
            QuoteLimits::from(&config.quote_limits),
            clock.clone(),
        ));
        let breaker = CircuitBreaker::new(
            BREAKER_NAME,
            CircuitBreakerConfig::from(&config.circuit_breaker),
            clock,
        )
        .with_state_change(log_transition);

        let this = Self::new(inner, limiter, breaker, BackoffConfig::from(&config.backoff));
        if config.backoff.adaptive.enabled {
            this.with_adaptive(AdaptiveConfig::from(&config.backoff.adaptive))
        } else {
            this
        }
    }

    pub fn limiter(&self) -> &Arc<QuoteLimiter> {
        &self.limiter
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn stats(&self) -> ResilienceStats {
        ResilienceStats {
            breaker: self.breaker.stats(),
            quotes: self.limiter.stats(),
            adaptive: match &self.retry {
                RetryPolicy::Adaptive(a) => Some(a.snapshot()),
                RetryPolicy::Fixed(_) => None,
            },
        }
    }

    /// Summarize `request`, holding one quota slot across every attempt.
    pub async fn summarize(
        &self,
        cancel: &CancellationToken,
        request: &SummaryRequest,
    ) -> Result<Summary, SummarizeError> {
        let _permit = match self.max_wait {
            Some(max) => self.limiter.wait_permit(cancel, Some(max)).await?,
            None => self.limiter.acquire_permit()?,
        };

        let attempt = |n: u32| async move {
            if n > 0 {
                debug!(call_id = %request.call_id, attempt = n, "retrying summarization");
            }
            self.breaker
                .execute_if(
                    || self.inner.summarize(cancel, request),
                    |e: &UpstreamError| !e.is_cancelled(),
                )
                .await
        };

        let result: Result<Summary, BackoffError<BreakerError<UpstreamError>>> = match &self.retry
        {
            RetryPolicy::Fixed(b) => b.execute(cancel, attempt).await,
            RetryPolicy::Adaptive(a) => a.execute(cancel, attempt).await,
        };

        match result {
            Ok(summary) => {
                debug!(
                    call_id = %request.call_id,
                    provider = %request.provider,
                    output_tokens = summary.output_tokens,
                    "call summarized"
                );
                Ok(summary)
            }
            Err(e) => {
                let err = SummarizeError::from(e);
                warn!(call_id = %request.call_id, error = %err, "summarization failed");
                Err(err)
            }
        }
    }

    /// Summarize a normalized call event with the default instructions.
    pub async fn summarize_event(
        &self,
        cancel: &CancellationToken,
        event: &CallEvent,
    ) -> Result<Summary, SummarizeError> {
        self.summarize(cancel, &SummaryRequest::from_event(event)).await
    }
}

fn log_transition(name: &str, from: CircuitState, to: CircuitState) {
    match to {
        CircuitState::Open => warn!(breaker = name, %from, %to, "circuit opened"),
        _ => info!(breaker = name, %from, %to, "circuit state changed"),
    }
}
