// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost-bounded, failure-tolerant call summarization for Voxquote.
//!
//! [`HttpSummarizer`] talks to the remote model API. [`ResilientSummarizer`]
//! wraps any [`Summarizer`] with the quote limiter, retry policy and circuit
//! breaker from `voxquote-resilience`.

pub mod client;
pub mod error;
pub mod resilient;
pub mod summarizer;
pub mod types;

pub use client::HttpSummarizer;
pub use error::{SummarizeError, UpstreamError};
pub use resilient::{ResilienceStats, ResilientSummarizer};
pub use summarizer::Summarizer;
pub use types::{Summary, SummaryRequest};
