// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted summarizer for deterministic tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use voxquote_summarizer::{Summarizer, Summary, SummaryRequest, UpstreamError};

/// A summarizer that replays queued outcomes.
///
/// Outcomes are popped from a FIFO queue. When the queue is empty, a
/// "mock summary" success is returned.
#[derive(Debug, Default)]
pub struct MockSummarizer {
    outcomes: Mutex<VecDeque<Result<String, UpstreamError>>>,
    calls: AtomicU32,
    delay: Option<Duration>,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call (honouring cancellation).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn push_ok(&self, text: impl Into<String>) {
        self.outcomes.lock().await.push_back(Ok(text.into()));
    }

    pub async fn push_err(&self, err: UpstreamError) {
        self.outcomes.lock().await.push_back(Err(err));
    }

    /// Queue `n` copies of an upstream status error.
    pub async fn push_status(&self, status: u16, n: usize) {
        let mut outcomes = self.outcomes.lock().await;
        for _ in 0..n {
            outcomes.push_back(Err(UpstreamError::Status {
                status,
                message: format!("mock status {status}"),
                retry_after: None,
            }));
        }
    }

    /// Number of times `summarize` was invoked.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(
        &self,
        cancel: &CancellationToken,
        request: &SummaryRequest,
    ) -> Result<Summary, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UpstreamError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        let next = self.outcomes.lock().await.pop_front();
        let text = next.unwrap_or_else(|| Ok("mock summary".to_string()))?;
        Ok(Summary {
            text,
            model: "mock-model".to_string(),
            input_tokens: request.transcript.len() as u32,
            output_tokens: 20,
        })
    }
}
