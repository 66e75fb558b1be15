// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The summarization seam.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::UpstreamError;
use crate::types::{Summary, SummaryRequest};

/// One attempt at summarizing a call.
///
/// Implementations make a single upstream call and report failures as an
/// [`UpstreamError`]; they should return [`UpstreamError::Cancelled`]
/// promptly once `cancel` fires.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        cancel: &CancellationToken,
        request: &SummaryRequest,
    ) -> Result<Summary, UpstreamError>;
}

#[async_trait]
impl<S: Summarizer + ?Sized> Summarizer for std::sync::Arc<S> {
    async fn summarize(
        &self,
        cancel: &CancellationToken,
        request: &SummaryRequest,
    ) -> Result<Summary, UpstreamError> {
        (**self).summarize(cancel, request).await
    }
}
