// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook request with a restorable body.
//!
//! Verification reads the raw body to compute an HMAC and parsing reads it
//! again. The body is held as [`Bytes`], taken out by whoever consumes it and
//! put back afterwards, so both stages observe identical bytes.

use bytes::Bytes;
use http::HeaderMap;

use crate::error::VoxquoteError;

/// An HTTP webhook delivery as seen by a provider adapter.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl WebhookRequest {
    pub fn new(path: impl Into<String>, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            headers,
            body: Some(body.into()),
        }
    }

    /// Build from an [`http::Request`] whose body has already been collected.
    pub fn from_http(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            path: parts.uri.path().to_string(),
            headers: parts.headers,
            body: Some(body),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Header value as UTF-8, trimmed. Non-UTF-8 values are treated as absent.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Remove the body. Fails if a previous consumer never restored it.
    pub fn take_body(&mut self) -> Result<Bytes, VoxquoteError> {
        self.body
            .take()
            .ok_or_else(|| VoxquoteError::Internal("webhook body already consumed".into()))
    }

    /// Put a previously taken body back.
    pub fn restore_body(&mut self, body: Bytes) {
        self.body = Some(body);
    }

    /// Take the body, run `f` on it, then restore it regardless of the outcome.
    pub fn with_body<T>(
        &mut self,
        f: impl FnOnce(&WebhookRequest, &Bytes) -> T,
    ) -> Result<T, VoxquoteError> {
        let body = self.take_body()?;
        let out = f(self, &body);
        self.restore_body(body);
        Ok(out)
    }

    /// Whether the body is currently present.
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}
