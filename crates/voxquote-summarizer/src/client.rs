// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the remote summarization API (Messages API wire format).
//!
//! [`HttpSummarizer`] makes exactly one request per call and classifies the
//! outcome into an [`UpstreamError`]. Retry, rate limiting and circuit
//! breaking live in [`crate::ResilientSummarizer`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use voxquote_config::model::SummarizerConfig;

use crate::error::{SummarizeError, UpstreamError};
use crate::summarizer::Summarizer;
use crate::types::{
    ApiErrorResponse, MessagesRequest, MessagesResponse, Summary, SummaryRequest, WireMessage,
};

/// Summarizer backed by a Messages-API-compatible HTTP endpoint.
#[derive(Clone)]
pub struct HttpSummarizer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for HttpSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSummarizer")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

impl HttpSummarizer {
    /// Build a client from the `[summarizer]` section. Fails when no API key
    /// is configured.
    pub fn new(config: &SummarizerConfig) -> Result<Self, SummarizeError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                SummarizeError::Config(
                    "summarizer.api_key is not set (or VOXQUOTE_SUMMARIZER_API_KEY)".into(),
                )
            })?;

        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| SummarizeError::Config(format!("invalid API key header value: {e}")))?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(&config.api_version).map_err(|e| {
                SummarizeError::Config(format!("invalid API version header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| SummarizeError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Point the client at another endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, request: &SummaryRequest) -> Result<Summary, UpstreamError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: request.system_prompt(),
            messages: vec![WireMessage {
                role: "user",
                content: request.user_prompt(),
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        debug!(status = %status, call_id = %request.call_id, "summarizer response received");

        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(api) => format!("{}: {}", api.error.kind, api.error.message),
                Err(_) if text.is_empty() => status.to_string(),
                Err(_) => text,
            };
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message,
                retry_after,
            });
        }

        let text = response.text().await.map_err(classify_transport)?;
        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| UpstreamError::Decode(format!("failed to parse response: {e}")))?;
        let summary = parsed
            .text()
            .ok_or_else(|| UpstreamError::Decode("response contained no text".into()))?;

        Ok(Summary {
            text: summary,
            model: parsed.model,
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
        })
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(
        &self,
        cancel: &CancellationToken,
        request: &SummaryRequest,
    ) -> Result<Summary, UpstreamError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UpstreamError::Cancelled),
            result = self.send(request) => result,
        }
    }
}

fn classify_transport(e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout
    } else if e.is_decode() {
        UpstreamError::Decode(e.to_string())
    } else {
        UpstreamError::Transport(e.to_string())
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxquote_core::ProviderType;
    use voxquote_resilience::Retryable;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: String) -> SummarizerConfig {
        SummarizerConfig {
            endpoint,
            api_key: Some("test-api-key".into()),
            model: "test-model".into(),
            max_tokens: 256,
            ..Default::default()
        }
    }

    async fn client_for(server: &MockServer) -> HttpSummarizer {
        HttpSummarizer::new(&test_config(format!("{}/v1/messages", server.uri()))).unwrap()
    }

    fn request() -> SummaryRequest {
        SummaryRequest {
            provider: ProviderType::Retell,
            call_id: "call-9".into(),
            transcript: "caller: I need a fence".into(),
            extracted: None,
            instructions: None,
        }
    }

    fn ok_body() -> serde_json::Value {
        serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Caller wants a fence."}],
            "model": "test-model",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 42, "output_tokens": 7}
        })
    }

    #[tokio::test]
    async fn summarize_success_sends_headers_and_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "max_tokens": 256
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;

        let summary = client_for(&server)
            .await
            .summarize(&CancellationToken::new(), &request())
            .await
            .unwrap();
        assert_eq!(summary.text, "Caller wants a fence.");
        assert_eq!(summary.input_tokens, 42);
        assert_eq!(summary.output_tokens, 7);
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "7")
                    .set_body_json(serde_json::json!({
                        "error": {"type": "rate_limit_error", "message": "slow down"}
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .summarize(&CancellationToken::new(), &request())
            .await
            .unwrap_err();
        match &err {
            UpstreamError::Status {
                status, message, ..
            } => {
                assert_eq!(*status, 429);
                assert!(message.contains("rate_limit_error"), "got: {message}");
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn empty_reply_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "test-model",
                "content": []
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .summarize(&CancellationToken::new(), &request())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn cancellation_abandons_in_flight_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(ok_body())
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let err = client.summarize(&cancel, &request()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Cancelled));
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let config = SummarizerConfig {
            api_key: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(
            HttpSummarizer::new(&config),
            Err(SummarizeError::Config(_))
        ));
    }

    #[test]
    fn debug_hides_api_key() {
        let client = HttpSummarizer::new(&test_config("http://localhost/v1".into())).unwrap();
        let out = format!("{client:?}");
        assert!(!out.contains("test-api-key"));
        assert!(out.contains("[redacted]"));
    }

    #[test]
    fn retry_after_seconds_only() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static(" 12 "));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }
}
