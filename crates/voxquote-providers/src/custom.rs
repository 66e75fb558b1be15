// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter for self-hosted voice agents that post a near-canonical payload.
//!
//! Path and signature header are configurable; timestamps are Unix seconds.

use serde::Deserialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use voxquote_core::{
    CallEvent, CallStatus, ExtractedData, Provider, ProviderType, VoxquoteError, WebhookRequest,
};

use crate::common::{self, ParseSettings, Secret};
use crate::timestamp;
use crate::validate::{PayloadCheck, sanitize_opt, sanitize_text};

pub const DEFAULT_CUSTOM_WEBHOOK_PATH: &str = "/webhooks/custom";
pub const DEFAULT_CUSTOM_SIGNATURE_HEADER: &str = "X-Signature";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CustomPayload {
    call_id: Option<String>,
    status: Option<String>,
    to_number: Option<String>,
    from_number: Option<String>,
    caller_name: Option<String>,
    started_at: Option<Value>,
    ended_at: Option<Value>,
    duration_secs: Option<Value>,
    transcript: Option<String>,
    transcript_entries: Vec<CustomLine>,
    extracted: Option<Map<String, Value>>,
    recording_url: Option<String>,
    error: Option<CustomError>,
    summary: Option<String>,
    disposition: Option<String>,
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CustomLine {
    role: String,
    text: String,
    offset_secs: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CustomError {
    message: Option<String>,
    code: Option<String>,
}

/// Canonical names, plus the hyphenated spellings agents tend to emit.
fn custom_status(raw: &str) -> Option<CallStatus> {
    raw.replace('-', "_").parse().ok()
}

/// Adapter for an in-house agent.
#[derive(Debug, Clone)]
pub struct CustomProvider {
    secret: Secret,
    webhook_path: String,
    signature_header: String,
    settings: ParseSettings,
}

impl Default for CustomProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CustomProvider {
    pub fn new(webhook_secret: Option<String>) -> Self {
        Self {
            secret: Secret::new(webhook_secret),
            webhook_path: DEFAULT_CUSTOM_WEBHOOK_PATH.to_string(),
            signature_header: DEFAULT_CUSTOM_SIGNATURE_HEADER.to_string(),
            settings: ParseSettings::default(),
        }
    }

    pub fn with_webhook_path(mut self, path: impl Into<String>) -> Self {
        self.webhook_path = path.into();
        self
    }

    pub fn with_signature_header(mut self, header: impl Into<String>) -> Self {
        self.signature_header = header.into();
        self
    }

    pub fn with_settings(mut self, settings: ParseSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl Provider for CustomProvider {
    fn name(&self) -> ProviderType {
        ProviderType::Custom
    }

    fn webhook_path(&self) -> &str {
        &self.webhook_path
    }

    fn verify_webhook(&self, req: &mut WebhookRequest) -> Result<(), VoxquoteError> {
        common::verify_signed_body(self.name(), &self.secret, &self.signature_header, req)
    }

    fn parse_webhook(
        &self,
        cancel: &CancellationToken,
        req: &mut WebhookRequest,
    ) -> Result<CallEvent, VoxquoteError> {
        common::ensure_not_cancelled(cancel)?;
        let payload: CustomPayload = common::read_payload(self.name(), &self.settings, req)?;

        let entries: Vec<_> = payload
            .transcript_entries
            .iter()
            .filter_map(|l| common::entry(&l.role, &l.text, l.offset_secs))
            .collect();
        let transcript = match payload.transcript.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => common::render_transcript(&entries),
        };

        let mut check = PayloadCheck::new();
        check
            .call_id(payload.call_id.as_deref())
            .phone("to_number", payload.to_number.as_deref())
            .phone("from_number", payload.from_number.as_deref())
            .transcript("transcript", &transcript)
            .recording_url(payload.recording_url.as_deref());
        for (i, e) in entries.iter().enumerate() {
            check.transcript(&format!("transcript_entries[{i}]"), &e.text);
        }
        check
            .finish()
            .map_err(|errors| VoxquoteError::Validation {
                provider: self.name(),
                errors,
            })?;
        common::ensure_not_cancelled(cancel)?;

        let status = common::resolve_status(
            self.name(),
            payload.status.as_deref(),
            &self.settings,
            custom_status,
        );
        let extracted = payload
            .extracted
            .as_ref()
            .and_then(ExtractedData::from_map)
            .map(|d| d.map_text(sanitize_text));
        let caller_name = payload
            .caller_name
            .or_else(|| extracted.as_ref().and_then(|d| d.caller_name.clone()));
        let error = payload.error.unwrap_or_default();

        let mut builder = CallEvent::builder(self.name(), payload.call_id.unwrap_or_default())
            .to_number(payload.to_number)
            .from_number(payload.from_number)
            .caller_name(sanitize_opt(caller_name.as_deref()))
            .status(status)
            .started_at(timestamp::from_unix_secs(payload.started_at.as_ref()))
            .ended_at(timestamp::from_unix_secs(payload.ended_at.as_ref()))
            .reported_duration_secs(timestamp::seconds(payload.duration_secs.as_ref()))
            .transcript(sanitize_text(&transcript))
            .transcript_entries(common::sanitize_entries(entries))
            .extracted(extracted)
            .recording_url(payload.recording_url)
            .error(
                sanitize_opt(error.message.as_deref()),
                sanitize_opt(error.code.as_deref()),
            )
            .summary(sanitize_opt(payload.summary.as_deref()))
            .disposition(sanitize_opt(payload.disposition.as_deref()));
        if let Some(metadata) = payload.metadata {
            for (key, value) in metadata {
                builder = builder.metadata(key, value);
            }
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, HeaderValue};
    use voxquote_test_utils::sign_hex;

    const BODY: &str = r#"{
        "call_id": "agent-77",
        "status": "no-answer",
        "to_number": "+1 (212) 555-0199",
        "started_at": 1772366400,
        "ended_at": 1772366430,
        "transcript_entries": [{"role": "agent", "text": "Hello?", "offset_secs": 0.0}],
        "error": {"message": "nobody picked up", "code": "NA"},
        "metadata": {"campaign": "spring"}
    }"#;

    #[test]
    fn parses_canonical_shape() {
        let provider = CustomProvider::new(None);
        let mut req = WebhookRequest::new("/webhooks/custom", HeaderMap::new(), BODY);
        let event = provider
            .parse_webhook(&CancellationToken::new(), &mut req)
            .unwrap();
        assert_eq!(event.status(), CallStatus::NoAnswer);
        assert_eq!(event.duration_secs(), 30);
        assert_eq!(event.transcript(), "agent: Hello?");
        assert_eq!(event.error_code(), Some("NA"));
        assert_eq!(event.raw_metadata()["campaign"], "spring");
    }

    #[test]
    fn configurable_path_and_header() {
        let provider = CustomProvider::new(Some("k".into()))
            .with_webhook_path("/hooks/agent")
            .with_signature_header("X-Agent-Signature");
        assert_eq!(provider.webhook_path(), "/hooks/agent");

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-agent-signature",
            HeaderValue::from_str(&format!("sha256={}", sign_hex("k", BODY))).unwrap(),
        );
        let mut req = WebhookRequest::new("/hooks/agent", headers, BODY);
        assert!(provider.validate_webhook(&mut req));

        let mut unsigned = WebhookRequest::new("/hooks/agent", HeaderMap::new(), BODY);
        assert!(!provider.validate_webhook(&mut unsigned));
    }

    #[test]
    fn canonical_status_names() {
        assert_eq!(custom_status("in_progress"), Some(CallStatus::InProgress));
        assert_eq!(custom_status("in-progress"), Some(CallStatus::InProgress));
        assert_eq!(custom_status("transferred"), Some(CallStatus::Transferred));
        assert_eq!(custom_status("exploded"), None);
    }
}
