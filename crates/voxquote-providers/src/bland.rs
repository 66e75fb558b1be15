// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bland AI post-call webhook adapter.
//!
//! Authenticated by an HMAC-SHA256 hex digest of the body in
//! `X-Webhook-Signature`. Timestamps are RFC 3339; `call_length` is minutes.

use serde::Deserialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use voxquote_core::{
    CallEvent, CallStatus, ExtractedData, Provider, ProviderType, VoxquoteError, WebhookRequest,
};

use crate::common::{self, ParseSettings, Secret};
use crate::timestamp;
use crate::validate::{PayloadCheck, sanitize_opt, sanitize_text};

pub const BLAND_WEBHOOK_PATH: &str = "/webhooks/bland";
pub const BLAND_SIGNATURE_HEADER: &str = "X-Webhook-Signature";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BlandPayload {
    call_id: Option<String>,
    to: Option<String>,
    from: Option<String>,
    status: Option<String>,
    completed: Option<bool>,
    answered_by: Option<String>,
    started_at: Option<Value>,
    end_at: Option<Value>,
    /// Minutes.
    call_length: Option<Value>,
    concatenated_transcript: Option<String>,
    transcripts: Vec<BlandLine>,
    recording_url: Option<String>,
    summary: Option<String>,
    disposition_tag: Option<String>,
    error_message: Option<String>,
    analysis: Option<Map<String, Value>>,
    variables: Option<Map<String, Value>>,
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BlandLine {
    user: String,
    text: String,
}

fn bland_status(raw: &str) -> Option<CallStatus> {
    Some(match raw {
        "queued" | "new" | "scheduled" => CallStatus::Pending,
        "started" | "in-progress" | "in_progress" | "ongoing" => CallStatus::InProgress,
        "completed" | "complete" | "ended" => CallStatus::Completed,
        "failed" | "error" | "canceled" | "cancelled" => CallStatus::Failed,
        "no-answer" | "no_answer" | "busy" | "unanswered" => CallStatus::NoAnswer,
        "voicemail" => CallStatus::Voicemail,
        "transferred" => CallStatus::Transferred,
        _ => return None,
    })
}

/// Adapter for Bland AI.
#[derive(Debug, Clone, Default)]
pub struct BlandProvider {
    secret: Secret,
    settings: ParseSettings,
}

impl BlandProvider {
    pub fn new(webhook_secret: Option<String>) -> Self {
        Self {
            secret: Secret::new(webhook_secret),
            settings: ParseSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ParseSettings) -> Self {
        self.settings = settings;
        self
    }

    fn status(&self, payload: &BlandPayload) -> CallStatus {
        if payload
            .answered_by
            .as_deref()
            .is_some_and(|a| a.eq_ignore_ascii_case("voicemail"))
        {
            return CallStatus::Voicemail;
        }
        if payload.status.is_none() && payload.completed == Some(true) {
            return CallStatus::Completed;
        }
        common::resolve_status(
            self.name(),
            payload.status.as_deref(),
            &self.settings,
            bland_status,
        )
    }
}

impl Provider for BlandProvider {
    fn name(&self) -> ProviderType {
        ProviderType::Bland
    }

    fn webhook_path(&self) -> &str {
        BLAND_WEBHOOK_PATH
    }

    fn verify_webhook(&self, req: &mut WebhookRequest) -> Result<(), VoxquoteError> {
        common::verify_signed_body(self.name(), &self.secret, BLAND_SIGNATURE_HEADER, req)
    }

    fn parse_webhook(
        &self,
        cancel: &CancellationToken,
        req: &mut WebhookRequest,
    ) -> Result<CallEvent, VoxquoteError> {
        common::ensure_not_cancelled(cancel)?;
        let payload: BlandPayload = common::read_payload(self.name(), &self.settings, req)?;

        let entries: Vec<_> = payload
            .transcripts
            .iter()
            .filter_map(|line| common::entry(&line.user, &line.text, None))
            .collect();
        let transcript = match payload.concatenated_transcript.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => common::render_transcript(&entries),
        };

        let mut check = PayloadCheck::new();
        check
            .call_id(payload.call_id.as_deref())
            .phone("to", payload.to.as_deref())
            .phone("from", payload.from.as_deref())
            .transcript("transcript", &transcript)
            .recording_url(payload.recording_url.as_deref());
        for (i, e) in entries.iter().enumerate() {
            check.transcript(&format!("transcripts[{i}]"), &e.text);
        }
        check
            .finish()
            .map_err(|errors| VoxquoteError::Validation {
                provider: self.name(),
                errors,
            })?;
        common::ensure_not_cancelled(cancel)?;

        let status = self.status(&payload);
        let minutes = timestamp::seconds(payload.call_length.as_ref());
        let extracted = payload
            .analysis
            .as_ref()
            .and_then(ExtractedData::from_map)
            .map(|d| d.map_text(sanitize_text));
        let caller_name = extracted.as_ref().and_then(|d| d.caller_name.clone());

        let mut builder = CallEvent::builder(self.name(), payload.call_id.unwrap_or_default())
            .to_number(payload.to)
            .from_number(payload.from)
            .caller_name(caller_name)
            .status(status)
            .started_at(timestamp::from_rfc3339(payload.started_at.as_ref()))
            .ended_at(timestamp::from_rfc3339(payload.end_at.as_ref()))
            .reported_duration_secs(minutes.map(|m| m * 60.0))
            .transcript(sanitize_text(&transcript))
            .transcript_entries(common::sanitize_entries(entries))
            .extracted(extracted)
            .recording_url(payload.recording_url)
            .summary(sanitize_opt(payload.summary.as_deref()))
            .disposition(sanitize_opt(payload.disposition_tag.as_deref()));
        if status == CallStatus::Failed {
            builder = builder.error(sanitize_opt(payload.error_message.as_deref()), None);
        }
        if let Some(variables) = payload.variables {
            builder = builder.metadata("variables", Value::Object(variables));
        }
        if let Some(metadata) = payload.metadata {
            builder = builder.metadata("metadata", Value::Object(metadata));
        }
        if let Some(answered_by) = payload.answered_by {
            builder = builder.metadata("answered_by", Value::String(answered_by));
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxquote_test_utils::fixtures;

    fn request(body: &str) -> WebhookRequest {
        WebhookRequest::new(BLAND_WEBHOOK_PATH, Default::default(), body.to_string())
    }

    #[test]
    fn completed_call_with_timestamps() {
        let provider = BlandProvider::new(None);
        let mut req = request(&fixtures::bland_completed_body());
        let event = provider
            .parse_webhook(&CancellationToken::new(), &mut req)
            .unwrap();
        assert_eq!(event.provider(), ProviderType::Bland);
        assert_eq!(event.status(), CallStatus::Completed);
        assert_eq!(event.duration_secs(), 120);
        assert!(!event.transcript().is_empty());
        assert!(event.is_complete());
        assert_eq!(event.transcript_entries().len(), 2);
        let extracted = event.extracted().unwrap();
        assert_eq!(extracted.project_type.as_deref(), Some("kitchen remodel"));
    }

    #[test]
    fn voicemail_answer_overrides_status() {
        let provider = BlandProvider::new(None);
        let body = r#"{"call_id":"c1","status":"completed","answered_by":"voicemail"}"#;
        let event = provider
            .parse_webhook(&CancellationToken::new(), &mut request(body))
            .unwrap();
        assert_eq!(event.status(), CallStatus::Voicemail);
    }

    #[test]
    fn call_length_minutes_used_without_timestamps() {
        let provider = BlandProvider::new(None);
        let body = r#"{"call_id":"c1","status":"completed","call_length":1.5}"#;
        let event = provider
            .parse_webhook(&CancellationToken::new(), &mut request(body))
            .unwrap();
        assert_eq!(event.duration_secs(), 90);
        assert!(event.started_at().is_none());
    }

    #[test]
    fn failed_call_keeps_error_message() {
        let provider = BlandProvider::new(None);
        let body = r#"{"call_id":"c1","status":"error","error_message":"carrier rejected"}"#;
        let event = provider
            .parse_webhook(&CancellationToken::new(), &mut request(body))
            .unwrap();
        assert_eq!(event.status(), CallStatus::Failed);
        assert_eq!(event.error_message(), Some("carrier rejected"));
    }

    #[test]
    fn missing_call_id_is_rejected() {
        let provider = BlandProvider::new(None);
        let err = provider
            .parse_webhook(&CancellationToken::new(), &mut request(r#"{"status":"completed"}"#))
            .unwrap_err();
        match err {
            VoxquoteError::Validation { errors, .. } => assert!(errors.has_field("call_id")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn cancelled_parse() {
        let provider = BlandProvider::new(None);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = provider
            .parse_webhook(&cancel, &mut request(r#"{"call_id":"c1"}"#))
            .unwrap_err();
        assert!(matches!(err, VoxquoteError::Cancelled));
    }
}
