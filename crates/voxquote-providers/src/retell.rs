// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retell AI webhook adapter (`call_started`, `call_ended`, `call_analyzed`).
//!
//! Authenticated by an HMAC-SHA256 hex digest of the body in
//! `X-Retell-Signature`. Timestamps are Unix milliseconds.

use serde::Deserialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use voxquote_core::{
    CallEvent, CallStatus, ExtractedData, Provider, ProviderType, VoxquoteError, WebhookRequest,
};

use crate::common::{self, ParseSettings, Secret};
use crate::timestamp;
use crate::validate::{PayloadCheck, sanitize_opt, sanitize_text};

pub const RETELL_WEBHOOK_PATH: &str = "/webhooks/retell";
pub const RETELL_SIGNATURE_HEADER: &str = "X-Retell-Signature";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Envelope {
    event: Option<String>,
    call: RetellCall,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RetellCall {
    call_id: Option<String>,
    call_status: Option<String>,
    from_number: Option<String>,
    to_number: Option<String>,
    direction: Option<String>,
    start_timestamp: Option<Value>,
    end_timestamp: Option<Value>,
    duration_ms: Option<Value>,
    transcript: Option<String>,
    transcript_object: Vec<RetellUtterance>,
    recording_url: Option<String>,
    disconnection_reason: Option<String>,
    call_analysis: Option<RetellAnalysis>,
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RetellUtterance {
    role: String,
    content: String,
    words: Vec<RetellWord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RetellWord {
    start: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RetellAnalysis {
    call_summary: Option<String>,
    user_sentiment: Option<String>,
    call_successful: Option<bool>,
    in_voicemail: Option<bool>,
    custom_analysis_data: Option<Map<String, Value>>,
}

fn retell_status(raw: &str) -> Option<CallStatus> {
    Some(match raw {
        "not_connected" => CallStatus::NoAnswer,
        "ongoing" => CallStatus::InProgress,
        "ended" | "registered" => CallStatus::Completed,
        "error" => CallStatus::Failed,
        _ => return None,
    })
}

fn refine_by_disconnection(status: CallStatus, reason: Option<&str>) -> CallStatus {
    match reason {
        _ if status != CallStatus::Completed => status,
        Some("dial_no_answer" | "dial_busy" | "dial_failed") => CallStatus::NoAnswer,
        Some("voicemail_reached") => CallStatus::Voicemail,
        Some("call_transfer") => CallStatus::Transferred,
        Some(r) if r.starts_with("error") => CallStatus::Failed,
        _ => status,
    }
}

/// Adapter for Retell AI.
#[derive(Debug, Clone, Default)]
pub struct RetellProvider {
    secret: Secret,
    settings: ParseSettings,
}

impl RetellProvider {
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
}

impl Provider for RetellProvider {
    fn name(&self) -> ProviderType {
        ProviderType::Retell
    }

    fn webhook_path(&self) -> &str {
        RETELL_WEBHOOK_PATH
    }

    fn verify_webhook(&self, req: &mut WebhookRequest) -> Result<(), VoxquoteError> {
        common::verify_signed_body(self.name(), &self.secret, RETELL_SIGNATURE_HEADER, req)
    }

    fn parse_webhook(
        &self,
        cancel: &CancellationToken,
        req: &mut WebhookRequest,
    ) -> Result<CallEvent, VoxquoteError> {
        common::ensure_not_cancelled(cancel)?;
        let Envelope { event, call } = common::read_payload(self.name(), &self.settings, req)?;

        let entries: Vec<_> = call
            .transcript_object
            .iter()
            .filter_map(|u| {
                let offset = u.words.first().and_then(|w| w.start);
                common::entry(&u.role, &u.content, offset)
            })
            .collect();
        let transcript = match call.transcript.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => common::render_transcript(&entries),
        };

        let mut check = PayloadCheck::new();
        check
            .call_id(call.call_id.as_deref())
            .phone("from_number", call.from_number.as_deref())
            .phone("to_number", call.to_number.as_deref())
            .transcript("transcript", &transcript)
            .recording_url(call.recording_url.as_deref());
        for (i, e) in entries.iter().enumerate() {
            check.transcript(&format!("transcript_object[{i}]"), &e.text);
        }
        check
            .finish()
            .map_err(|errors| VoxquoteError::Validation {
                provider: self.name(),
                errors,
            })?;
        common::ensure_not_cancelled(cancel)?;

        let analysis = call.call_analysis.unwrap_or_default();
        let mut status = refine_by_disconnection(
            common::resolve_status(
                self.name(),
                call.call_status.as_deref(),
                &self.settings,
                retell_status,
            ),
            call.disconnection_reason.as_deref(),
        );
        if status == CallStatus::Completed && analysis.in_voicemail == Some(true) {
            status = CallStatus::Voicemail;
        }

        let extracted = analysis
            .custom_analysis_data
            .as_ref()
            .and_then(ExtractedData::from_map)
            .map(|d| d.map_text(sanitize_text));
        let caller_name = extracted.as_ref().and_then(|d| d.caller_name.clone());
        let duration = timestamp::seconds(call.duration_ms.as_ref()).map(|ms| ms / 1000.0);

        let mut builder = CallEvent::builder(self.name(), call.call_id.unwrap_or_default())
            .to_number(call.to_number)
            .from_number(call.from_number)
            .caller_name(caller_name)
            .status(status)
            .started_at(timestamp::from_unix_millis(call.start_timestamp.as_ref()))
            .ended_at(timestamp::from_unix_millis(call.end_timestamp.as_ref()))
            .reported_duration_secs(duration)
            .transcript(sanitize_text(&transcript))
            .transcript_entries(common::sanitize_entries(entries))
            .extracted(extracted)
            .recording_url(call.recording_url)
            .summary(sanitize_opt(analysis.call_summary.as_deref()))
            .disposition(sanitize_opt(call.disconnection_reason.as_deref()));
        if status == CallStatus::Failed {
            let reason = sanitize_opt(call.disconnection_reason.as_deref());
            let message = reason.clone().unwrap_or_else(|| "call failed".to_string());
            builder = builder.error(Some(message), reason);
        }
        if let Some(event) = event {
            builder = builder.metadata("event", Value::String(event));
        }
        if let Some(direction) = call.direction {
            builder = builder.metadata("direction", Value::String(direction));
        }
        if let Some(sentiment) = analysis.user_sentiment {
            builder = builder.metadata("user_sentiment", Value::String(sentiment));
        }
        if let Some(successful) = analysis.call_successful {
            builder = builder.metadata("call_successful", Value::Bool(successful));
        }
        if let Some(metadata) = call.metadata {
            builder = builder.metadata("metadata", Value::Object(metadata));
        }
        builder.build()
    }
}
