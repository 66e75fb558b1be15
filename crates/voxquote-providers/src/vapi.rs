// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vapi server-message adapter (`end-of-call-report` and `status-update`).
//!
//! Vapi deployments authenticate in one of three ways, tried in order:
//! an HMAC signature in `X-Vapi-Signature`, a bearer token in
//! `Authorization`, or the raw secret in `X-Vapi-Secret`. The first header
//! present decides; a failing header does not fall through to the next.

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use voxquote_core::{
    CallEvent, CallStatus, ExtractedData, Provider, ProviderType, VoxquoteError, WebhookRequest,
};

use crate::common::{self, ParseSettings, Secret};
use crate::signature::{self, SignatureError};
use crate::timestamp;
use crate::validate::{PayloadCheck, sanitize_opt, sanitize_text};

pub const VAPI_WEBHOOK_PATH: &str = "/webhooks/vapi";
pub const VAPI_SIGNATURE_HEADER: &str = "X-Vapi-Signature";
pub const VAPI_SECRET_HEADER: &str = "X-Vapi-Secret";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Envelope {
    message: VapiMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VapiMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    status: Option<String>,
    ended_reason: Option<String>,
    call: VapiCall,
    customer: Option<VapiParty>,
    phone_number: Option<VapiParty>,
    started_at: Option<Value>,
    ended_at: Option<Value>,
    duration_seconds: Option<Value>,
    transcript: Option<String>,
    messages: Vec<VapiLine>,
    recording_url: Option<String>,
    summary: Option<String>,
    analysis: Option<VapiAnalysis>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VapiCall {
    id: Option<String>,
    status: Option<String>,
    ended_reason: Option<String>,
    customer: Option<VapiParty>,
    phone_number: Option<VapiParty>,
    started_at: Option<Value>,
    ended_at: Option<Value>,
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VapiParty {
    number: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VapiLine {
    role: String,
    message: String,
    seconds_from_start: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VapiAnalysis {
    summary: Option<String>,
    structured_data: Option<Map<String, Value>>,
    success_evaluation: Option<Value>,
}

fn vapi_status(raw: &str) -> Option<CallStatus> {
    Some(match raw {
        "queued" | "scheduled" | "ringing" => CallStatus::Pending,
        "in-progress" | "ongoing" => CallStatus::InProgress,
        "forwarding" | "transferred" => CallStatus::Transferred,
        "ended" | "completed" => CallStatus::Completed,
        "failed" | "error" => CallStatus::Failed,
        _ => return None,
    })
}

/// Refine an `ended` status using Vapi's ended reason.
fn refine_by_ended_reason(status: CallStatus, reason: Option<&str>) -> CallStatus {
    let Some(reason) = reason.map(str::to_ascii_lowercase) else {
        return status;
    };
    if status != CallStatus::Completed {
        return status;
    }
    if reason.contains("did-not-answer") || reason.contains("busy") || reason == "no-answer" {
        CallStatus::NoAnswer
    } else if reason.contains("voicemail") {
        CallStatus::Voicemail
    } else if reason.contains("forwarded") || reason.contains("transfer") {
        CallStatus::Transferred
    } else if reason.contains("error") || reason.contains("failed") {
        CallStatus::Failed
    } else {
        status
    }
}

/// Adapter for Vapi.
#[derive(Clone, Default)]
pub struct VapiProvider {
    secret: Secret,
    bearer_token: Secret,
    settings: ParseSettings,
}

impl fmt::Debug for VapiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VapiProvider")
            .field("secret", &self.secret)
            .field("bearer_token", &self.bearer_token)
            .field("settings", &self.settings)
            .finish()
    }
}

impl VapiProvider {
    /// `bearer_token` defaults to the webhook secret when unset.
    pub fn new(webhook_secret: Option<String>, bearer_token: Option<String>) -> Self {
        Self {
            secret: Secret::new(webhook_secret),
            bearer_token: Secret::new(bearer_token),
            settings: ParseSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ParseSettings) -> Self {
        self.settings = settings;
        self
    }

    fn expected_bearer(&self) -> Option<&str> {
        self.bearer_token.get().or(self.secret.get())
    }

    /// Checks `X-Vapi-Signature`, then `Authorization: Bearer`, then
    /// `X-Vapi-Secret`. The first header present decides the outcome; a
    /// failed check never falls through to a later header.
    fn authenticate(&self, req: &mut WebhookRequest) -> Result<(), SignatureError> {
        if req.header_str(VAPI_SIGNATURE_HEADER).is_some() {
            let Some(secret) = self.secret.get() else {
                return Err(SignatureError::Mismatch);
            };
            return req
                .with_body(|req, body| {
                    let presented = req.header_str(VAPI_SIGNATURE_HEADER).unwrap_or_default();
                    signature::verify_hmac_sha256(secret, body, presented)
                })
                .unwrap_or(Err(SignatureError::Malformed));
        }

        if let Some(auth) = req.header_str("Authorization") {
            let expected = self.expected_bearer().ok_or(SignatureError::SecretMismatch)?;
            let token = signature::bearer_token(auth).ok_or(SignatureError::Malformed)?;
            return signature::verify_shared_secret(expected, token);
        }

        if let Some(presented) = req.header_str(VAPI_SECRET_HEADER) {
            let expected = self.secret.get().ok_or(SignatureError::SecretMismatch)?;
            return signature::verify_shared_secret(expected, presented);
        }

        Err(SignatureError::MissingHeader(format!(
            "{VAPI_SIGNATURE_HEADER}, Authorization or {VAPI_SECRET_HEADER}"
        )))
    }
}

impl Provider for VapiProvider {
    fn name(&self) -> ProviderType {
        ProviderType::Vapi
    }

    fn webhook_path(&self) -> &str {
        VAPI_WEBHOOK_PATH
    }

    fn verify_webhook(&self, req: &mut WebhookRequest) -> Result<(), VoxquoteError> {
        if !self.secret.is_set() && !self.bearer_token.is_set() {
            common::warn_unauthenticated(self.name());
            return Ok(());
        }
        self.authenticate(req).map_err(|e| {
            tracing::debug!(provider = %self.name(), error = %e, "webhook authentication rejected");
            common::auth_error(self.name(), e)
        })
    }

    fn parse_webhook(
        &self,
        cancel: &CancellationToken,
        req: &mut WebhookRequest,
    ) -> Result<CallEvent, VoxquoteError> {
        common::ensure_not_cancelled(cancel)?;
        let Envelope { message } = common::read_payload(self.name(), &self.settings, req)?;
        let VapiMessage {
            kind,
            status,
            ended_reason,
            call,
            customer,
            phone_number,
            started_at,
            ended_at,
            duration_seconds,
            transcript,
            messages,
            recording_url,
            summary,
            analysis,
        } = message;

        let customer = customer.or(call.customer);
        let agent_number = phone_number.or(call.phone_number);
        let started_at = started_at.or(call.started_at);
        let ended_at = ended_at.or(call.ended_at);
        let ended_reason = ended_reason.or(call.ended_reason);

        let entries: Vec<_> = messages
            .iter()
            .filter_map(|m| common::entry(&m.role, &m.message, m.seconds_from_start))
            .collect();
        let transcript = match transcript {
            Some(text) if !text.trim().is_empty() => text,
            _ => common::render_transcript(&entries),
        };

        let to_number = customer.as_ref().and_then(|c| c.number.clone());
        let from_number = agent_number.and_then(|p| p.number);

        let mut check = PayloadCheck::new();
        check
            .call_id(call.id.as_deref())
            .phone("customer.number", to_number.as_deref())
            .phone("phoneNumber.number", from_number.as_deref())
            .transcript("transcript", &transcript)
            .recording_url(recording_url.as_deref());
        for (i, e) in entries.iter().enumerate() {
            check.transcript(&format!("messages[{i}]"), &e.text);
        }
        check
            .finish()
            .map_err(|errors| VoxquoteError::Validation {
                provider: self.name(),
                errors,
            })?;
        common::ensure_not_cancelled(cancel)?;

        let raw_status = match (status.or(call.status), kind.as_deref()) {
            (Some(s), _) => Some(s),
            (None, Some("end-of-call-report")) => Some("ended".to_string()),
            (None, _) => None,
        };
        let status = refine_by_ended_reason(
            common::resolve_status(self.name(), raw_status.as_deref(), &self.settings, vapi_status),
            ended_reason.as_deref(),
        );

        let (analysis_summary, extracted, success) = match analysis {
            Some(a) => (
                a.summary,
                a.structured_data.as_ref().and_then(ExtractedData::from_map),
                a.success_evaluation,
            ),
            None => (None, None, None),
        };
        let extracted = extracted.map(|d| d.map_text(sanitize_text));
        let caller_name = customer
            .and_then(|c| c.name)
            .or_else(|| extracted.as_ref().and_then(|d| d.caller_name.clone()));

        let disposition = sanitize_opt(ended_reason.as_deref());
        let mut builder = CallEvent::builder(self.name(), call.id.unwrap_or_default())
            .to_number(to_number)
            .from_number(from_number)
            .caller_name(sanitize_opt(caller_name.as_deref()))
            .status(status)
            .started_at(timestamp::from_rfc3339(started_at.as_ref()))
            .ended_at(timestamp::from_rfc3339(ended_at.as_ref()))
            .reported_duration_secs(timestamp::seconds(duration_seconds.as_ref()))
            .transcript(sanitize_text(&transcript))
            .transcript_entries(common::sanitize_entries(entries))
            .extracted(extracted)
            .recording_url(recording_url)
            .summary(sanitize_opt(summary.or(analysis_summary).as_deref()))
            .disposition(disposition.clone());
        if status == CallStatus::Failed {
            builder = builder.error(disposition, None);
        }
        if let Some(kind) = kind {
            builder = builder.metadata("message_type", Value::String(kind));
        }
        if let Some(success) = success {
            builder = builder.metadata("success_evaluation", success);
        }
        if let Some(metadata) = call.metadata {
            builder = builder.metadata("metadata", Value::Object(metadata));
        }
        builder.build()
    }
}
