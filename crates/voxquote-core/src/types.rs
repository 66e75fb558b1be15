// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The canonical call-event model shared by every vendor adapter.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::{ValidationErrors, VoxquoteError};

/// Maximum length in bytes of a provider-assigned call id.
pub const MAX_CALL_ID_LEN: usize = 256;

/// Upper bound for a call's duration (24 hours).
pub const MAX_CALL_DURATION_SECS: u32 = 86_400;

/// Identifies which voice platform produced (and owns) an event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Bland,
    Vapi,
    Retell,
    Livekit,
    Custom,
}

impl ProviderType {
    /// Every provider identifier, in declaration order.
    pub const ALL: [ProviderType; 5] = [
        ProviderType::Bland,
        ProviderType::Vapi,
        ProviderType::Retell,
        ProviderType::Livekit,
        ProviderType::Custom,
    ];
}

/// Canonical call lifecycle status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    NoAnswer,
    Voicemail,
    Transferred,
}

impl CallStatus {
    /// Terminal states: the call will not produce further updates.
    pub fn is_complete(self) -> bool {
        matches!(
            self,
            CallStatus::Completed | CallStatus::Failed | CallStatus::NoAnswer
        )
    }
}

/// Who spoke a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    /// The voice agent (vendors say "assistant", "agent", or "bot").
    Agent,
    /// The person on the phone (vendors say "user", "customer", or "human").
    Caller,
    /// Platform-injected lines such as system prompts or tool output.
    System,
    Unknown,
}

impl SpeakerRole {
    /// Map a vendor role label onto the canonical role.
    pub fn from_vendor(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "assistant" | "agent" | "bot" | "ai" => SpeakerRole::Agent,
            "user" | "customer" | "caller" | "human" => SpeakerRole::Caller,
            "system" | "tool" | "function" | "tool_calls" => SpeakerRole::System,
            _ => SpeakerRole::Unknown,
        }
    }
}

/// One role-tagged line of a call transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: SpeakerRole,
    pub text: String,
    /// Seconds from call start, when the vendor reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_secs: Option<f64>,
}

/// Quote-relevant structured data a vendor extracted from the conversation.
///
/// Known keys are lifted into typed fields; everything else is kept verbatim
/// in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_preference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl ExtractedData {
    /// Split an arbitrary analysis map into known fields and residual extras.
    ///
    /// Key matching ignores case and accepts both `snake_case` and
    /// `camelCase` spellings. Returns `None` for an empty map.
    pub fn from_map(map: &serde_json::Map<String, Value>) -> Option<Self> {
        if map.is_empty() {
            return None;
        }

        let mut data = ExtractedData::default();
        for (key, value) in map {
            let normalized: String = key
                .chars()
                .filter(|c| *c != '_' && *c != '-')
                .flat_map(char::to_lowercase)
                .collect();
            let slot = match normalized.as_str() {
                "projecttype" => &mut data.project_type,
                "requirements" => &mut data.requirements,
                "timeline" => &mut data.timeline,
                "budgetrange" | "budget" => &mut data.budget_range,
                "contactpreference" => &mut data.contact_preference,
                "callername" | "name" => &mut data.caller_name,
                _ => {
                    data.extra.insert(key.clone(), value.clone());
                    continue;
                }
            };
            match value_to_text(value) {
                Some(text) => *slot = Some(text),
                None if !value.is_null() => {
                    data.extra.insert(key.clone(), value.clone());
                }
                None => {}
            }
        }

        Some(data)
    }

    /// True when no typed field is set and `extra` is empty.
    pub fn is_empty(&self) -> bool {
        self.project_type.is_none()
            && self.requirements.is_none()
            && self.timeline.is_none()
            && self.budget_range.is_none()
            && self.contact_preference.is_none()
            && self.caller_name.is_none()
            && self.extra.is_empty()
    }

    /// Apply `f` to every typed text field.
    pub fn map_text(mut self, f: impl Fn(&str) -> String) -> Self {
        for slot in [
            &mut self.project_type,
            &mut self.requirements,
            &mut self.timeline,
            &mut self.budget_range,
            &mut self.contact_preference,
            &mut self.caller_name,
        ] {
            if let Some(text) = slot.take() {
                let cleaned = f(&text);
                if !cleaned.is_empty() {
                    *slot = Some(cleaned);
                }
            }
        }
        self
    }
}

/// Render a scalar or a list of scalars as text; objects are left alone.
fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Option<Vec<String>> = items
                .iter()
                .map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect();
            parts.map(|p| p.join(", "))
        }
        Value::Null | Value::Object(_) => None,
    }
}

/// The single normalized representation of a completed (or updated) call.
///
/// Built only through [`CallEventBuilder`], which rejects a blank call id and
/// derives `duration_secs` from the timestamps whenever both are present.
/// Deserialization goes through the same builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCallEvent")]
pub struct CallEvent {
    provider: ProviderType,
    call_id: String,
    to_number: Option<String>,
    from_number: Option<String>,
    caller_name: Option<String>,
    status: CallStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    duration_secs: u32,
    transcript: String,
    transcript_entries: Vec<TranscriptEntry>,
    extracted: Option<ExtractedData>,
    recording_url: Option<String>,
    error_message: Option<String>,
    error_code: Option<String>,
    summary: Option<String>,
    disposition: Option<String>,
    raw_metadata: serde_json::Map<String, Value>,
}

impl CallEvent {
    pub fn builder(provider: ProviderType, call_id: impl Into<String>) -> CallEventBuilder {
        CallEventBuilder::new(provider, call_id)
    }

    pub fn provider(&self) -> ProviderType {
        self.provider
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn to_number(&self) -> Option<&str> {
        self.to_number.as_deref()
    }

    pub fn from_number(&self) -> Option<&str> {
        self.from_number.as_deref()
    }

    pub fn caller_name(&self) -> Option<&str> {
        self.caller_name.as_deref()
    }

    pub fn status(&self) -> CallStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn transcript_entries(&self) -> &[TranscriptEntry] {
        &self.transcript_entries
    }

    pub fn extracted(&self) -> Option<&ExtractedData> {
        self.extracted.as_ref()
    }

    pub fn recording_url(&self) -> Option<&str> {
        self.recording_url.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn disposition(&self) -> Option<&str> {
        self.disposition.as_deref()
    }

    pub fn raw_metadata(&self) -> &serde_json::Map<String, Value> {
        &self.raw_metadata
    }

    /// Whether the call reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }
}

/// Wire form of a [`CallEvent`], checked by the builder before use.
#[derive(Deserialize)]
struct RawCallEvent {
    provider: ProviderType,
    call_id: String,
    #[serde(default)]
    to_number: Option<String>,
    #[serde(default)]
    from_number: Option<String>,
    #[serde(default)]
    caller_name: Option<String>,
    #[serde(default)]
    status: CallStatus,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    duration_secs: Option<f64>,
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    transcript_entries: Vec<TranscriptEntry>,
    #[serde(default)]
    extracted: Option<ExtractedData>,
    #[serde(default)]
    recording_url: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    disposition: Option<String>,
    #[serde(default)]
    raw_metadata: serde_json::Map<String, Value>,
}

impl TryFrom<RawCallEvent> for CallEvent {
    type Error = VoxquoteError;

    fn try_from(raw: RawCallEvent) -> Result<Self, Self::Error> {
        let mut builder = CallEventBuilder::new(raw.provider, raw.call_id)
            .to_number(raw.to_number)
            .from_number(raw.from_number)
            .caller_name(raw.caller_name)
            .status(raw.status)
            .started_at(raw.started_at)
            .ended_at(raw.ended_at)
            .reported_duration_secs(raw.duration_secs)
            .transcript(raw.transcript)
            .transcript_entries(raw.transcript_entries)
            .extracted(raw.extracted)
            .recording_url(raw.recording_url)
            .error(raw.error_message, raw.error_code)
            .summary(raw.summary)
            .disposition(raw.disposition);
        builder.raw_metadata = raw.raw_metadata;
        builder.build()
    }
}

/// Builder for [`CallEvent`].
#[derive(Debug, Clone)]
pub struct CallEventBuilder {
    provider: ProviderType,
    call_id: String,
    to_number: Option<String>,
    from_number: Option<String>,
    caller_name: Option<String>,
    status: CallStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    reported_duration_secs: Option<f64>,
    transcript: String,
    transcript_entries: Vec<TranscriptEntry>,
    extracted: Option<ExtractedData>,
    recording_url: Option<String>,
    error_message: Option<String>,
    error_code: Option<String>,
    summary: Option<String>,
    disposition: Option<String>,
    raw_metadata: serde_json::Map<String, Value>,
}

impl CallEventBuilder {
    pub fn new(provider: ProviderType, call_id: impl Into<String>) -> Self {
        Self {
            provider,
            call_id: call_id.into(),
            to_number: None,
            from_number: None,
            caller_name: None,
            status: CallStatus::Pending,
            started_at: None,
            ended_at: None,
            reported_duration_secs: None,
            transcript: String::new(),
            transcript_entries: Vec::new(),
            extracted: None,
            recording_url: None,
            error_message: None,
            error_code: None,
            summary: None,
            disposition: None,
            raw_metadata: serde_json::Map::new(),
        }
    }

    pub fn to_number(mut self, number: Option<String>) -> Self {
        self.to_number = non_empty(number);
        self
    }

    pub fn from_number(mut self, number: Option<String>) -> Self {
        self.from_number = non_empty(number);
        self
    }

    pub fn caller_name(mut self, name: Option<String>) -> Self {
        self.caller_name = non_empty(name);
        self
    }

    pub fn status(mut self, status: CallStatus) -> Self {
        self.status = status;
        self
    }

    pub fn started_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.started_at = at;
        self
    }

    pub fn ended_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.ended_at = at;
        self
    }

    /// Vendor-reported duration, used only when start/end are not both known.
    pub fn reported_duration_secs(mut self, secs: Option<f64>) -> Self {
        self.reported_duration_secs = secs;
        self
    }

    pub fn transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = transcript.into();
        self
    }

    pub fn transcript_entries(mut self, entries: Vec<TranscriptEntry>) -> Self {
        self.transcript_entries = entries;
        self
    }

    pub fn extracted(mut self, data: Option<ExtractedData>) -> Self {
        self.extracted = data.filter(|d| !d.is_empty());
        self
    }

    pub fn recording_url(mut self, url: Option<String>) -> Self {
        self.recording_url = non_empty(url);
        self
    }

    pub fn error(mut self, message: Option<String>, code: Option<String>) -> Self {
        self.error_message = non_empty(message);
        self.error_code = non_empty(code);
        self
    }

    pub fn summary(mut self, summary: Option<String>) -> Self {
        self.summary = non_empty(summary);
        self
    }

    pub fn disposition(mut self, disposition: Option<String>) -> Self {
        self.disposition = non_empty(disposition);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.raw_metadata.insert(key.into(), value);
        self
    }

    /// Finish the event.
    ///
    /// Fails when the call id is blank, oversized, or contains control
    /// characters. Timestamps that are out of order or further apart than
    /// [`MAX_CALL_DURATION_SECS`] are discarded and the vendor-reported
    /// duration is used instead.
    pub fn build(self) -> Result<CallEvent, VoxquoteError> {
        let mut errors = ValidationErrors::new();
        let call_id = self.call_id.trim().to_string();
        if call_id.is_empty() {
            errors.push("call_id", "must not be empty");
        } else if call_id.len() > MAX_CALL_ID_LEN {
            errors.push(
                "call_id",
                format!("must be at most {MAX_CALL_ID_LEN} bytes, got {}", call_id.len()),
            );
        }
        if call_id.chars().any(char::is_control) {
            errors.push("call_id", "must not contain control characters");
        }
        if let Err(errors) = errors.into_result() {
            return Err(VoxquoteError::Validation {
                provider: self.provider,
                errors,
            });
        }

        let (started_at, ended_at, duration_secs) =
            match (self.started_at, self.ended_at) {
                (Some(start), Some(end)) => {
                    let secs = (end - start).num_seconds();
                    if (0..=i64::from(MAX_CALL_DURATION_SECS)).contains(&secs) {
                        (Some(start), Some(end), secs as u32)
                    } else {
                        (None, None, clamp_duration(self.reported_duration_secs))
                    }
                }
                (start, end) => (start, end, clamp_duration(self.reported_duration_secs)),
            };

        Ok(CallEvent {
            provider: self.provider,
            call_id,
            to_number: self.to_number,
            from_number: self.from_number,
            caller_name: self.caller_name,
            status: self.status,
            started_at,
            ended_at,
            duration_secs,
            transcript: self.transcript,
            transcript_entries: self.transcript_entries,
            extracted: self.extracted,
            recording_url: self.recording_url,
            error_message: self.error_message,
            error_code: self.error_code,
            summary: self.summary,
            disposition: self.disposition,
            raw_metadata: self.raw_metadata,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn clamp_duration(secs: Option<f64>) -> u32 {
    match secs {
        Some(s) if s.is_finite() && s > 0.0 => {
            s.round().min(f64::from(MAX_CALL_DURATION_SECS)) as u32
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn blank_call_id_is_rejected() {
        let err = CallEvent::builder(ProviderType::Bland, "   ").build().unwrap_err();
        match err {
            VoxquoteError::Validation { provider, errors } => {
                assert_eq!(provider, ProviderType::Bland);
                assert!(errors.has_field("call_id"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn oversized_call_id_is_rejected() {
        let id = "x".repeat(MAX_CALL_ID_LEN + 1);
        assert!(CallEvent::builder(ProviderType::Vapi, id).build().is_err());
    }

    #[test]
    fn duration_derives_from_timestamps() {
        let event = CallEvent::builder(ProviderType::Retell, "call-1")
            .started_at(Some(at(0)))
            .ended_at(Some(at(120)))
            .reported_duration_secs(Some(999.0))
            .build()
            .unwrap();
        assert_eq!(event.duration_secs(), 120);
    }

    #[test]
    fn reported_duration_used_without_both_timestamps() {
        let event = CallEvent::builder(ProviderType::Retell, "call-1")
            .started_at(Some(at(0)))
            .reported_duration_secs(Some(42.4))
            .build()
            .unwrap();
        assert_eq!(event.duration_secs(), 42);
        assert!(event.started_at().is_some());
        assert!(event.ended_at().is_none());
    }

    #[test]
    fn reversed_timestamps_are_discarded() {
        let event = CallEvent::builder(ProviderType::Vapi, "call-1")
            .started_at(Some(at(100)))
            .ended_at(Some(at(10)))
            .build()
            .unwrap();
        assert!(event.started_at().is_none());
        assert!(event.ended_at().is_none());
        assert_eq!(event.duration_secs(), 0);
    }

    #[test]
    fn reported_duration_is_clamped() {
        let event = CallEvent::builder(ProviderType::Bland, "call-1")
            .reported_duration_secs(Some(1e9))
            .build()
            .unwrap();
        assert_eq!(event.duration_secs(), MAX_CALL_DURATION_SECS);

        let event = CallEvent::builder(ProviderType::Bland, "call-2")
            .reported_duration_secs(Some(-5.0))
            .build()
            .unwrap();
        assert_eq!(event.duration_secs(), 0);
    }

    #[test]
    fn extracted_data_splits_known_and_extra_keys() {
        let map = serde_json::json!({
            "projectType": "kitchen remodel",
            "budget_range": "$10k-$20k",
            "requirements": ["new cabinets", "island"],
            "square_feet": 220,
            "notes": {"pets": true}
        });
        let data = ExtractedData::from_map(map.as_object().unwrap()).unwrap();
        assert_eq!(data.project_type.as_deref(), Some("kitchen remodel"));
        assert_eq!(data.budget_range.as_deref(), Some("$10k-$20k"));
        assert_eq!(data.requirements.as_deref(), Some("new cabinets, island"));
        assert_eq!(data.extra.get("square_feet"), Some(&serde_json::json!(220)));
        assert!(data.extra.contains_key("notes"));
    }

    #[test]
    fn empty_extraction_is_absent() {
        assert!(ExtractedData::from_map(&serde_json::Map::new()).is_none());

        let event = CallEvent::builder(ProviderType::Vapi, "c")
            .extracted(Some(ExtractedData::default()))
            .build()
            .unwrap();
        assert!(event.extracted().is_none());
    }

    #[test]
    fn speaker_roles_from_vendor_labels() {
        assert_eq!(SpeakerRole::from_vendor("assistant"), SpeakerRole::Agent);
        assert_eq!(SpeakerRole::from_vendor("User"), SpeakerRole::Caller);
        assert_eq!(SpeakerRole::from_vendor("tool"), SpeakerRole::System);
        assert_eq!(SpeakerRole::from_vendor("narrator"), SpeakerRole::Unknown);
    }

    #[test]
    fn deserializing_checks_like_the_builder() {
        let blank = serde_json::json!({
            "provider": "bland",
            "call_id": "  ",
            "status": "completed",
        });
        assert!(serde_json::from_value::<CallEvent>(blank).is_err());

        let forged = serde_json::json!({
            "provider": "vapi",
            "call_id": " call-9 ",
            "status": "completed",
            "started_at": "2026-01-01T00:00:10Z",
            "ended_at": "2026-01-01T00:00:00Z",
            "duration_secs": 999999,
        });
        let event: CallEvent = serde_json::from_value(forged).unwrap();
        assert_eq!(event.call_id(), "call-9");
        assert!(event.started_at().is_none());
        assert_eq!(event.duration_secs(), MAX_CALL_DURATION_SECS);
    }

    #[test]
    fn serialized_event_reads_back() {
        let event = CallEvent::builder(ProviderType::Retell, "call-1")
            .status(CallStatus::Completed)
            .started_at(Some(at(0)))
            .ended_at(Some(at(120)))
            .transcript("Agent: hi")
            .metadata("agent_id", serde_json::json!("a-1"))
            .build()
            .unwrap();
        let json = serde_json::to_value(&event).unwrap();
        let back: CallEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    proptest::proptest! {
        #[test]
        fn duration_never_exceeds_bound(start in 0i64..200_000, len in -100_000i64..200_000) {
            let event = CallEvent::builder(ProviderType::Custom, "p")
                .started_at(Some(at(start)))
                .ended_at(Some(at(start + len)))
                .build()
                .unwrap();
            proptest::prop_assert!(event.duration_secs() <= MAX_CALL_DURATION_SECS);
            if let (Some(s), Some(e)) = (event.started_at(), event.ended_at()) {
                proptest::prop_assert_eq!((e - s).num_seconds(), i64::from(event.duration_secs()));
            }
        }
    }
}
