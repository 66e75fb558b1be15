// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plumbing shared by the vendor adapters: settings, body decoding,
//! status resolution, transcript rendering and webhook authentication.

use std::fmt;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use voxquote_config::UnknownStatusPolicy;
use voxquote_core::{
    CallStatus, ProviderType, SpeakerRole, TranscriptEntry, VoxquoteError, WebhookRequest,
};

use crate::signature::{self, SignatureError};

/// Default cap on webhook body size.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Parsing knobs common to every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseSettings {
    /// What to do with status vocabulary the adapter does not recognize.
    pub unknown_status: UnknownStatusPolicy,
    /// Bodies larger than this fail before JSON decoding.
    pub max_body_bytes: usize,
}

impl Default for ParseSettings {
    fn default() -> Self {
        Self {
            unknown_status: UnknownStatusPolicy::Pending,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// A configured webhook secret. `Debug` never shows the value.
#[derive(Clone, Default)]
pub struct Secret(Option<String>);

impl Secret {
    pub fn new(value: Option<String>) -> Self {
        Self(value.filter(|s| !s.trim().is_empty()))
    }

    pub fn get(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() { "[redacted]" } else { "None" })
    }
}

pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), VoxquoteError> {
    if cancel.is_cancelled() {
        Err(VoxquoteError::Cancelled)
    } else {
        Ok(())
    }
}

pub(crate) fn auth_error(provider: ProviderType, err: SignatureError) -> VoxquoteError {
    VoxquoteError::Authentication {
        provider,
        reason: err.to_string(),
    }
}

pub(crate) fn warn_unauthenticated(provider: ProviderType) {
    warn!(
        provider = %provider,
        "no webhook secret configured, accepting unauthenticated webhook"
    );
}

/// Check an HMAC signature header over the body, restoring the body
/// afterwards. A missing secret accepts the request with a warning.
pub(crate) fn verify_signed_body(
    provider: ProviderType,
    secret: &Secret,
    header: &str,
    req: &mut WebhookRequest,
) -> Result<(), VoxquoteError> {
    let Some(secret) = secret.get() else {
        warn_unauthenticated(provider);
        return Ok(());
    };
    req.with_body(|req, body| {
        let presented = req
            .header_str(header)
            .ok_or_else(|| SignatureError::MissingHeader(header.to_string()))?;
        signature::verify_hmac_sha256(secret, body, presented)
    })?
    .map_err(|e| {
        debug!(provider = %provider, error = %e, "webhook signature rejected");
        auth_error(provider, e)
    })
}

/// Read the body (restoring it) and decode it as `T`.
pub(crate) fn read_payload<T: DeserializeOwned>(
    provider: ProviderType,
    settings: &ParseSettings,
    req: &mut WebhookRequest,
) -> Result<T, VoxquoteError> {
    req.with_body(|_, body| {
        if body.len() > settings.max_body_bytes {
            return Err(VoxquoteError::Parse {
                provider,
                message: format!(
                    "body is {} bytes, limit is {}",
                    body.len(),
                    settings.max_body_bytes
                ),
                source: None,
            });
        }
        serde_json::from_slice(body).map_err(|e| VoxquoteError::Parse {
            provider,
            message: "invalid JSON payload".to_string(),
            source: Some(Box::new(e)),
        })
    })?
}

/// Map vendor status vocabulary through `known`, applying the unknown-status
/// policy to anything it does not recognize. A missing status is pending.
pub(crate) fn resolve_status(
    provider: ProviderType,
    raw: Option<&str>,
    settings: &ParseSettings,
    known: impl Fn(&str) -> Option<CallStatus>,
) -> CallStatus {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return CallStatus::Pending;
    };
    if let Some(status) = known(&raw.to_ascii_lowercase()) {
        return status;
    }
    match settings.unknown_status {
        UnknownStatusPolicy::Pending => {
            warn!(provider = %provider, status = raw, "unrecognized call status, defaulting to pending");
            CallStatus::Pending
        }
        UnknownStatusPolicy::Failed => {
            warn!(provider = %provider, status = raw, "unrecognized call status, marking call failed");
            CallStatus::Failed
        }
    }
}

/// Render entries as `role: text` lines.
pub(crate) fn render_transcript(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {}", e.role, e.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build a transcript entry, dropping blank lines.
pub(crate) fn entry(role: &str, text: &str, offset_secs: Option<f64>) -> Option<TranscriptEntry> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(TranscriptEntry {
        role: SpeakerRole::from_vendor(role),
        text: text.to_string(),
        offset_secs: offset_secs.filter(|s| s.is_finite() && *s >= 0.0),
    })
}

/// Sanitize every entry's text; entries that become blank are dropped.
pub(crate) fn sanitize_entries(entries: Vec<TranscriptEntry>) -> Vec<TranscriptEntry> {
    entries
        .into_iter()
        .filter_map(|mut e| {
            e.text = crate::validate::sanitize_text(&e.text);
            (!e.text.is_empty()).then_some(e)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn vendor(raw: &str) -> Option<CallStatus> {
        match raw {
            "ended" => Some(CallStatus::Completed),
            _ => None,
        }
    }

    #[test]
    fn known_status_is_case_insensitive() {
        let status = resolve_status(
            ProviderType::Retell,
            Some(" ENDED "),
            &ParseSettings::default(),
            vendor,
        );
        assert_eq!(status, CallStatus::Completed);
    }

    #[traced_test]
    #[test]
    fn unknown_status_defaults_to_pending_with_warning() {
        let status = resolve_status(
            ProviderType::Vapi,
            Some("teleported"),
            &ParseSettings::default(),
            vendor,
        );
        assert_eq!(status, CallStatus::Pending);
        assert!(logs_contain("unrecognized call status"));
        assert!(logs_contain("teleported"));
    }

    #[traced_test]
    #[test]
    fn unknown_status_can_fail_loudly() {
        let settings = ParseSettings {
            unknown_status: UnknownStatusPolicy::Failed,
            ..ParseSettings::default()
        };
        let status = resolve_status(ProviderType::Bland, Some("weird"), &settings, vendor);
        assert_eq!(status, CallStatus::Failed);
        assert!(logs_contain("marking call failed"));
    }

    #[test]
    fn missing_status_is_pending() {
        let status = resolve_status(ProviderType::Bland, None, &ParseSettings::default(), vendor);
        assert_eq!(status, CallStatus::Pending);
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = Secret::new(Some("hunter2".into()));
        assert_eq!(format!("{secret:?}"), "[redacted]");
        assert!(!Secret::new(Some("  ".into())).is_set());
    }

    #[test]
    fn transcript_rendering() {
        let entries: Vec<_> = [("assistant", "Hello"), ("user", " "), ("user", "Hi")]
            .into_iter()
            .filter_map(|(r, t)| entry(r, t, None))
            .collect();
        assert_eq!(render_transcript(&entries), "agent: Hello\ncaller: Hi");
    }
}
