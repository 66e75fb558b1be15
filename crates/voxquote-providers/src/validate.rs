// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payload validation and free-text sanitization.
//!
//! Every check appends to a [`ValidationErrors`] so one response reports
//! every problem in the payload at once.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;
use voxquote_core::{MAX_CALL_ID_LEN, ValidationErrors};

/// Upper bound on transcript text, in bytes.
pub const MAX_TRANSCRIPT_BYTES: usize = 512 * 1024;

/// Upper bound on a recording URL, in bytes.
pub const MAX_URL_LEN: usize = 2048;

/// E.164 after stripping formatting: optional `+`, no leading zero, 7-15 digits.
static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{6,14}$").unwrap());

/// Markup that has no business in a phone-call transcript.
static SCRIPT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)<\s*script").unwrap(),
        Regex::new(r"(?i)javascript\s*:").unwrap(),
        Regex::new(r"(?i)<[^>]*\bon[a-z]+\s*=").unwrap(),
        Regex::new(r"(?i)<\s*iframe").unwrap(),
    ]
});

/// Accumulates field errors for one payload.
#[derive(Debug, Default)]
pub struct PayloadCheck {
    errors: ValidationErrors,
}

impl PayloadCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// The provider call id is required, bounded and single-line.
    pub fn call_id(&mut self, call_id: Option<&str>) -> &mut Self {
        match call_id.map(str::trim) {
            None | Some("") => self.errors.push("call_id", "is required"),
            Some(id) => {
                if id.len() > MAX_CALL_ID_LEN {
                    self.errors.push(
                        "call_id",
                        format!("must be at most {MAX_CALL_ID_LEN} bytes, got {}", id.len()),
                    );
                }
                if id.chars().any(char::is_control) {
                    self.errors.push("call_id", "must not contain control characters");
                }
            }
        }
        self
    }

    /// Absent numbers are fine; present ones must look like E.164.
    pub fn phone(&mut self, field: &str, number: Option<&str>) -> &mut Self {
        if let Some(number) = number.map(str::trim).filter(|n| !n.is_empty())
            && !is_phone_number(number)
        {
            self.errors.push(field, "is not a valid phone number");
        }
        self
    }

    /// Bounded size, no script injection, no control characters besides
    /// newline, tab and carriage return.
    pub fn transcript(&mut self, field: &str, text: &str) -> &mut Self {
        if text.len() > MAX_TRANSCRIPT_BYTES {
            self.errors.push(
                field,
                format!("exceeds {MAX_TRANSCRIPT_BYTES} bytes ({} bytes)", text.len()),
            );
        }
        if SCRIPT_PATTERNS.iter().any(|p| p.is_match(text)) {
            self.errors.push(field, "contains script content");
        }
        if text
            .chars()
            .any(|c| c.is_control() && !matches!(c, '\n' | '\t' | '\r'))
        {
            self.errors.push(field, "contains control characters");
        }
        self
    }

    /// Absent URLs are fine; present ones must be absolute http(s).
    pub fn recording_url(&mut self, url: Option<&str>) -> &mut Self {
        let Some(raw) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return self;
        };
        if raw.len() > MAX_URL_LEN {
            self.errors
                .push("recording_url", format!("exceeds {MAX_URL_LEN} bytes"));
            return self;
        }
        match Url::parse(raw) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {}
            Ok(_) => self
                .errors
                .push("recording_url", "must be an http or https URL"),
            Err(e) => self
                .errors
                .push("recording_url", format!("is not a valid URL: {e}")),
        }
        self
    }

    /// Record a failure found outside the standard checks.
    pub fn push(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors.push(field, message);
        self
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        self.errors.into_result()
    }
}

/// Loose E.164 check. Spaces, dashes, dots and parentheses are ignored.
pub fn is_phone_number(raw: &str) -> bool {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    PHONE.is_match(&digits)
}

/// Strip NUL bytes, turn other control characters (except newline, tab and
/// carriage return) into spaces, and trim.
pub fn sanitize_text(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '\0')
        .map(|c| {
            if c.is_control() && !matches!(c, '\n' | '\t' | '\r') {
                ' '
            } else {
                c
            }
        })
        .collect();
    cleaned.trim().to_string()
}

/// [`sanitize_text`] for optional fields; blank results become `None`.
pub fn sanitize_opt(raw: Option<&str>) -> Option<String> {
    raw.map(sanitize_text).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_numbers() {
        assert!(is_phone_number("+14155550123"));
        assert!(is_phone_number("+1 (415) 555-0123"));
        assert!(is_phone_number("4155550123"));
        assert!(!is_phone_number("+0123456789"));
        assert!(!is_phone_number("12345"));
        assert!(!is_phone_number("call me maybe"));
        assert!(!is_phone_number("+1234567890123456"));
    }

    #[test]
    fn collects_every_failure() {
        let mut check = PayloadCheck::new();
        check
            .call_id(None)
            .phone("to_number", Some("nope"))
            .transcript("transcript", "hi <script>alert(1)</script>")
            .recording_url(Some("ftp://files.example.com/a.mp3"));
        let errors = check.finish().unwrap_err();
        assert_eq!(errors.len(), 4, "{errors}");
        assert!(errors.has_field("call_id"));
        assert!(errors.has_field("to_number"));
        assert!(errors.has_field("transcript"));
        assert!(errors.has_field("recording_url"));
    }

    #[test]
    fn clean_payload_passes() {
        let mut check = PayloadCheck::new();
        check
            .call_id(Some("call-123"))
            .phone("from_number", Some("+442071838750"))
            .phone("to_number", None)
            .transcript("transcript", "Agent: Hello\nCaller: Hi,\tI need a quote.\r\n")
            .recording_url(Some("https://cdn.example.com/rec/123.wav"));
        assert!(check.finish().is_ok());
    }

    #[test]
    fn script_patterns_are_case_insensitive() {
        for text in ["<SCRIPT src=x>", "JavaScript:void(0)", "<img onerror=x>", "< iframe"] {
            let mut check = PayloadCheck::new();
            check.transcript("transcript", text);
            assert!(check.finish().is_err(), "should reject {text:?}");
        }
        for text in [
            "We can start on Monday. Someone = me.",
            "Caller: one = two, only = three rooms",
            "Agent: online = fine",
        ] {
            let mut check = PayloadCheck::new();
            check.transcript("transcript", text);
            assert!(check.finish().is_ok(), "should accept {text:?}");
        }
    }

    #[test]
    fn transcript_control_characters() {
        let mut check = PayloadCheck::new();
        check.transcript("transcript", "bell\u{7}");
        assert!(check.finish().is_err());
    }

    #[test]
    fn oversized_transcript() {
        let mut check = PayloadCheck::new();
        check.transcript("transcript", &"a".repeat(MAX_TRANSCRIPT_BYTES + 1));
        assert!(check.finish().is_err());
    }

    #[test]
    fn call_id_limits() {
        let mut check = PayloadCheck::new();
        check.call_id(Some(&"x".repeat(MAX_CALL_ID_LEN + 1)));
        assert!(check.finish().is_err());

        let mut check = PayloadCheck::new();
        check.call_id(Some("abc\ndef"));
        assert!(check.finish().is_err());
    }

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_text("  a\0b\u{1b}c\n "), "ab c");
        assert_eq!(sanitize_opt(Some(" \0 ")), None);
        assert_eq!(sanitize_opt(Some("Jane\u{8}Doe")), Some("Jane Doe".to_string()));
    }
}
