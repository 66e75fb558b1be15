// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Voxquote.
//!
//! This crate provides the canonical call-event model every vendor webhook is
//! normalized into, the shared error types, the injectable [`Clock`], and the
//! [`Provider`] trait that all vendor adapters implement.

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;
pub mod webhook;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{system_clock, Clock, ManualClock, SystemClock};
pub use error::{FieldError, ValidationErrors, VoxquoteError};
pub use traits::Provider;
pub use types::{
    CallEvent, CallEventBuilder, CallStatus, ExtractedData, ProviderType, SpeakerRole,
    TranscriptEntry, MAX_CALL_DURATION_SECS, MAX_CALL_ID_LEN,
};
pub use webhook::WebhookRequest;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_type_round_trips_through_strings() {
        use std::str::FromStr;

        for provider in ProviderType::ALL {
            let s = provider.to_string();
            let parsed = ProviderType::from_str(&s).expect("should parse back");
            assert_eq!(provider, parsed);
        }
        assert_eq!(ProviderType::Vapi.to_string(), "vapi");
    }

    #[test]
    fn provider_type_serialization() {
        let json = serde_json::to_string(&ProviderType::Retell).expect("should serialize");
        assert_eq!(json, "\"retell\"");
        let parsed: ProviderType = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(parsed, ProviderType::Retell);
    }

    #[test]
    fn call_status_terminal_states() {
        assert!(CallStatus::Completed.is_complete());
        assert!(CallStatus::Failed.is_complete());
        assert!(CallStatus::NoAnswer.is_complete());
        assert!(!CallStatus::Pending.is_complete());
        assert!(!CallStatus::InProgress.is_complete());
        assert!(!CallStatus::Voicemail.is_complete());
        assert!(!CallStatus::Transferred.is_complete());
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_provider<T: Provider>() {}
        fn _assert_clock<T: Clock>() {}
    }
}
