// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Voxquote.

use std::fmt;

use thiserror::Error;

use crate::types::ProviderType;

/// The primary error type used by provider adapters, the registry, and the
/// canonical event builder.
#[derive(Debug, Error)]
pub enum VoxquoteError {
    /// Configuration errors (missing secrets, invalid paths, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The webhook sender could not be authenticated (signature mismatch,
    /// missing header). Always terminal for the request.
    #[error("webhook authentication failed for {provider}: {reason}")]
    Authentication {
        provider: ProviderType,
        reason: String,
    },

    /// The payload decoded but failed one or more semantic checks.
    #[error("webhook validation failed for {provider}: {errors}")]
    Validation {
        provider: ProviderType,
        errors: ValidationErrors,
    },

    /// The payload could not be decoded at all.
    #[error("failed to parse {provider} webhook: {message}")]
    Parse {
        provider: ProviderType,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No adapter is registered under the requested type or path.
    #[error("provider not found: {key}")]
    ProviderNotFound { key: String },

    /// An attempt was made to designate an unregistered provider as primary.
    #[error("cannot set primary provider {provider}: not registered")]
    PrimaryNotRegistered { provider: ProviderType },

    /// The caller cancelled the operation before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VoxquoteError {
    /// Returns `true` for authentication and validation failures, which must
    /// never be retried by this system (the vendor owns redelivery).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            VoxquoteError::Authentication { .. }
                | VoxquoteError::Validation { .. }
                | VoxquoteError::Parse { .. }
        )
    }
}

/// A single failed field check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted field name as it appears in the canonical event.
    pub field: String,
    /// Human-readable description of the failure.
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every validation failure found in one payload.
///
/// Checks never stop at the first problem, so a caller sees the complete list
/// in one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Append every failure from `other`.
    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Whether any failure was recorded against `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "no validation errors");
        }
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
