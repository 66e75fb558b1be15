// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Voxquote integration tests.
//!
//! # Components
//!
//! - [`fixtures`] - realistic webhook bodies for every supported vendor
//! - [`sign_hex`] - HMAC-SHA256 signing matching the vendors' signature headers
//! - [`MockSummarizer`] - scripted summarizer with a call counter

pub mod fixtures;
pub mod mock_summarizer;

pub use mock_summarizer::MockSummarizer;

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Hex-encoded HMAC-SHA256 of `body` under `secret`, without any prefix.
pub fn sign_hex(secret: &str, body: impl AsRef<[u8]>) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body.as_ref());
    hex::encode(mac.finalize().into_bytes())
}
