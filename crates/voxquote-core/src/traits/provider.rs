// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vendor adapter trait.

use tokio_util::sync::CancellationToken;

use crate::error::VoxquoteError;
use crate::types::{CallEvent, ProviderType};
use crate::webhook::WebhookRequest;

/// A voice-platform adapter: authenticates and normalizes that vendor's
/// webhooks.
///
/// Adapters are stateless with respect to requests and are shared across
/// threads behind an `Arc`.
pub trait Provider: Send + Sync + 'static {
    /// Which vendor this adapter speaks for.
    fn name(&self) -> ProviderType;

    /// The fixed HTTP path this adapter receives webhooks on.
    fn webhook_path(&self) -> &str;

    /// Authenticate the sender.
    ///
    /// Implementations that read the body must restore it before returning,
    /// on success and on failure alike. With no secret configured this
    /// returns `Ok(())` and logs a degraded-security warning.
    fn verify_webhook(&self, req: &mut WebhookRequest) -> Result<(), VoxquoteError>;

    /// Boolean form of [`Provider::verify_webhook`].
    fn validate_webhook(&self, req: &mut WebhookRequest) -> bool {
        self.verify_webhook(req).is_ok()
    }

    /// Decode, validate, sanitize and normalize the payload.
    ///
    /// Returns [`VoxquoteError::Cancelled`] if `cancel` fires before the
    /// event is produced.
    fn parse_webhook(
        &self,
        cancel: &CancellationToken,
        req: &mut WebhookRequest,
    ) -> Result<CallEvent, VoxquoteError>;
}
