// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider registry: resolves adapters by type or webhook path and tracks
//! the primary adapter.
//!
//! The registry is an ordinary value built by the composition root and
//! passed to whatever routes webhooks. There is no global instance.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use voxquote_config::VoxquoteConfig;
use voxquote_core::{CallEvent, Provider, ProviderType, VoxquoteError, WebhookRequest};

use crate::bland::BlandProvider;
use crate::common::ParseSettings;
use crate::custom::CustomProvider;
use crate::retell::RetellProvider;
use crate::vapi::VapiProvider;

/// Listing entry for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub name: ProviderType,
    pub webhook_path: String,
    pub primary: bool,
}

#[derive(Default)]
struct Inner {
    providers: BTreeMap<ProviderType, Arc<dyn Provider>>,
    primary: Option<ProviderType>,
}

/// Registered adapters keyed by [`ProviderType`].
///
/// Registering a type twice replaces the earlier adapter.
#[derive(Default)]
pub struct ProviderRegistry {
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("ProviderRegistry")
            .field("providers", &inner.providers.keys().collect::<Vec<_>>())
            .field("primary", &inner.primary)
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an adapter, replacing any previous one of the same type.
    pub fn register(&self, provider: Arc<dyn Provider>) {
        let name = provider.name();
        let replaced = self.write().providers.insert(name, provider).is_some();
        debug!(provider = %name, replaced, "provider registered");
    }

    pub fn get(&self, provider: ProviderType) -> Result<Arc<dyn Provider>, VoxquoteError> {
        self.read()
            .providers
            .get(&provider)
            .cloned()
            .ok_or_else(|| VoxquoteError::ProviderNotFound {
                key: provider.to_string(),
            })
    }

    /// Find the adapter that owns `path`. Matching is exact.
    pub fn get_by_webhook_path(&self, path: &str) -> Result<Arc<dyn Provider>, VoxquoteError> {
        self.read()
            .providers
            .values()
            .find(|p| p.webhook_path() == path)
            .cloned()
            .ok_or_else(|| VoxquoteError::ProviderNotFound {
                key: path.to_string(),
            })
    }

    /// Designate the primary adapter. The type must already be registered.
    pub fn set_primary(&self, provider: ProviderType) -> Result<(), VoxquoteError> {
        let mut inner = self.write();
        if !inner.providers.contains_key(&provider) {
            return Err(VoxquoteError::PrimaryNotRegistered { provider });
        }
        inner.primary = Some(provider);
        Ok(())
    }

    /// The primary adapter, or any registered adapter when no primary was
    /// set. Fails only when the registry is empty.
    pub fn primary(&self) -> Result<Arc<dyn Provider>, VoxquoteError> {
        let inner = self.read();
        let chosen = inner
            .primary
            .and_then(|p| inner.providers.get(&p))
            .or_else(|| inner.providers.values().next());
        chosen.cloned().ok_or_else(|| VoxquoteError::ProviderNotFound {
            key: "primary".to_string(),
        })
    }

    pub fn providers(&self) -> Vec<ProviderInfo> {
        let inner = self.read();
        inner
            .providers
            .values()
            .map(|p| ProviderInfo {
                name: p.name(),
                webhook_path: p.webhook_path().to_string(),
                primary: inner.primary == Some(p.name()),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().providers.is_empty()
    }

    /// Resolve the adapter by the request path, authenticate, then parse.
    pub fn handle_webhook(
        &self,
        cancel: &CancellationToken,
        req: &mut WebhookRequest,
    ) -> Result<CallEvent, VoxquoteError> {
        let provider = self.get_by_webhook_path(req.path())?;
        provider.verify_webhook(req)?;
        provider.parse_webhook(cancel, req)
    }
}

/// Build a registry holding every adapter enabled in `config`.
pub fn build_registry(config: &VoxquoteConfig) -> Result<ProviderRegistry, VoxquoteError> {
    let providers = &config.providers;
    let settings = ParseSettings {
        unknown_status: providers.unknown_status,
        max_body_bytes: providers.max_body_bytes,
    };
    let registry = ProviderRegistry::new();

    if providers.bland.enabled {
        registry.register(Arc::new(
            BlandProvider::new(providers.bland.webhook_secret.clone()).with_settings(settings),
        ));
    }
    if providers.vapi.enabled {
        registry.register(Arc::new(
            VapiProvider::new(
                providers.vapi.webhook_secret.clone(),
                providers.vapi.bearer_token.clone(),
            )
            .with_settings(settings),
        ));
    }
    if providers.retell.enabled {
        registry.register(Arc::new(
            RetellProvider::new(providers.retell.webhook_secret.clone()).with_settings(settings),
        ));
    }
    if providers.custom.enabled {
        registry.register(Arc::new(
            CustomProvider::new(providers.custom.webhook_secret.clone())
                .with_webhook_path(providers.custom.webhook_path.clone())
                .with_signature_header(providers.custom.signature_header.clone())
                .with_settings(settings),
        ));
    }

    if let Some(primary) = providers.primary {
        registry.set_primary(primary)?;
    }
    info!(
        providers = registry.len(),
        primary = ?providers.primary,
        "provider registry built"
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_type_and_path() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(BlandProvider::new(None)));
        registry.register(Arc::new(RetellProvider::new(None)));

        assert_eq!(registry.get(ProviderType::Retell).unwrap().name(), ProviderType::Retell);
        assert_eq!(
            registry.get_by_webhook_path("/webhooks/bland").unwrap().name(),
            ProviderType::Bland
        );
        assert!(matches!(
            registry.get(ProviderType::Vapi),
            Err(VoxquoteError::ProviderNotFound { .. })
        ));
        assert!(registry.get_by_webhook_path("/webhooks/bland/").is_err());
    }

    #[test]
    fn last_registration_wins() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(CustomProvider::new(None).with_webhook_path("/a")));
        registry.register(Arc::new(CustomProvider::new(None).with_webhook_path("/b")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(ProviderType::Custom).unwrap().webhook_path(), "/b");
    }

    #[test]
    fn primary_selection() {
        let registry = ProviderRegistry::new();
        assert!(registry.primary().is_err());

        registry.register(Arc::new(VapiProvider::new(None, None)));
        assert_eq!(registry.primary().unwrap().name(), ProviderType::Vapi);

        assert!(matches!(
            registry.set_primary(ProviderType::Retell),
            Err(VoxquoteError::PrimaryNotRegistered {
                provider: ProviderType::Retell
            })
        ));

        registry.register(Arc::new(RetellProvider::new(None)));
        registry.set_primary(ProviderType::Retell).unwrap();
        assert_eq!(registry.primary().unwrap().name(), ProviderType::Retell);
        let listing = registry.providers();
        assert!(listing.iter().any(|p| p.name == ProviderType::Retell && p.primary));
    }

    #[test]
    fn build_from_config() {
        let mut config = VoxquoteConfig::default();
        config.providers.bland.enabled = true;
        config.providers.custom.enabled = true;
        config.providers.custom.webhook_path = "/hooks/in-house".into();
        config.providers.primary = Some(ProviderType::Custom);

        let registry = build_registry(&config).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.primary().unwrap().name(), ProviderType::Custom);
        assert!(registry.get_by_webhook_path("/hooks/in-house").is_ok());
    }

    #[test]
    fn build_rejects_disabled_primary() {
        let mut config = VoxquoteConfig::default();
        config.providers.primary = Some(ProviderType::Vapi);
        assert!(matches!(
            build_registry(&config),
            Err(VoxquoteError::PrimaryNotRegistered { .. })
        ));
    }
}
