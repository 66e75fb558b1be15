// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./voxquote.toml` > `~/.config/voxquote/voxquote.toml` > `/etc/voxquote/voxquote.toml`
//! with environment variable overrides via `VOXQUOTE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::VoxquoteConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/voxquote/voxquote.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "voxquote.toml";
pub(crate) const USER_CONFIG_SUFFIX: &str = "voxquote/voxquote.toml";

/// Env key prefixes (lowercased, `VOXQUOTE_` stripped) and the dotted section
/// they address. Longer prefixes come first so nested tables win.
const ENV_SECTIONS: &[(&str, &str)] = &[
    ("providers_bland_", "providers.bland."),
    ("providers_vapi_", "providers.vapi."),
    ("providers_retell_", "providers.retell."),
    ("providers_custom_", "providers.custom."),
    ("providers_", "providers."),
    ("backoff_adaptive_", "backoff.adaptive."),
    ("backoff_", "backoff."),
    ("circuit_breaker_", "circuit_breaker."),
    ("quote_limits_", "quote_limits."),
    ("user_limits_", "user_limits."),
    ("summarizer_", "summarizer."),
    ("logging_", "logging."),
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/voxquote/voxquote.toml` (system-wide)
/// 3. `~/.config/voxquote/voxquote.toml` (user XDG config)
/// 4. `./voxquote.toml` (local directory)
/// 5. `VOXQUOTE_*` environment variables
pub fn load_config() -> Result<VoxquoteConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<VoxquoteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VoxquoteConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<VoxquoteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VoxquoteConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(VoxquoteConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join(USER_CONFIG_SUFFIX))
                .unwrap_or_default(),
        ))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Keys contain underscores (`webhook_secret`, `max_per_minute`), so splitting
/// on `_` is ambiguous. `VOXQUOTE_PROVIDERS_BLAND_WEBHOOK_SECRET` must map to
/// `providers.bland.webhook_secret`.
fn env_provider() -> Env {
    Env::prefixed("VOXQUOTE_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    ENV_SECTIONS
        .iter()
        .find_map(|(prefix, dotted)| {
            key.strip_prefix(prefix)
                .map(|rest| format!("{dotted}{rest}"))
        })
        .unwrap_or_else(|| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_provider_keys_map_to_tables() {
        assert_eq!(
            map_env_key("providers_bland_webhook_secret"),
            "providers.bland.webhook_secret"
        );
        assert_eq!(
            map_env_key("providers_max_body_bytes"),
            "providers.max_body_bytes"
        );
        assert_eq!(
            map_env_key("backoff_adaptive_min_multiplier"),
            "backoff.adaptive.min_multiplier"
        );
        assert_eq!(
            map_env_key("circuit_breaker_failure_threshold"),
            "circuit_breaker.failure_threshold"
        );
    }

    #[test]
    fn unmapped_key_passes_through() {
        assert_eq!(map_env_key("whatever"), "whatever");
    }

    #[test]
    fn env_overrides_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
[providers.bland]
enabled = true
webhook_secret = "from-file"
"#,
            )?;
            jail.set_env("VOXQUOTE_PROVIDERS_BLAND_WEBHOOK_SECRET", "from-env");
            jail.set_env("VOXQUOTE_QUOTE_LIMITS_MAX_PER_MINUTE", "7");

            let config = load_config_from_path(Path::new("custom.toml"))?;
            assert!(config.providers.bland.enabled);
            assert_eq!(
                config.providers.bland.webhook_secret.as_deref(),
                Some("from-env")
            );
            assert_eq!(config.quote_limits.max_per_minute, 7);
            Ok(())
        });
    }
}
