// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as threshold floors, ordered quotas, and webhook path collisions.

use crate::diagnostic::ConfigError;
use crate::model::VoxquoteConfig;

/// Fixed receiving paths of the built-in vendor adapters.
pub const VENDOR_WEBHOOK_PATHS: &[&str] = &["/webhooks/bland", "/webhooks/vapi", "/webhooks/retell"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &VoxquoteConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_providers(config, &mut errors);
    validate_summarizer(config, &mut errors);
    validate_breaker(config, &mut errors);
    validate_backoff(config, &mut errors);
    validate_limits(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_providers(config: &VoxquoteConfig, errors: &mut Vec<ConfigError>) {
    let providers = &config.providers;

    if let Some(primary) = providers.primary
        && !providers.is_enabled(primary)
    {
        errors.push(ConfigError::validation(format!(
            "providers.primary is `{primary}` but [providers.{primary}] is not enabled"
        )));
    }

    if providers.max_body_bytes == 0 {
        errors.push(ConfigError::validation(
            "providers.max_body_bytes must be at least 1",
        ));
    }

    let custom = &providers.custom;
    if custom.enabled {
        if !custom.webhook_path.starts_with('/') {
            errors.push(ConfigError::validation(format!(
                "providers.custom.webhook_path `{}` must start with `/`",
                custom.webhook_path
            )));
        }
        if VENDOR_WEBHOOK_PATHS.contains(&custom.webhook_path.as_str()) {
            errors.push(ConfigError::validation(format!(
                "providers.custom.webhook_path `{}` collides with a built-in vendor path",
                custom.webhook_path
            )));
        }
        if custom.signature_header.trim().is_empty() {
            errors.push(ConfigError::validation(
                "providers.custom.signature_header must not be empty",
            ));
        }
    }
}

fn validate_summarizer(config: &VoxquoteConfig, errors: &mut Vec<ConfigError>) {
    let endpoint = config.summarizer.endpoint.trim();
    match url::Url::parse(endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ConfigError::validation(format!(
            "summarizer.endpoint must use http or https, got `{}`",
            url.scheme()
        ))),
        Err(e) => errors.push(ConfigError::validation(format!(
            "summarizer.endpoint `{endpoint}` is not a valid URL: {e}"
        ))),
    }

    if config.summarizer.max_tokens == 0 {
        errors.push(ConfigError::validation(
            "summarizer.max_tokens must be at least 1",
        ));
    }
    if config.summarizer.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "summarizer.timeout_secs must be at least 1",
        ));
    }
}

fn validate_breaker(config: &VoxquoteConfig, errors: &mut Vec<ConfigError>) {
    let cb = &config.circuit_breaker;
    for (name, value) in [
        ("failure_threshold", cb.failure_threshold),
        ("success_threshold", cb.success_threshold),
        ("half_open_max_requests", cb.half_open_max_requests),
    ] {
        if value < 1 {
            errors.push(ConfigError::validation(format!(
                "circuit_breaker.{name} must be at least 1, got {value}"
            )));
        }
    }
}

fn validate_backoff(config: &VoxquoteConfig, errors: &mut Vec<ConfigError>) {
    let b = &config.backoff;

    if b.multiplier.is_nan() || b.multiplier < 1.0 {
        errors.push(ConfigError::validation(format!(
            "backoff.multiplier must be at least 1.0, got {}",
            b.multiplier
        )));
    }
    if !(0.0..=1.0).contains(&b.jitter) {
        errors.push(ConfigError::validation(format!(
            "backoff.jitter must be between 0.0 and 1.0, got {}",
            b.jitter
        )));
    }
    if b.initial_delay_ms > b.max_delay_ms {
        errors.push(ConfigError::validation(format!(
            "backoff.initial_delay_ms ({}) must not exceed backoff.max_delay_ms ({})",
            b.initial_delay_ms, b.max_delay_ms
        )));
    }
    for code in &b.retryable_status_codes {
        if !(100..=599).contains(code) {
            errors.push(ConfigError::validation(format!(
                "backoff.retryable_status_codes contains `{code}`, which is not an HTTP status"
            )));
        }
    }

    let a = &b.adaptive;
    if a.enabled {
        if a.min_multiplier.is_nan() || a.min_multiplier < 1.0 {
            errors.push(ConfigError::validation(format!(
                "backoff.adaptive.min_multiplier must be at least 1.0, got {}",
                a.min_multiplier
            )));
        }
        if a.min_multiplier > a.max_multiplier {
            errors.push(ConfigError::validation(format!(
                "backoff.adaptive.min_multiplier ({}) must not exceed max_multiplier ({})",
                a.min_multiplier, a.max_multiplier
            )));
        }
        if a.step.is_nan() || a.step <= 0.0 {
            errors.push(ConfigError::validation(format!(
                "backoff.adaptive.step must be positive, got {}",
                a.step
            )));
        }
        if a.success_streak < 1 || a.failure_streak < 1 {
            errors.push(ConfigError::validation(
                "backoff.adaptive streak lengths must be at least 1",
            ));
        }
    }
}

fn validate_limits(config: &VoxquoteConfig, errors: &mut Vec<ConfigError>) {
    let q = &config.quote_limits;
    check_windows(
        "quote_limits",
        q.max_per_minute,
        q.max_per_hour,
        q.max_per_day,
        errors,
    );
    if q.max_concurrent < 1 {
        errors.push(ConfigError::validation(
            "quote_limits.max_concurrent must be at least 1",
        ));
    }
    if q.wait_poll_ms == 0 {
        errors.push(ConfigError::validation(
            "quote_limits.wait_poll_ms must be at least 1",
        ));
    }

    let u = &config.user_limits;
    check_windows(
        "user_limits",
        u.max_per_minute,
        u.max_per_hour,
        u.max_per_day,
        errors,
    );
    if u.sweep_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "user_limits.sweep_interval_secs must be at least 1",
        ));
    }
    if u.stale_after_secs == 0 {
        errors.push(ConfigError::validation(
            "user_limits.stale_after_secs must be at least 1",
        ));
    }
}

fn check_windows(section: &str, minute: u32, hour: u32, day: u32, errors: &mut Vec<ConfigError>) {
    for (name, value) in [
        ("max_per_minute", minute),
        ("max_per_hour", hour),
        ("max_per_day", day),
    ] {
        if value < 1 {
            errors.push(ConfigError::validation(format!(
                "{section}.{name} must be at least 1, got {value}"
            )));
        }
    }
    if hour < minute {
        errors.push(ConfigError::validation(format!(
            "{section}.max_per_hour ({hour}) must be at least max_per_minute ({minute})"
        )));
    }
    if day < hour {
        errors.push(ConfigError::validation(format!(
            "{section}.max_per_day ({day}) must be at least max_per_hour ({hour})"
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxquote_core::ProviderType;

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&VoxquoteConfig::default()).is_ok());
    }

    #[test]
    fn primary_must_be_enabled() {
        let mut config = VoxquoteConfig::default();
        config.providers.primary = Some(ProviderType::Vapi);
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "providers.primary"));

        config.providers.vapi.enabled = true;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn custom_path_collision_is_rejected() {
        let mut config = VoxquoteConfig::default();
        config.providers.custom.enabled = true;
        config.providers.custom.webhook_path = "/webhooks/bland".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "collides"));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = VoxquoteConfig::default();
        config.circuit_breaker.failure_threshold = 0;
        config.backoff.multiplier = 0.5;
        config.backoff.jitter = 1.5;
        config.quote_limits.max_per_hour = 1;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 4, "expected every failure, got {errors:?}");
        assert!(has_message(&errors, "failure_threshold"));
        assert!(has_message(&errors, "multiplier"));
        assert!(has_message(&errors, "jitter"));
        assert!(has_message(&errors, "quote_limits.max_per_hour"));
    }

    #[test]
    fn nan_multiplier_is_rejected() {
        let mut config = VoxquoteConfig::default();
        config.backoff.multiplier = f64::NAN;
        assert!(has_message(
            &validate_config(&config).unwrap_err(),
            "backoff.multiplier"
        ));
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let mut config = VoxquoteConfig::default();
        config.summarizer.endpoint = "ftp://example.com/summarize".into();
        assert!(has_message(
            &validate_config(&config).unwrap_err(),
            "summarizer.endpoint"
        ));
    }

    #[test]
    fn adaptive_bounds_checked_only_when_enabled() {
        let mut config = VoxquoteConfig::default();
        config.backoff.adaptive.min_multiplier = 5.0;
        config.backoff.adaptive.max_multiplier = 2.0;
        assert!(validate_config(&config).is_ok());

        config.backoff.adaptive.enabled = true;
        assert!(has_message(
            &validate_config(&config).unwrap_err(),
            "min_multiplier"
        ));
    }
}
