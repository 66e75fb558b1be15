// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Voxquote.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use voxquote_core::ProviderType;

const REDACTED: &str = "[redacted]";

/// Top-level Voxquote configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VoxquoteConfig {
    /// Log level and output format.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Vendor webhook adapters.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Remote summarization service.
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Circuit breaker guarding the summarization call.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry policy for the summarization call.
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Cost guard on summarization requests.
    #[serde(default)]
    pub quote_limits: QuoteLimitsConfig,

    /// Per-principal limits for authenticated endpoints.
    #[serde(default)]
    pub user_limits: UserLimitsConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// What to do with a vendor status string that has no canonical mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownStatusPolicy {
    /// Log a warning and treat the call as pending.
    #[default]
    Pending,
    /// Log a warning and treat the call as failed.
    Failed,
}

/// Vendor adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// Adapter used for vendor-agnostic outbound operations.
    #[serde(default)]
    pub primary: Option<ProviderType>,

    /// Mapping for unrecognized vendor status vocabulary.
    #[serde(default)]
    pub unknown_status: UnknownStatusPolicy,

    /// Webhook bodies larger than this are rejected before decoding.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default)]
    pub bland: VendorConfig,

    #[serde(default)]
    pub vapi: VapiConfig,

    #[serde(default)]
    pub retell: VendorConfig,

    #[serde(default)]
    pub custom: CustomProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            primary: None,
            unknown_status: UnknownStatusPolicy::default(),
            max_body_bytes: default_max_body_bytes(),
            bland: VendorConfig::default(),
            vapi: VapiConfig::default(),
            retell: VendorConfig::default(),
            custom: CustomProviderConfig::default(),
        }
    }
}

impl ProvidersConfig {
    /// Whether the adapter for `provider` is switched on.
    pub fn is_enabled(&self, provider: ProviderType) -> bool {
        match provider {
            ProviderType::Bland => self.bland.enabled,
            ProviderType::Vapi => self.vapi.enabled,
            ProviderType::Retell => self.retell.enabled,
            ProviderType::Custom => self.custom.enabled,
            ProviderType::Livekit => false,
        }
    }
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Settings shared by vendors that authenticate with a single HMAC secret.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VendorConfig {
    #[serde(default)]
    pub enabled: bool,

    /// HMAC-SHA256 key. `None` disables verification (logged as degraded).
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl fmt::Debug for VendorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorConfig")
            .field("enabled", &self.enabled)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| REDACTED))
            .finish()
    }
}

/// Vapi accepts an HMAC signature, a bearer token, or a shared-secret header.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VapiConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Used for the HMAC signature and the `X-Vapi-Secret` header.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Expected `Authorization: Bearer` credential. Falls back to `webhook_secret`.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl fmt::Debug for VapiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VapiConfig")
            .field("enabled", &self.enabled)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| REDACTED))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| REDACTED))
            .finish()
    }
}

/// Self-hosted agent posting near-canonical JSON.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CustomProviderConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub webhook_secret: Option<String>,

    #[serde(default = "default_custom_path")]
    pub webhook_path: String,

    /// Header carrying the hex HMAC-SHA256 digest.
    #[serde(default = "default_custom_signature_header")]
    pub signature_header: String,
}

impl Default for CustomProviderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_secret: None,
            webhook_path: default_custom_path(),
            signature_header: default_custom_signature_header(),
        }
    }
}

impl fmt::Debug for CustomProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomProviderConfig")
            .field("enabled", &self.enabled)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| REDACTED))
            .field("webhook_path", &self.webhook_path)
            .field("signature_header", &self.signature_header)
            .finish()
    }
}

fn default_custom_path() -> String {
    "/webhooks/custom".to_string()
}

fn default_custom_signature_header() -> String {
    "X-Signature".to_string()
}

/// Remote summarization API configuration (Anthropic Messages API shape).
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_endpoint")]
    pub endpoint: String,

    /// API key. `None` requires the `VOXQUOTE_SUMMARIZER_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_summarizer_model")]
    pub model: String,

    #[serde(default = "default_summarizer_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request timeout.
    #[serde(default = "default_summarizer_timeout")]
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_summarizer_endpoint(),
            api_key: None,
            model: default_summarizer_model(),
            max_tokens: default_summarizer_max_tokens(),
            api_version: default_api_version(),
            timeout_secs: default_summarizer_timeout(),
        }
    }
}

impl fmt::Debug for SummarizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummarizerConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("api_version", &self.api_version)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_summarizer_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_summarizer_model() -> String {
    "claude-haiku-4-5".to_string()
}

fn default_summarizer_max_tokens() -> u32 {
    1024
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_summarizer_timeout() -> u64 {
    60
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in closed state before opening.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Consecutive half-open successes before closing.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Seconds to stay open before probing.
    #[serde(default = "default_open_timeout")]
    pub open_timeout_secs: u64,

    /// Maximum simultaneous half-open probes.
    #[serde(default = "default_half_open_max")]
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            open_timeout_secs: default_open_timeout(),
            half_open_max_requests: default_half_open_max(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_open_timeout() -> u64 {
    30
}

fn default_half_open_max() -> u32 {
    1
}

/// Exponential backoff policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackoffConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Retries after the first attempt. 0 retries forever.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fraction of the delay applied as +/- uniform noise.
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    #[serde(default = "default_retryable_status_codes")]
    pub retryable_status_codes: Vec<u16>,

    #[serde(default = "default_true")]
    pub always_retry_429: bool,

    #[serde(default = "default_true")]
    pub honor_retry_after: bool,

    #[serde(default)]
    pub adaptive: AdaptiveBackoffConfig,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            max_retries: default_max_retries(),
            jitter: default_jitter(),
            retryable_status_codes: default_retryable_status_codes(),
            always_retry_429: true,
            honor_retry_after: true,
            adaptive: AdaptiveBackoffConfig::default(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_jitter() -> f64 {
    0.1
}

fn default_retryable_status_codes() -> Vec<u16> {
    vec![408, 429, 500, 502, 503, 504, 529]
}

fn default_true() -> bool {
    true
}

/// Streak-driven multiplier tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdaptiveBackoffConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Consecutive successful sequences before the multiplier shrinks.
    #[serde(default = "default_success_streak")]
    pub success_streak: u32,

    /// Consecutive failed sequences before the multiplier grows.
    #[serde(default = "default_failure_streak")]
    pub failure_streak: u32,

    #[serde(default = "default_min_multiplier")]
    pub min_multiplier: f64,

    #[serde(default = "default_max_multiplier")]
    pub max_multiplier: f64,

    /// Amount the multiplier moves per adjustment.
    #[serde(default = "default_step")]
    pub step: f64,
}

impl Default for AdaptiveBackoffConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            success_streak: default_success_streak(),
            failure_streak: default_failure_streak(),
            min_multiplier: default_min_multiplier(),
            max_multiplier: default_max_multiplier(),
            step: default_step(),
        }
    }
}

fn default_success_streak() -> u32 {
    5
}

fn default_failure_streak() -> u32 {
    3
}

fn default_min_multiplier() -> f64 {
    1.5
}

fn default_max_multiplier() -> f64 {
    4.0
}

fn default_step() -> f64 {
    0.25
}

/// Quote (summarization) rate limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuoteLimitsConfig {
    #[serde(default = "default_quote_per_minute")]
    pub max_per_minute: u32,

    #[serde(default = "default_quote_per_hour")]
    pub max_per_hour: u32,

    #[serde(default = "default_quote_per_day")]
    pub max_per_day: u32,

    /// In-flight summarizations.
    #[serde(default = "default_quote_concurrent")]
    pub max_concurrent: u32,

    /// Poll interval for `wait`.
    #[serde(default = "default_wait_poll_ms")]
    pub wait_poll_ms: u64,
}

impl Default for QuoteLimitsConfig {
    fn default() -> Self {
        Self {
            max_per_minute: default_quote_per_minute(),
            max_per_hour: default_quote_per_hour(),
            max_per_day: default_quote_per_day(),
            max_concurrent: default_quote_concurrent(),
            wait_poll_ms: default_wait_poll_ms(),
        }
    }
}

fn default_quote_per_minute() -> u32 {
    10
}

fn default_quote_per_hour() -> u32 {
    100
}

fn default_quote_per_day() -> u32 {
    500
}

fn default_quote_concurrent() -> u32 {
    3
}

fn default_wait_poll_ms() -> u64 {
    100
}

/// Per-user rate limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UserLimitsConfig {
    #[serde(default = "default_user_per_minute")]
    pub max_per_minute: u32,

    #[serde(default = "default_user_per_hour")]
    pub max_per_hour: u32,

    #[serde(default = "default_user_per_day")]
    pub max_per_day: u32,

    /// Principals idle longer than this are evicted by the sweep.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for UserLimitsConfig {
    fn default() -> Self {
        Self {
            max_per_minute: default_user_per_minute(),
            max_per_hour: default_user_per_hour(),
            max_per_day: default_user_per_day(),
            stale_after_secs: default_stale_after(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_user_per_minute() -> u32 {
    60
}

fn default_user_per_hour() -> u32 {
    1_000
}

fn default_user_per_day() -> u32 {
    10_000
}

fn default_stale_after() -> u64 {
    86_400
}

fn default_sweep_interval() -> u64 {
    300
}
