// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `voxquote parse` and `voxquote summarize` command implementations.
//!
//! Both replay a webhook body from disk through the same registry the
//! service uses, so signature checks, validation and normalization behave
//! exactly as they would for a live delivery.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Args;
use hmac::{Hmac, Mac};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use sha2::Sha256;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use voxquote_config::VoxquoteConfig;
use voxquote_core::{CallStatus, ProviderType, WebhookRequest, system_clock};
use voxquote_providers::{ProviderRegistry, bland, build_registry, retell, vapi};
use voxquote_summarizer::{HttpSummarizer, ResilientSummarizer, Summary, SummaryRequest};

use crate::error::CliError;

#[derive(Args, Debug)]
pub struct WebhookArgs {
    /// File holding the raw webhook body (`-` reads stdin).
    pub file: PathBuf,

    /// Path the webhook was delivered to. Defaults to the primary provider's path.
    #[arg(long)]
    pub path: Option<String>,

    /// Extra request header as `Name: value`. Repeatable.
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(HeaderName, HeaderValue)>,

    /// Sign the body with the configured webhook secret, as the vendor would.
    #[arg(long)]
    pub sign: bool,
}

#[derive(Debug, Serialize)]
struct SummaryOutput<'a> {
    call_id: &'a str,
    provider: ProviderType,
    status: CallStatus,
    #[serde(flatten)]
    summary: &'a Summary,
}

pub fn run_parse(
    config: &VoxquoteConfig,
    cancel: &CancellationToken,
    args: &WebhookArgs,
) -> Result<(), CliError> {
    let registry = build_registry(config)?;
    let mut req = build_request(config, &registry, args)?;
    let event = registry.handle_webhook(cancel, &mut req)?;
    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}

pub async fn run_summarize(
    config: &VoxquoteConfig,
    cancel: &CancellationToken,
    args: &WebhookArgs,
    instructions: Option<String>,
) -> Result<(), CliError> {
    let registry = build_registry(config)?;
    let mut req = build_request(config, &registry, args)?;
    let event = registry.handle_webhook(cancel, &mut req)?;
    info!(call_id = event.call_id(), provider = %event.provider(), "webhook normalized");

    let client = HttpSummarizer::new(&config.summarizer)?;
    let summarizer = ResilientSummarizer::from_config(client, config, system_clock());
    let mut request = SummaryRequest::from_event(&event);
    if let Some(instructions) = instructions {
        request = request.with_instructions(instructions);
    }

    let result = summarizer.summarize(cancel, &request).await;
    debug!(stats = ?summarizer.stats(), "summarizer guards");
    let summary = result?;

    let output = SummaryOutput {
        call_id: event.call_id(),
        provider: event.provider(),
        status: event.status(),
        summary: &summary,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn build_request(
    config: &VoxquoteConfig,
    registry: &ProviderRegistry,
    args: &WebhookArgs,
) -> Result<WebhookRequest, CliError> {
    let body = read_body(&args.file)?;
    let path = match &args.path {
        Some(path) => path.clone(),
        None => registry.primary()?.webhook_path().to_string(),
    };

    let mut headers = HeaderMap::new();
    for (name, value) in &args.headers {
        headers.append(name.clone(), value.clone());
    }

    if args.sign {
        let provider = registry.get_by_webhook_path(&path)?.name();
        let (header, secret) = signing_key(config, provider)?;
        let name = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| CliError::Usage(format!("invalid signature header {header}: {e}")))?;
        let value = HeaderValue::from_str(&sign(&secret, &body)?)
            .map_err(|e| CliError::Usage(format!("invalid signature value: {e}")))?;
        headers.insert(name, value);
    }

    Ok(WebhookRequest::new(path, headers, body))
}

fn read_body(file: &Path) -> Result<Vec<u8>, CliError> {
    let io_err = |source| CliError::Io {
        path: file.to_path_buf(),
        source,
    };
    if file.as_os_str() == "-" {
        let mut body = Vec::new();
        std::io::stdin().read_to_end(&mut body).map_err(io_err)?;
        Ok(body)
    } else {
        std::fs::read(file).map_err(io_err)
    }
}

/// Signature header and secret the vendor would sign with.
fn signing_key(
    config: &VoxquoteConfig,
    provider: ProviderType,
) -> Result<(String, String), CliError> {
    let p = &config.providers;
    let (header, secret) = match provider {
        ProviderType::Bland => (bland::BLAND_SIGNATURE_HEADER.to_string(), &p.bland.webhook_secret),
        ProviderType::Vapi => (vapi::VAPI_SIGNATURE_HEADER.to_string(), &p.vapi.webhook_secret),
        ProviderType::Retell => {
            (retell::RETELL_SIGNATURE_HEADER.to_string(), &p.retell.webhook_secret)
        }
        ProviderType::Custom => (p.custom.signature_header.clone(), &p.custom.webhook_secret),
        ProviderType::Livekit => {
            return Err(CliError::Usage("livekit webhooks are not supported".into()));
        }
    };
    let secret = secret
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CliError::Usage(format!("no webhook secret configured for {provider}")))?;
    Ok((header, secret))
}

fn sign(secret: &str, body: &[u8]) -> Result<String, CliError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| CliError::Usage(format!("unusable webhook secret: {e}")))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got `{raw}`"))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| e.to_string())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|e| e.to_string())?;
    Ok((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use voxquote_test_utils::fixtures;

    const CONFIG: &str = r#"
        [providers]
        primary = "bland"

        [providers.bland]
        enabled = true
        webhook_secret = "bland-secret"

        [providers.retell]
        enabled = true
    "#;

    fn body_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    fn args(file: &Path, path: Option<&str>, sign: bool) -> WebhookArgs {
        WebhookArgs {
            file: file.to_path_buf(),
            path: path.map(str::to_string),
            headers: Vec::new(),
            sign,
        }
    }

    #[test]
    fn signed_body_normalizes_through_primary_path() {
        let config = voxquote_config::load_config_from_str(CONFIG).unwrap();
        let registry = build_registry(&config).unwrap();
        let file = body_file(&fixtures::bland_completed_body());

        let mut req = build_request(&config, &registry, &args(file.path(), None, true)).unwrap();
        assert_eq!(req.path(), "/webhooks/bland");
        assert_eq!(
            req.header_str("x-webhook-signature").map(str::len),
            Some(64)
        );
        let event = registry
            .handle_webhook(&CancellationToken::new(), &mut req)
            .unwrap();
        assert_eq!(event.call_id(), "bland-call-1");
    }

    #[test]
    fn unsigned_body_is_rejected_with_exit_code_two() {
        let config = voxquote_config::load_config_from_str(CONFIG).unwrap();
        let registry = build_registry(&config).unwrap();
        let file = body_file(&fixtures::bland_completed_body());

        let mut req = build_request(&config, &registry, &args(file.path(), None, false)).unwrap();
        let err = CliError::from(
            registry
                .handle_webhook(&CancellationToken::new(), &mut req)
                .unwrap_err(),
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn signing_needs_a_configured_secret() {
        let config = voxquote_config::load_config_from_str(CONFIG).unwrap();
        let registry = build_registry(&config).unwrap();
        let file = body_file(&fixtures::retell_call_analyzed_body());

        let err = build_request(
            &config,
            &registry,
            &args(file.path(), Some("/webhooks/retell"), true),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Usage(msg) if msg.contains("retell")));
    }

    #[test]
    fn missing_file_reports_path() {
        let config = voxquote_config::load_config_from_str(CONFIG).unwrap();
        let registry = build_registry(&config).unwrap();
        let err = build_request(
            &config,
            &registry,
            &args(Path::new("/nonexistent/voxquote-body.json"), None, false),
        )
        .unwrap_err();
        assert!(err.to_string().contains("voxquote-body.json"));
    }

    #[test]
    fn header_argument_parsing() {
        let (name, value) = parse_header("X-Vapi-Secret:  s3cret ").unwrap();
        assert_eq!(name.as_str(), "x-vapi-secret");
        assert_eq!(value, "s3cret");
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header("bad name: v").is_err());
    }
}
