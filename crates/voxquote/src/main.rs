// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Voxquote - voice-AI call webhook normalization and resilient
//! summarization.
//!
//! This is the binary entry point: it loads configuration, initializes
//! logging, and dispatches to the subcommands.

mod error;
mod providers;
mod webhook;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use voxquote_config::model::LoggingConfig;

use crate::error::CliError;

/// Voxquote - normalize voice-AI call webhooks and summarize the calls.
#[derive(Parser, Debug)]
#[command(name = "voxquote", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a webhook body through the registry and print the normalized event.
    Parse(webhook::WebhookArgs),
    /// Normalize a webhook, then summarize the call.
    Summarize {
        #[command(flatten)]
        webhook: webhook::WebhookArgs,
        /// Replace the default summarization instructions.
        #[arg(long)]
        instructions: Option<String>,
    },
    /// Validate configuration and report every problem found.
    CheckConfig,
    /// List the enabled webhook adapters.
    Providers {
        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => voxquote_config::load_and_validate_path(path),
        None => voxquote_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            voxquote_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let result: Result<(), CliError> = match cli.command {
        Commands::Parse(args) => webhook::run_parse(&config, &cancel, &args),
        Commands::Summarize {
            webhook,
            instructions,
        } => webhook::run_summarize(&config, &cancel, &webhook, instructions).await,
        Commands::CheckConfig => {
            println!("voxquote: configuration OK");
            Ok(())
        }
        Commands::Providers { json } => providers::run_providers(&config, json),
    };

    if let Err(e) = result {
        eprintln!("voxquote: {e}");
        std::process::exit(e.exit_code());
    }
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured
/// level. Logs go to stderr so command output stays machine-readable.
fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let level = &logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "voxquote={level},voxquote_core={level},voxquote_providers={level},\
             voxquote_resilience={level},voxquote_summarizer={level},warn"
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
