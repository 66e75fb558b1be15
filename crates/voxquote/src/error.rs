// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::PathBuf;

use voxquote_core::VoxquoteError;
use voxquote_summarizer::SummarizeError;

/// Failure of a CLI subcommand.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Webhook(#[from] VoxquoteError),

    #[error(transparent)]
    Summarize(#[from] SummarizeError),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// 2 for a rejected webhook (authentication or validation), 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Webhook(e) if e.is_rejection() => 2,
            _ => 1,
        }
    }
}
