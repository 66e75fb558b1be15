// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Summarization request/response types and the Messages API wire format.

use serde::{Deserialize, Serialize};
use voxquote_core::{CallEvent, ExtractedData, ProviderType};

const DEFAULT_INSTRUCTIONS: &str = "Summarize this phone call for a contractor preparing a \
quote. List the project type, requirements, timeline, budget and how the caller wants to be \
contacted. Say \"unknown\" for anything the caller did not mention.";

/// What to summarize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRequest {
    pub provider: ProviderType,
    pub call_id: String,
    pub transcript: String,
    pub extracted: Option<ExtractedData>,
    pub instructions: Option<String>,
}

impl SummaryRequest {
    pub fn from_event(event: &CallEvent) -> Self {
        Self {
            provider: event.provider(),
            call_id: event.call_id().to_string(),
            transcript: event.transcript().to_string(),
            extracted: event.extracted().cloned(),
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub(crate) fn system_prompt(&self) -> &str {
        self.instructions.as_deref().unwrap_or(DEFAULT_INSTRUCTIONS)
    }

    pub(crate) fn user_prompt(&self) -> String {
        let mut prompt = format!("Transcript:\n{}", self.transcript);
        if let Some(data) = &self.extracted
            && let Ok(json) = serde_json::to_string_pretty(data)
        {
            prompt.push_str("\n\nData the voice agent already extracted:\n");
            prompt.push_str(&json);
        }
        prompt
    }
}

/// A produced summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub system: &'a str,
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct WireMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    pub model: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl MessagesResponse {
    /// Concatenated text blocks; `None` when the reply carried no text.
    pub(crate) fn text(&self) -> Option<String> {
        let text: Vec<&str> = self
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();
        let joined = text.join("").trim().to_string();
        (!joined.is_empty()).then_some(joined)
    }
}
