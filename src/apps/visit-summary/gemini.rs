// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::provider::{chunk_stream, open_event_stream, stream_error, ChunkStream, LlmProvider};
use super::types::{Prompt, StreamChunk};
use crate::RelayError;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

pub const GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Fast-generation backend (Gemini `streamGenerateContent`).
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, GEMINI_MODEL
        )
    }
}

pub fn request_body(prompt: &Prompt) -> serde_json::Value {
    json!({
        "systemInstruction": {
            "parts": [{ "text": prompt.system }]
        },
        "contents": [
            {
                "role": "user",
                "parts": [{ "text": prompt.user }]
            }
        ]
    })
}

/// Text of one `GenerateContentResponse` event. Events without text give an empty chunk.
pub fn parse_event(data: &str) -> Result<StreamChunk, RelayError> {
    let payload: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| RelayError::ProviderStream(format!("Unparsable Gemini event: {e}")))?;

    if let Some(err) = stream_error("Gemini", &payload) {
        return Err(err);
    }

    let text = payload["candidates"]
        .get(0)
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect::<String>()
        })
        .unwrap_or_default();

    Ok(StreamChunk::new(text))
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<ChunkStream, RelayError> {
        info!("Calling Gemini with model: {}", GEMINI_MODEL);

        let request = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(prompt));

        let events = open_event_stream(request, "Gemini").await?;
        Ok(chunk_stream(events, parse_event))
    }
}
