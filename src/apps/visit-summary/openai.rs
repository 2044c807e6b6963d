// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::provider::{chunk_stream, open_event_stream, stream_error, ChunkStream, LlmProvider};
use super::types::{Prompt, StreamChunk};
use crate::RelayError;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

pub const OPENAI_MODEL: &str = "gpt-4o-mini";

/// Chat-completion backend.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

pub fn request_body(prompt: &Prompt) -> serde_json::Value {
    json!({
        "model": OPENAI_MODEL,
        "stream": true,
        "messages": [
            {
                "role": "system",
                "content": prompt.system
            },
            {
                "role": "user",
                "content": prompt.user
            }
        ]
    })
}

/// Content delta of one completion chunk. A chunk without content is an empty chunk.
pub fn parse_event(data: &str) -> Result<StreamChunk, RelayError> {
    let payload: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| RelayError::ProviderStream(format!("Unparsable OpenAI event: {e}")))?;

    if let Some(err) = stream_error("OpenAI", &payload) {
        return Err(err);
    }

    let text = payload["choices"]
        .get(0)
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default();

    Ok(StreamChunk::new(text))
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<ChunkStream, RelayError> {
        info!("Calling OpenAI with model: {}", OPENAI_MODEL);

        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body(prompt));

        let events = open_event_stream(request, "OpenAI").await?;
        Ok(chunk_stream(events, parse_event))
    }
}
