// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::gemini::GeminiProvider;
use super::openai::OpenAiProvider;
use super::sse::{SseEvent, SseLineParser};
use super::types::{Prompt, StreamChunk};
use crate::config::ProviderSettings;
use crate::RelayError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Raw text stream from a provider. Ends after the first error.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, RelayError>>;

/// A backend able to stream a generation for a prompt.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Variant name, as reported by the health endpoint.
    fn name(&self) -> &str;

    /// Open a generation stream. Fails before any chunk if the provider
    /// rejects the request.
    async fn generate(&self, prompt: &Prompt) -> Result<ChunkStream, RelayError>;
}

/// Pick the provider variant once, at startup.
pub fn build_provider(settings: &ProviderSettings, client: reqwest::Client) -> Arc<dyn LlmProvider> {
    match settings {
        ProviderSettings::Gemini { api_key, base_url } => Arc::new(GeminiProvider::new(
            client,
            api_key.clone(),
            base_url.clone(),
        )),
        ProviderSettings::OpenAi { api_key, base_url } => Arc::new(OpenAiProvider::new(
            client,
            api_key.clone(),
            base_url.clone(),
        )),
        ProviderSettings::Unrecognized { name } => {
            warn!("LLM_PROVIDER '{}' is not supported, requests will get a diagnostic line", name);
            Arc::new(MisconfiguredProvider::new(name.clone()))
        }
    }
}

/// Stands in when the configured provider name matches no variant.
pub struct MisconfiguredProvider {
    name: String,
}

impl MisconfiguredProvider {
    pub fn new(name: String) -> Self {
        Self { name }
    }

    pub fn diagnostic(&self) -> String {
        format!("\u{274c} Invalid LLM_PROVIDER: {}", self.name)
    }
}

#[async_trait]
impl LlmProvider for MisconfiguredProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, _prompt: &Prompt) -> Result<ChunkStream, RelayError> {
        let chunk = StreamChunk::new(self.diagnostic());
        Ok(stream::iter(vec![Ok(chunk)]).boxed())
    }
}

/// Send a streaming request and parse the response body as server-sent events.
///
/// A transport failure or non-success status is a `ProviderOpen` error;
/// anything that goes wrong while reading the body is a `ProviderStream` error.
pub(crate) async fn open_event_stream(
    request: reqwest::RequestBuilder,
    provider: &'static str,
) -> Result<BoxStream<'static, Result<SseEvent, RelayError>>, RelayError> {
    let response = request
        .send()
        .await
        .map_err(|e| RelayError::ProviderOpen(format!("{provider} request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(RelayError::ProviderOpen(format!(
            "{provider} returned {status}: {error_text}"
        )));
    }

    debug!("{} stream opened", provider);

    let body = response.bytes_stream();
    let events = async_stream::stream! {
        futures::pin_mut!(body);
        let mut parser = SseLineParser::new();
        while let Some(bytes) = body.next().await {
            match bytes {
                Ok(bytes) => {
                    for event in parser.push(&bytes) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    yield Err(RelayError::ProviderStream(format!(
                        "{provider} stream interrupted: {e}"
                    )));
                    return;
                }
            }
        }
        if let Some(event) = parser.flush() {
            yield Ok(event);
        }
    };

    Ok(events.boxed())
}

/// Turn parsed events into chunks, stopping at `[DONE]` or at the first error.
pub(crate) fn chunk_stream(
    mut events: BoxStream<'static, Result<SseEvent, RelayError>>,
    parse: fn(&str) -> Result<StreamChunk, RelayError>,
) -> ChunkStream {
    let chunks = async_stream::stream! {
        while let Some(event) = events.next().await {
            match event.and_then(|e| if e.is_done() { Ok(None) } else { parse(&e.data).map(Some) }) {
                Ok(Some(chunk)) => yield Ok(chunk),
                Ok(None) => break,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    };
    chunks.boxed()
}

/// Pull the provider's error message out of an in-stream `{"error": {...}}` payload.
pub(crate) fn stream_error(provider: &str, payload: &serde_json::Value) -> Option<RelayError> {
    let error = payload.get("error")?;
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    Some(RelayError::ProviderStream(format!("{provider} error: {message}")))
}
