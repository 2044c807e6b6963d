// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wire contract tests for the provider adapters against a mock upstream.

use futures::StreamExt;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use visit_relay::app::gemini::GeminiProvider;
use visit_relay::app::openai::OpenAiProvider;
use visit_relay::app::{LlmProvider, Prompt, StreamChunk};
use visit_relay::RelayError;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn prompt() -> Prompt {
    Prompt {
        system: "Summarize the visit.".to_string(),
        user: "Notes:\nBP 120/80".to_string(),
    }
}

fn sse_body(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|event| format!("data: {event}\r\n\r\n"))
        .collect()
}

fn gemini_event(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] }
        }]
    })
}

fn openai_event(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion.chunk",
        "choices": [{ "index": 0, "delta": { "content": content }, "finish_reason": null }]
    })
}

async fn collect(provider: &dyn LlmProvider) -> Vec<Result<StreamChunk, RelayError>> {
    provider.generate(&prompt()).await.unwrap().collect().await
}

#[tokio::test]
async fn test_gemini_streams_chunks() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        gemini_event("### Summary\nAll normal."),
        gemini_event("\n### Next steps\nFollow up in 6mo."),
    ]);

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "g-key"))
        .and(body_partial_json(json!({
            "systemInstruction": { "parts": [{ "text": "Summarize the visit." }] },
            "contents": [{ "role": "user", "parts": [{ "text": "Notes:\nBP 120/80" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(reqwest::Client::new(), "g-key".into(), server.uri());
    let chunks = collect(&provider).await;

    assert_eq!(
        chunks,
        vec![
            Ok(StreamChunk::new("### Summary\nAll normal.")),
            Ok(StreamChunk::new("\n### Next steps\nFollow up in 6mo.")),
        ]
    );
}

#[tokio::test]
async fn test_gemini_rejected_request_fails_before_streaming() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(reqwest::Client::new(), "bad".into(), server.uri());
    let err = match provider.generate(&prompt()).await {
        Ok(_) => panic!("expected the open to fail"),
        Err(e) => e,
    };

    match err {
        RelayError::ProviderOpen(msg) => {
            assert!(msg.contains("400"));
            assert!(msg.contains("API key not valid"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_gemini_error_event_ends_stream() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        gemini_event("### Summary"),
        json!({ "error": { "code": 503, "message": "The model is overloaded" } }),
        gemini_event("never delivered"),
    ]);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(reqwest::Client::new(), "g-key".into(), server.uri());
    let chunks = collect(&provider).await;

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0], Ok(StreamChunk::new("### Summary")));
    assert_eq!(
        chunks[1],
        Err(RelayError::ProviderStream(
            "Gemini error: The model is overloaded".to_string()
        ))
    );
}

#[tokio::test]
async fn test_openai_streams_chunks_until_done() {
    let server = MockServer::start().await;
    let mut body = sse_body(&[
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "choices": [{ "index": 0, "delta": { "role": "assistant" }, "finish_reason": null }]
        }),
        openai_event("### Summary\n"),
        openai_event("All normal."),
    ]);
    body.push_str("data: [DONE]\r\n\r\n");
    body.push_str(&sse_body(&[openai_event("after done")]));

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer o-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "stream": true,
            "messages": [
                { "role": "system", "content": "Summarize the visit." },
                { "role": "user", "content": "Notes:\nBP 120/80" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(reqwest::Client::new(), "o-key".into(), server.uri());
    let text: String = collect(&provider)
        .await
        .into_iter()
        .map(|chunk| chunk.unwrap().text)
        .collect();

    assert_eq!(text, "### Summary\nAll normal.");
}

#[tokio::test]
async fn test_openai_rejected_request_fails_before_streaming() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":{"message":"bad key"}}"#))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(reqwest::Client::new(), "o-key".into(), server.uri());
    assert!(matches!(
        provider.generate(&prompt()).await,
        Err(RelayError::ProviderOpen(_))
    ));
}

#[tokio::test]
async fn test_unreachable_provider_fails_before_streaming() {
    let provider = OpenAiProvider::new(
        reqwest::Client::new(),
        "o-key".into(),
        "http://127.0.0.1:9".into(),
    );
    assert!(matches!(
        provider.generate(&prompt()).await,
        Err(RelayError::ProviderOpen(_))
    ));
}

/// Read one HTTP/1.1 request, head and body, off the socket.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return;
            }
        }
    }
}

/// Serves one response that promises more body than it sends, then hangs up.
async fn truncating_upstream(first_event: serde_json::Value) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: 4096\r\n\r\n{}",
            sse_body(&[first_event])
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        let _ = socket.shutdown().await;
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn test_gemini_connection_lost_mid_stream() {
    let base_url = truncating_upstream(gemini_event("### Summary")).await;
    let provider = GeminiProvider::new(reqwest::Client::new(), "g-key".into(), base_url);
    let chunks = collect(&provider).await;

    assert!(chunks.len() <= 2);
    if chunks.len() == 2 {
        assert_eq!(chunks[0], Ok(StreamChunk::new("### Summary")));
    }
    match chunks.last() {
        Some(Err(RelayError::ProviderStream(msg))) => {
            assert!(msg.contains("Gemini stream interrupted"));
        }
        other => panic!("unexpected last item: {other:?}"),
    }
}
