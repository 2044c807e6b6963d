// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod auth;
pub mod gemini;
pub mod normalizer;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod sse;
pub mod types;

pub use auth::{bearer_token, require_caller, IdentityVerifier, JwksVerifier};
pub use normalizer::{frame_chunk, normalize};
pub use prompt::{build_prompt, SYSTEM_PROMPT};
pub use provider::{build_provider, ChunkStream, LlmProvider, MisconfiguredProvider};
pub use types::*;

use crate::common::{health_check, ping};
use crate::AppState;
use crate::RelayError;
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderName, Method};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Visit payloads above this size are rejected by the framework.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Response for GET /api
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageResponse {
    pub status: String,
    pub message: String,
}

/// Stream a summary of the posted visit as server-sent events.
///
/// The caller was verified by [`require_caller`] before the body is read.
/// Payload problems are answered with a plain error status before any
/// provider contact. Once the event stream has started, a provider failure
/// aborts the response body.
pub async fn summarize_visit(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    body: Bytes,
) -> Result<Response, RelayError> {
    let visit = VisitRecord::from_json(&body)?;

    info!(
        "Processing visit summary request for {} via {}",
        caller.subject,
        state.provider.name()
    );

    let prompt = build_prompt(&visit);
    let chunks = state.provider.generate(&prompt).await?;

    let subject = caller.subject;
    let frames = normalize(chunks).map(move |line| match line {
        Ok(line) => Ok(line.into_bytes()),
        Err(e) => {
            error!("Visit summary stream for {} ended early: {}", subject, e);
            Err(e)
        }
    });

    Ok(event_stream_response(Body::from_stream(frames)))
}

/// Hint for callers that GET the summary endpoint.
pub async fn usage() -> Json<UsageResponse> {
    Json(UsageResponse {
        status: "ok".to_string(),
        message: "Use POST to stream a summary.".to_string(),
    })
}

fn event_stream_response(body: Body) -> Response {
    (
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        body,
    )
        .into_response()
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

/// All routes served by the relay.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api",
            post(summarize_visit)
                .layer(from_fn_with_state(state.clone(), require_caller))
                .get(usage),
        )
        .route("/api/ping", get(ping))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
