// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Response for GET /health
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub provider: String,
}

/// Response for GET /api/ping
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PingResponse {
    pub ok: bool,
    pub route: String,
}

/// Liveness plus the provider variant chosen at startup. Never contacts the provider.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        provider: state.provider.name().to_string(),
    })
}

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        ok: true,
        route: "/api/ping".to_string(),
    })
}
