// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde_json::json;
use std::fmt;
use std::sync::Arc;

pub mod apps {
    #[path = "visit-summary/mod.rs"]
    pub mod visit_summary;
}

pub mod app {
    pub use crate::apps::visit_summary::*;
}

pub mod common;
pub mod config;

use crate::app::{IdentityVerifier, LlmProvider};

/// App state, shared read-only by every request for the lifetime of the process.
pub struct AppState {
    /// Verifies bearer credentials against the identity provider.
    pub verifier: Arc<dyn IdentityVerifier>,
    /// The provider variant chosen at startup.
    pub provider: Arc<dyn LlmProvider>,
}

/// Implement IntoResponse for RelayError.
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Relay errors enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    Unauthorized(String),
    InvalidInput(String),
    IdentityUnavailable(String),
    ProviderOpen(String),
    ProviderStream(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RelayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RelayError::IdentityUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::ProviderOpen(_) => StatusCode::BAD_GATEWAY,
            // Only raised once the response head is out; the body is aborted instead.
            RelayError::ProviderStream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Unauthorized(e) => write!(f, "Unauthorized: {e}"),
            RelayError::InvalidInput(e) => write!(f, "Invalid input: {e}"),
            RelayError::IdentityUnavailable(e) => write!(f, "Identity provider unavailable: {e}"),
            RelayError::ProviderOpen(e) => write!(f, "Provider request failed: {e}"),
            RelayError::ProviderStream(e) => write!(f, "Provider stream failed: {e}"),
        }
    }
}

impl std::error::Error for RelayError {}
