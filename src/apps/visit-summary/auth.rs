// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::types::CallerIdentity;
use crate::config::IdentitySettings;
use crate::{AppState, RelayError};
use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A key set younger than this is never refetched, even for an unknown `kid`.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Checks a bearer credential and returns who presented it.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<CallerIdentity, RelayError>;
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, RelayError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| RelayError::Unauthorized("Missing bearer credential".to_string()))?
        .to_str()
        .map_err(|_| RelayError::Unauthorized("Malformed authorization header".to_string()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| RelayError::Unauthorized("Malformed authorization header".to_string()))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(RelayError::Unauthorized(format!(
            "Unsupported authorization scheme: {scheme}"
        )));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(RelayError::Unauthorized("Empty bearer credential".to_string()));
    }
    Ok(token)
}

/// Route middleware: verify the bearer credential and hand the caller to the
/// handler as a request extension.
///
/// Runs before the handler extracts the body, so an unauthenticated request is
/// rejected without its payload being read or size-checked.
pub async fn require_caller(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, RelayError> {
    let token = bearer_token(request.headers())?.to_string();
    let caller = state.verifier.verify(&token).await?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

struct CachedKeys {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Verifies RS256 session tokens against the identity provider's JWKS endpoint.
pub struct JwksVerifier {
    client: reqwest::Client,
    settings: IdentitySettings,
    cache: RwLock<Option<CachedKeys>>,
}

impl JwksVerifier {
    pub fn new(client: reqwest::Client, settings: IdentitySettings) -> Self {
        Self {
            client,
            settings,
            cache: RwLock::new(None),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        validation.validate_nbf = true;
        if let Some(issuer) = &self.settings.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }

    async fn fetch_keys(&self) -> Result<JwkSet, RelayError> {
        debug!("Fetching JWKS from {}", self.settings.jwks_url);

        let response = self
            .client
            .get(&self.settings.jwks_url)
            .send()
            .await
            .map_err(|e| RelayError::IdentityUnavailable(format!("JWKS request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::IdentityUnavailable(format!(
                "JWKS endpoint returned {status}"
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| RelayError::IdentityUnavailable(format!("Malformed JWKS: {e}")))
    }

    /// Cached key set, refetched when stale. `refresh` forces a refetch
    /// unless the cached set is very recent.
    async fn keys(&self, refresh: bool) -> Result<Arc<JwkSet>, RelayError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let age = cached.fetched_at.elapsed();
                let fresh = age < self.settings.cache_ttl;
                if fresh && (!refresh || age < MIN_REFRESH_INTERVAL) {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let keys = Arc::new(self.fetch_keys().await?);
        *self.cache.write().await = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }

    async fn signing_key(&self, kid: &str) -> Result<Jwk, RelayError> {
        if let Some(jwk) = self.keys(false).await?.find(kid) {
            return Ok(jwk.clone());
        }

        // Unknown kid: the provider may have rotated its keys.
        self.keys(true)
            .await?
            .find(kid)
            .cloned()
            .ok_or_else(|| RelayError::Unauthorized(format!("Unknown signing key: {kid}")))
    }
}

#[async_trait]
impl IdentityVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<CallerIdentity, RelayError> {
        let header = decode_header(token)
            .map_err(|e| RelayError::Unauthorized(format!("Malformed token: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(RelayError::Unauthorized(format!(
                "Unsupported token algorithm: {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| RelayError::Unauthorized("Token has no key id".to_string()))?;

        let jwk = self.signing_key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            RelayError::IdentityUnavailable(format!("Unusable signing key {kid}: {e}"))
        })?;

        let data = decode::<Claims>(token, &key, &self.validation()).map_err(|e| {
            warn!("Rejected bearer token: {}", e);
            RelayError::Unauthorized(format!("Invalid token: {e}"))
        })?;

        if data.claims.sub.is_empty() {
            return Err(RelayError::Unauthorized("Token has no subject".to_string()));
        }

        Ok(CallerIdentity {
            subject: data.claims.sub,
        })
    }
}
