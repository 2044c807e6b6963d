// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use anyhow::{anyhow, Context};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_PROVIDER: &str = "gemini";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 300;

/// Which provider variant the process serves, with its credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSettings {
    Gemini { api_key: String, base_url: String },
    OpenAi { api_key: String, base_url: String },
    /// `LLM_PROVIDER` named nothing we know. Kept so the relay can report it.
    Unrecognized { name: String },
}

impl ProviderSettings {
    /// Name reported by the health endpoint.
    pub fn name(&self) -> &str {
        match self {
            ProviderSettings::Gemini { .. } => "gemini",
            ProviderSettings::OpenAi { .. } => "openai",
            ProviderSettings::Unrecognized { name } => name,
        }
    }
}

/// Identity provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySettings {
    pub jwks_url: String,
    pub issuer: Option<String>,
    pub cache_ttl: Duration,
}

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub identity: IdentitySettings,
    pub provider: ProviderSettings,
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR is not a socket address")?;

        let jwks_url = get("CLERK_JWKS_URL").ok_or_else(|| anyhow!("CLERK_JWKS_URL is not set"))?;
        let identity = IdentitySettings {
            jwks_url,
            issuer: get("JWT_ISSUER"),
            cache_ttl: Duration::from_secs(parse_secs(
                get("JWKS_CACHE_TTL_SECS"),
                "JWKS_CACHE_TTL_SECS",
                DEFAULT_JWKS_CACHE_TTL_SECS,
            )?),
        };

        let provider_name = get("LLM_PROVIDER").unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
        let provider = match provider_name.as_str() {
            "gemini" => ProviderSettings::Gemini {
                api_key: get("GEMINI_API_KEY")
                    .ok_or_else(|| anyhow!("GEMINI_API_KEY is not set"))?,
                base_url: get("GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            },
            "openai" => ProviderSettings::OpenAi {
                api_key: get("OPENAI_API_KEY")
                    .ok_or_else(|| anyhow!("OPENAI_API_KEY is not set"))?,
                base_url: get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            },
            _ => ProviderSettings::Unrecognized {
                name: provider_name,
            },
        };

        let request_timeout = Duration::from_secs(parse_secs(
            get("REQUEST_TIMEOUT_SECS"),
            "REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);

        Ok(Self {
            bind_addr,
            identity,
            provider,
            request_timeout,
        })
    }
}

fn parse_secs(value: Option<String>, key: &str, default: u64) -> anyhow::Result<u64> {
    match value {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number of seconds")),
        None => Ok(default),
    }
}
