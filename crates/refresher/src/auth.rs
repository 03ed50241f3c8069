// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth token fetcher: exchanges one `(uid, password)` pair for a token.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// Source of per-account tokens.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    /// One attempt, no retries. `None` on any failure.
    async fn fetch(&self, uid: &str, password: &str) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
}

/// HTTP client for the auth endpoint.
pub struct AuthClient {
    url: String,
    client: reqwest::Client,
}

impl AuthClient {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = crate::http_client(timeout)?;
        Ok(Self { url, client })
    }

    /// Perform a single token request.
    ///
    /// Errors never carry the request URL, which holds the password.
    pub async fn request_token(&self, uid: &str, password: &str) -> anyhow::Result<String> {
        let resp = self
            .client
            .get(&self.url)
            .query(&[("uid", uid), ("password", password)])
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            anyhow::bail!("auth endpoint returned {status}");
        }

        let body: TokenResponse = resp.json().await.map_err(reqwest::Error::without_url)?;
        match body.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => anyhow::bail!("auth response has no token"),
        }
    }
}

#[async_trait]
impl TokenFetcher for AuthClient {
    async fn fetch(&self, uid: &str, password: &str) -> Option<String> {
        match self.request_token(uid, password).await {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::debug!(uid, err = %e, "token fetch failed");
                None
            }
        }
    }
}
