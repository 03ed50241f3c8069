// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GitHub contents API client.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::store::{FileStore, RemoteFile};

const ACCEPT: &str = "application/vnd.github.v3+json";

/// Connection settings for one repository/branch.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// API base URL, e.g. `https://api.github.com`.
    pub api_url: String,
    /// `owner/name`.
    pub repo: String,
    pub branch: String,
    pub token: String,
    pub timeout: Duration,
}

/// File metadata returned by `GET /repos/{repo}/contents/{path}`.
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    committer: CommitSignature,
}

#[derive(Debug, Deserialize)]
struct CommitSignature {
    date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    branch: &'a str,
}

/// Token file store backed by a GitHub repository.
pub struct GithubStore {
    config: GithubConfig,
    client: reqwest::Client,
}

impl GithubStore {
    pub fn new(config: GithubConfig) -> anyhow::Result<Self> {
        let client = crate::http_client(config.timeout)?;
        Ok(Self { config, client })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.repo,
            path.trim_start_matches('/')
        )
    }

    fn commits_url(&self) -> String {
        format!("{}/repos/{}/commits", self.config.api_url.trim_end_matches('/'), self.config.repo)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header(reqwest::header::AUTHORIZATION, format!("token {}", self.config.token))
            .header(reqwest::header::ACCEPT, ACCEPT)
    }

    /// Fetch metadata for `path`. `Ok(None)` when the file does not exist.
    async fn get_contents(&self, path: &str) -> anyhow::Result<Option<ContentsResponse>> {
        let req = self
            .client
            .get(self.contents_url(path))
            .query(&[("ref", self.config.branch.as_str())]);
        let resp = self.apply_auth(req).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let meta: ContentsResponse = resp.error_for_status()?.json().await?;
        Ok(Some(meta))
    }

    /// Resolve the raw body of a file from its metadata.
    async fn download(&self, meta: &ContentsResponse) -> anyhow::Result<String> {
        if let Some(ref url) = meta.download_url {
            let resp = self.client.get(url).send().await?.error_for_status()?;
            return Ok(resp.text().await?);
        }
        match (meta.content.as_deref(), meta.encoding.as_deref()) {
            (Some(encoded), Some("base64")) => {
                let compact: String = encoded.split_whitespace().collect();
                let bytes = STANDARD.decode(compact)?;
                Ok(String::from_utf8(bytes)?)
            }
            _ => anyhow::bail!("file has neither download_url nor inline content"),
        }
    }

    async fn try_read(&self, path: &str) -> anyhow::Result<RemoteFile> {
        let Some(meta) = self.get_contents(path).await? else {
            return Ok(RemoteFile::default());
        };
        let content = match self.download(&meta).await {
            Ok(body) => Some(body),
            Err(e) => {
                // The revision alone is still enough for a conditional write.
                tracing::warn!(path, err = %e, "token file download failed");
                None
            }
        };
        Ok(RemoteFile { content, sha: Some(meta.sha) })
    }

    async fn try_write(
        &self,
        path: &str,
        content: &str,
        expected_sha: Option<&str>,
    ) -> anyhow::Result<bool> {
        let body = UpdateRequest {
            message: commit_message(path, Utc::now()),
            content: STANDARD.encode(content.as_bytes()),
            sha: expected_sha,
            branch: &self.config.branch,
        };
        let req = self.client.put(self.contents_url(path)).json(&body);
        let resp = self.apply_auth(req).send().await?;
        let status = resp.status();
        match status {
            StatusCode::OK | StatusCode::CREATED => Ok(true),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                tracing::warn!(path, %status, "token file changed since it was read");
                Ok(false)
            }
            _ => {
                let text = resp.text().await.unwrap_or_default();
                tracing::warn!(path, %status, body = %text, "token file update rejected");
                Ok(false)
            }
        }
    }

    async fn try_last_modified(&self, path: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        let req = self.client.get(self.commits_url()).query(&[
            ("path", path),
            ("sha", self.config.branch.as_str()),
            ("page", "1"),
            ("per_page", "1"),
        ]);
        let resp = self.apply_auth(req).send().await?;
        let commits: Vec<CommitEntry> = resp.error_for_status()?.json().await?;
        Ok(commits.first().map(|c| c.commit.committer.date))
    }
}

#[async_trait]
impl FileStore for GithubStore {
    async fn read(&self, path: &str) -> RemoteFile {
        match self.try_read(path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(path, err = %e, "token file read failed");
                RemoteFile::default()
            }
        }
    }

    async fn write(&self, path: &str, content: &str, expected_sha: Option<&str>) -> bool {
        match self.try_write(path, content, expected_sha).await {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(path, err = %e, "token file update failed");
                false
            }
        }
    }

    async fn exists(&self, path: &str) -> bool {
        match self.get_contents(path).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                tracing::warn!(path, err = %e, "token file lookup failed");
                false
            }
        }
    }

    async fn last_modified(&self, path: &str) -> Option<DateTime<Utc>> {
        match self.try_last_modified(path).await {
            Ok(at) => at,
            Err(e) => {
                tracing::warn!(path, err = %e, "commit history lookup failed");
                None
            }
        }
    }
}

/// Commit message for an automated token file update.
pub fn commit_message(path: &str, at: DateTime<Utc>) -> String {
    format!("Auto update {path} @ {}", at.to_rfc3339_opts(SecondsFormat::Secs, true))
}
