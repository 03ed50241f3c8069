// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::zone::ZoneSet;

/// One year; longer thresholds never fire in practice.
const MAX_STALE_HOURS: u64 = 24 * 366;

/// Configuration for the zone token refresher.
#[derive(Debug, Clone, Parser)]
#[command(name = "zone-refresher", version, about = "Keeps per-zone auth token files fresh")]
pub struct RefresherConfig {
    /// Repository holding the token files, as `owner/name`.
    #[arg(long, env = "REPO_TOKENS")]
    pub repo: String,

    /// Branch the token files are committed to.
    #[arg(long, default_value = "main", env = "ZONE_REFRESH_BRANCH")]
    pub branch: String,

    /// Credential for the repository API.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// Base URL of the repository API.
    #[arg(long, default_value = "https://api.github.com", env = "ZONE_REFRESH_GITHUB_API")]
    pub github_api: String,

    /// Auth endpoint that exchanges `uid`/`password` for a token.
    #[arg(long, env = "AUTH_URL")]
    pub auth_url: String,

    /// Webhook for progress notifications. If unset, notifications are only logged.
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Comma-separated zone identifiers.
    #[arg(long, value_delimiter = ',', default_value = "br,ind,bd", env = "ZONE_REFRESH_ZONES")]
    pub zones: Vec<String>,

    /// Directory holding the `config_<zone>.json` account lists.
    #[arg(long, default_value = "configs", env = "ZONE_REFRESH_CONFIG_DIR")]
    pub config_dir: PathBuf,

    /// Directory (in the repository) holding the `token_<zone>.json` files.
    #[arg(long, default_value = "tokens", env = "ZONE_REFRESH_TOKEN_DIR")]
    pub token_dir: String,

    /// Age in hours after which a zone's token file is regenerated.
    #[arg(long, default_value_t = 6, env = "ZONE_REFRESH_STALE_HOURS")]
    pub stale_hours: u64,

    /// Maximum accounts considered per zone refresh.
    #[arg(long, default_value_t = 110, env = "ZONE_REFRESH_MAX_TOKENS")]
    pub max_tokens: usize,

    /// Seconds between staleness sweeps.
    #[arg(long, default_value_t = 60, env = "ZONE_REFRESH_POLL_SECS")]
    pub poll_secs: u64,

    /// Per-request timeout in seconds for store and auth calls.
    #[arg(long, default_value_t = 10, env = "ZONE_REFRESH_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,

    /// Auth fetches kept in flight at once during a refresh.
    #[arg(long, default_value_t = 8, env = "ZONE_REFRESH_FETCH_CONCURRENCY")]
    pub fetch_concurrency: usize,

    /// Address for the `/health` endpoint, e.g. `0.0.0.0:8080`. Disabled if unset.
    #[arg(long, env = "ZONE_REFRESH_HEALTH_ADDR")]
    pub health_addr: Option<String>,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "ZONE_REFRESH_LOG_FORMAT")]
    pub log_format: String,
}

impl RefresherConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.zones.iter().all(|z| z.trim().is_empty()) {
            anyhow::bail!("at least one zone must be configured");
        }
        if self.max_tokens == 0 {
            anyhow::bail!("--max-tokens must be at least 1");
        }
        if self.fetch_concurrency == 0 {
            anyhow::bail!("--fetch-concurrency must be at least 1");
        }
        if self.stale_hours == 0 || self.stale_hours > MAX_STALE_HOURS {
            anyhow::bail!("--stale-hours must be between 1 and {MAX_STALE_HOURS}");
        }
        if self.poll_secs == 0 {
            anyhow::bail!("--poll-secs must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("--request-timeout-secs must be at least 1");
        }
        if !self.repo.contains('/') {
            anyhow::bail!("--repo must look like owner/name, got {:?}", self.repo);
        }
        Ok(())
    }

    /// Build the static zone set from the configured identifiers and directories.
    pub fn zone_set(&self) -> ZoneSet {
        ZoneSet::new(&self.zones, &self.config_dir, &self.token_dir)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_hours.saturating_mul(3600))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
