// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Zone token refresher: keeps one auth token file per zone fresh in a
//! remote repository.
//!
//! On start every zone without a token file is refreshed, then a monitor
//! regenerates any zone whose file is older than the stale threshold.

pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod monitor;
pub mod notify;
pub mod reconcile;
pub mod refresh;
pub mod store;
pub mod test_support;
pub mod zone;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth::AuthClient;
use crate::config::RefresherConfig;
use crate::monitor::StalenessMonitor;
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::refresh::{RefreshSettings, ZoneRefresher};
use crate::store::github::{GithubConfig, GithubStore};

/// How long shutdown waits for queued notifications to go out.
const NOTIFY_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Build an HTTP client with a per-request timeout.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    // reqwest is built without a bundled TLS provider.
    let _ = rustls::crypto::ring::default_provider().install_default();
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("zone-refresher/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Run reconciliation and the staleness monitor until SIGINT/SIGTERM.
pub async fn run(config: RefresherConfig) -> anyhow::Result<()> {
    config.validate()?;
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let (notifier, notifier_task) = match config.webhook_url {
        Some(ref url) => {
            let (notifier, task) = WebhookNotifier::spawn(url.clone())?;
            (notifier as Arc<dyn Notifier>, Some(task))
        }
        None => (Arc::new(LogNotifier) as Arc<dyn Notifier>, None),
    };

    let store = GithubStore::new(GithubConfig {
        api_url: config.github_api.clone(),
        repo: config.repo.clone(),
        branch: config.branch.clone(),
        token: config.github_token.clone(),
        timeout: config.request_timeout(),
    })?;
    let fetcher = AuthClient::new(config.auth_url.clone(), config.request_timeout())?;
    let settings = RefreshSettings {
        max_tokens: config.max_tokens,
        fetch_concurrency: config.fetch_concurrency,
    };

    let zones = config.zone_set();
    info!(
        repo = %config.repo,
        branch = %config.branch,
        zones = ?zones.iter().map(|z| z.id()).collect::<Vec<_>>(),
        "zone-refresher starting"
    );

    let engine =
        Arc::new(ZoneRefresher::new(zones, Arc::new(store), Arc::new(fetcher), notifier, settings));

    let health_task = match config.health_addr {
        Some(ref addr) => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("health endpoint listening on {addr}");
            Some(tokio::spawn(health::serve(listener, Arc::clone(&engine), shutdown.clone())))
        }
        None => None,
    };

    if !shutdown.is_cancelled() {
        let refreshed = reconcile::reconcile_all(&engine).await;
        info!(count = refreshed.len(), "startup reconciliation done");
    }

    let monitor =
        StalenessMonitor::new(engine, config.stale_threshold(), config.poll_interval());
    monitor.run(shutdown).await;

    if let Some(task) = health_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(err = %e, "health endpoint failed"),
            Err(e) => tracing::warn!(err = %e, "health endpoint task panicked"),
        }
    }

    // Dropping the last notifier handle lets the delivery task drain and exit.
    drop(monitor);
    if let Some(task) = notifier_task {
        if tokio::time::timeout(NOTIFY_FLUSH_TIMEOUT, task).await.is_err() {
            tracing::warn!("gave up waiting for pending notifications");
        }
    }

    info!("zone-refresher stopped");
    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = recv_or_pending(sigterm.as_mut()) => {
                info!("received SIGTERM, stopping after the current cycle");
            }
            _ = recv_or_pending(sigint.as_mut()) => {
                info!("received SIGINT, stopping after the current cycle");
            }
        }
        shutdown.cancel();
    });
}

/// Wait for a signal; never resolves if the handler could not be installed.
async fn recv_or_pending(signal: Option<&mut tokio::signal::unix::Signal>) {
    match signal {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending().await,
    }
}
