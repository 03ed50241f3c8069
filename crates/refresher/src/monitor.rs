// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Staleness monitor: periodically checks each zone's token file age and
//! refreshes zones whose file is older than the threshold.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::refresh::ZoneRefresher;

/// `true` when `last_modified` is strictly older than `threshold` at `now`.
pub fn is_stale(now: DateTime<Utc>, last_modified: DateTime<Utc>, threshold: Duration) -> bool {
    let Ok(threshold) = chrono::Duration::from_std(threshold) else {
        return false;
    };
    now.signed_duration_since(last_modified) > threshold
}

pub struct StalenessMonitor {
    engine: Arc<ZoneRefresher>,
    threshold: Duration,
    interval: Duration,
}

impl StalenessMonitor {
    pub fn new(engine: Arc<ZoneRefresher>, threshold: Duration, interval: Duration) -> Self {
        Self { engine, threshold, interval }
    }

    /// Check every zone once, refreshing stale ones in order.
    ///
    /// `clock` is read per zone, after that zone's history lookup, since
    /// earlier refreshes in the same sweep can take a while. Zones without
    /// commit history are left to the startup reconciler. Returns the ids
    /// of the zones that were refreshed.
    pub async fn sweep<C>(&self, clock: C) -> Vec<String>
    where
        C: Fn() -> DateTime<Utc>,
    {
        let mut refreshed = Vec::new();
        for zone in self.engine.zones().iter() {
            let Some(modified) = self.engine.store().last_modified(zone.token_path()).await else {
                tracing::debug!(zone = %zone.id(), "no commit history for token file");
                continue;
            };
            if !is_stale(clock(), modified, self.threshold) {
                tracing::trace!(zone = %zone.id(), %modified, "token file fresh");
                continue;
            }

            let last_published = self.engine.published().last_published(zone.id()).await;
            tracing::info!(
                zone = %zone.id(),
                %modified,
                last_published = ?last_published,
                "token file stale, refreshing"
            );
            self.engine
                .notifier()
                .notify(&format!("⚠️ Tokens `{}` expired. Refreshing...", zone.id()));
            // Outcome is already reported by the engine.
            let _ = self.engine.refresh(zone.id()).await;
            refreshed.push(zone.id().to_owned());
        }
        refreshed
    }

    /// Sweep, then wait `interval`, until `shutdown` fires.
    ///
    /// A sweep in progress always runs to completion.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            zones = self.engine.zones().len(),
            interval_secs = self.interval.as_secs(),
            threshold_secs = self.threshold.as_secs(),
            "staleness monitor started"
        );
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            self.sweep(Utc::now).await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::info!("staleness monitor stopped");
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
