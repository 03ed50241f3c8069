// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Zone refresh engine: regenerates one zone's token batch and publishes it
//! with a revision-conditional write.

use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::accounts::{self, Credential};
use crate::auth::TokenFetcher;
use crate::error::RefreshError;
use crate::notify::Notifier;
use crate::store::FileStore;
use crate::zone::{PublishLog, Zone, ZoneSet};

/// A progress notification is sent every this many processed accounts.
pub const PROGRESS_EVERY: usize = 20;

/// One entry of a published token file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token: String,
}

/// Tunables for a refresh cycle.
#[derive(Debug, Clone, Copy)]
pub struct RefreshSettings {
    /// Accounts considered per cycle; the rest of the list is ignored.
    pub max_tokens: usize,
    /// Auth fetches in flight at once.
    pub fetch_concurrency: usize,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self { max_tokens: 110, fetch_concurrency: 8 }
    }
}

/// Result of fetching tokens for a zone's accounts.
#[derive(Debug, Default)]
struct FetchTally {
    batch: Vec<TokenRecord>,
    failed: usize,
}

/// Regenerates and publishes token batches for the configured zones.
///
/// Designed to be called repeatedly: a failed cycle is reported and left for
/// the next scheduled check.
pub struct ZoneRefresher {
    zones: ZoneSet,
    store: Arc<dyn FileStore>,
    fetcher: Arc<dyn TokenFetcher>,
    notifier: Arc<dyn Notifier>,
    published: PublishLog,
    settings: RefreshSettings,
}

impl ZoneRefresher {
    pub fn new(
        zones: ZoneSet,
        store: Arc<dyn FileStore>,
        fetcher: Arc<dyn TokenFetcher>,
        notifier: Arc<dyn Notifier>,
        settings: RefreshSettings,
    ) -> Self {
        Self { zones, store, fetcher, notifier, published: PublishLog::new(), settings }
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    pub fn store(&self) -> &dyn FileStore {
        self.store.as_ref()
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn published(&self) -> &PublishLog {
        &self.published
    }

    /// Run one refresh cycle for `zone_id`.
    ///
    /// Every outcome is reported through the notifier. The return value is
    /// the number of tokens published, for callers that want it.
    pub async fn refresh(&self, zone_id: &str) -> Result<usize, RefreshError> {
        let id = zone_id.to_lowercase();
        let Some(zone) = self.zones.get(&id) else {
            tracing::warn!(zone = %id, "refresh requested for unknown zone");
            self.notifier.notify(&format!("❌ Unknown zone: {id}"));
            return Err(RefreshError::UnknownZone(id));
        };

        let result = self.run_cycle(zone).await;
        match result {
            Ok(count) => {
                tracing::info!(zone = %zone.id(), count, "token file published");
                self.notifier
                    .notify(&format!("✅ `{}` updated with {count} tokens.", zone.token_path()));
            }
            Err(ref e) => {
                tracing::warn!(zone = %zone.id(), code = e.as_str(), err = %e, "refresh failed");
                self.notifier.notify(&failure_message(zone, e));
            }
        }
        result
    }

    async fn run_cycle(&self, zone: &Zone) -> Result<usize, RefreshError> {
        self.notifier.notify(&format!("⏳ Refreshing `{}` tokens...", zone.id()));

        let mut records = accounts::load(zone.accounts_path())
            .map_err(|e| RefreshError::AccountsUnavailable(e.to_string()))?;
        records.truncate(self.settings.max_tokens);
        let total = records.len();
        let credentials: Vec<Credential> =
            records.iter().filter_map(|record| record.credential()).collect();

        tracing::debug!(zone = %zone.id(), total, usable = credentials.len(), "fetching tokens");
        let tally = self.fetch_all(zone, credentials, total).await;
        self.notifier.notify(&format!(
            "🔄 `{}`: {} tokens OK, {} failed.",
            zone.id(),
            tally.batch.len(),
            tally.failed
        ));

        // Only the revision is needed: the file is replaced whole.
        let current = self.store.read(zone.token_path()).await;
        let body = serde_json::to_string_pretty(&tally.batch)?;

        if !self.store.write(zone.token_path(), &body, current.sha.as_deref()).await {
            return Err(RefreshError::PublishFailed { path: zone.token_path().to_owned() });
        }

        self.published.record(zone.id(), Utc::now()).await;
        Ok(tally.batch.len())
    }

    /// Fetch a token per credential with bounded fan-out, preserving account order.
    async fn fetch_all(
        &self,
        zone: &Zone,
        credentials: Vec<Credential>,
        total: usize,
    ) -> FetchTally {
        let fetcher = &self.fetcher;
        let results = stream::iter(credentials)
            .map(|cred| async move { fetcher.fetch(&cred.uid, &cred.password).await })
            .buffered(self.settings.fetch_concurrency.max(1));
        let mut results = std::pin::pin!(results);

        let mut tally = FetchTally::default();
        let mut processed = 0usize;
        while let Some(token) = results.next().await {
            processed += 1;
            match token {
                Some(token) => tally.batch.push(TokenRecord { token }),
                None => tally.failed += 1,
            }
            if processed % PROGRESS_EVERY == 0 {
                self.notifier.notify(&format!(
                    "🔄 `{}`: {processed} tokens processed of {total}.",
                    zone.id()
                ));
            }
        }
        tally
    }
}

fn failure_message(zone: &Zone, err: &RefreshError) -> String {
    match err {
        RefreshError::AccountsUnavailable(detail) => {
            format!("❌ Account list unavailable for `{}`: {detail}", zone.id())
        }
        RefreshError::PublishFailed { path } => format!("⚠️ Failed to update `{path}`."),
        RefreshError::UnknownZone(id) => format!("❌ Unknown zone: {id}"),
        RefreshError::Internal(detail) => format!("❌ Error in zone `{}`: {detail}", zone.id()),
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
