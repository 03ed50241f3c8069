// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Zones: the fixed set of account groups, each with its own account list
//! and token file, plus the in-process record of when each was last published.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// One configured zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    id: String,
    accounts_path: PathBuf,
    token_path: String,
}

impl Zone {
    pub fn new(id: &str, config_dir: &Path, token_dir: &str) -> Self {
        let id = id.trim().to_lowercase();
        let accounts_path = config_dir.join(format!("config_{id}.json"));
        let token_dir = token_dir.trim_end_matches('/');
        let token_path = if token_dir.is_empty() {
            format!("token_{id}.json")
        } else {
            format!("{token_dir}/token_{id}.json")
        };
        Self { id, accounts_path, token_path }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Local account list for this zone.
    pub fn accounts_path(&self) -> &Path {
        &self.accounts_path
    }

    /// Path of the token file inside the remote repository.
    pub fn token_path(&self) -> &str {
        &self.token_path
    }
}

/// The static set of zones, fixed at startup. Order is preserved.
#[derive(Debug, Clone, Default)]
pub struct ZoneSet {
    zones: Vec<Zone>,
}

impl ZoneSet {
    pub fn new(ids: &[String], config_dir: &Path, token_dir: &str) -> Self {
        let mut zones: Vec<Zone> = Vec::with_capacity(ids.len());
        for id in ids {
            if id.trim().is_empty() {
                continue;
            }
            let zone = Zone::new(id, config_dir, token_dir);
            if zones.iter().any(|z| z.id == zone.id) {
                continue;
            }
            zones.push(zone);
        }
        Self { zones }
    }

    /// Look up a zone by identifier (case-insensitive).
    pub fn get(&self, id: &str) -> Option<&Zone> {
        let id = id.to_lowercase();
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// Last successful publish time per zone.
///
/// Best-effort and process-local: empty after a restart. Staleness is always
/// decided from the store's commit history, never from this table.
#[derive(Debug, Default)]
pub struct PublishLog {
    times: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl PublishLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, zone: &str, at: DateTime<Utc>) {
        self.times.write().await.insert(zone.to_owned(), at);
    }

    pub async fn last_published(&self, zone: &str) -> Option<DateTime<Utc>> {
        self.times.read().await.get(zone).copied()
    }
}
