// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: in-memory store, scripted fetcher, and a
//! notifier that records what it was told.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, Once};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::TokenFetcher;
use crate::notify::Notifier;
use crate::store::{FileStore, RemoteFile};

static CRYPTO: Once = Once::new();

/// Install the rustls crypto provider (needed for reqwest even on plain HTTP).
pub fn ensure_crypto_provider() {
    CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Write `config_<zone>.json` into `dir`.
pub fn write_accounts(dir: &Path, zone: &str, accounts: &serde_json::Value) -> anyhow::Result<()> {
    let path = dir.join(format!("config_{zone}.json"));
    std::fs::write(path, serde_json::to_string_pretty(accounts)?)?;
    Ok(())
}

// -- Notifier -----------------------------------------------------------------

/// Notifier that keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }

    /// Number of messages containing `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        lock(&self.messages).iter().filter(|m| m.contains(needle)).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        lock(&self.messages).push(message.to_owned());
    }
}

// -- Fetcher ------------------------------------------------------------------

/// Fetcher that answers from a fixed `uid -> token` map.
#[derive(Debug, Default)]
pub struct MapFetcher {
    tokens: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl MapFetcher {
    pub fn new<I, K, V>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let tokens = tokens.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { tokens, calls: Mutex::new(Vec::new()) }
    }

    /// Uids passed to `fetch`, in call order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl TokenFetcher for MapFetcher {
    async fn fetch(&self, uid: &str, _password: &str) -> Option<String> {
        lock(&self.calls).push(uid.to_owned());
        self.tokens.get(uid).cloned()
    }
}

/// Fetcher that succeeds for every account with `tok-<uid>`.
#[derive(Debug, Default)]
pub struct EchoFetcher {
    calls: AtomicUsize,
}

impl EchoFetcher {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TokenFetcher for EchoFetcher {
    async fn fetch(&self, uid: &str, _password: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Some(format!("tok-{uid}"))
    }
}

// -- Store --------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredFile {
    content: String,
    revision: u64,
    modified_at: DateTime<Utc>,
}

impl StoredFile {
    fn sha(&self) -> String {
        format!("rev-{}", self.revision)
    }
}

/// In-memory store with revision-conditional writes.
///
/// Writes follow the contents API rules: creating over an existing file or
/// updating with a stale revision is rejected.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<String, StoredFile>>,
    next_revision: AtomicUsize,
    calls: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    touch_before_write: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file as if it had been committed at `modified_at`.
    pub fn put(&self, path: &str, content: &str, modified_at: DateTime<Utc>) {
        let revision = self.next_revision.fetch_add(1, Ordering::Relaxed) as u64 + 1;
        lock(&self.files).insert(
            path.to_owned(),
            StoredFile { content: content.to_owned(), revision, modified_at },
        );
    }

    pub fn content(&self, path: &str) -> Option<String> {
        lock(&self.files).get(path).map(|f| f.content.clone())
    }

    pub fn sha(&self, path: &str) -> Option<String> {
        lock(&self.files).get(path).map(StoredFile::sha)
    }

    /// Total calls of any kind.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Write attempts, successful or not.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Make every subsequent write fail as a transport error would.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::Relaxed);
    }

    /// Simulate another writer committing between the engine's read and write.
    pub fn touch_before_next_write(&self) {
        self.touch_before_write.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn read(&self, path: &str) -> RemoteFile {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match lock(&self.files).get(path) {
            Some(f) => RemoteFile { content: Some(f.content.clone()), sha: Some(f.sha()) },
            None => RemoteFile::default(),
        }
    }

    async fn write(&self, path: &str, content: &str, expected_sha: Option<&str>) -> bool {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
        if self.fail_writes.load(Ordering::Relaxed) {
            return false;
        }
        if self.touch_before_write.swap(false, Ordering::Relaxed) {
            if let Some(existing) = self.content(path) {
                self.put(path, &format!("{existing}\n"), Utc::now());
            }
        }

        let current = self.sha(path);
        if current.as_deref() != expected_sha {
            return false;
        }
        self.put(path, content, Utc::now());
        true
    }

    async fn exists(&self, path: &str) -> bool {
        self.calls.fetch_add(1, Ordering::Relaxed);
        lock(&self.files).contains_key(path)
    }

    async fn last_modified(&self, path: &str) -> Option<DateTime<Utc>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        lock(&self.files).get(path).map(|f| f.modified_at)
    }
}
