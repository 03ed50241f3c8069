// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote file store: a version-controlled repository holding one token file
//! per zone, updated with revision-conditional writes.

pub mod github;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Content and revision of a remote file. Both absent when the file does not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: Option<String>,
    pub sha: Option<String>,
}

/// Operations the refresh engine needs from the remote store.
///
/// Implementations never surface transport errors: failures map to the
/// negative result of each call and are logged where they happen.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Current content and revision of `path`.
    async fn read(&self, path: &str) -> RemoteFile;

    /// Replace `path` with `content`.
    ///
    /// With `expected_sha`, the write fails if the remote revision moved since
    /// it was read. Without it, the file is created. Returns `true` on success.
    async fn write(&self, path: &str, content: &str, expected_sha: Option<&str>) -> bool;

    async fn exists(&self, path: &str) -> bool;

    /// Time of the most recent commit touching `path`.
    async fn last_modified(&self, path: &str) -> Option<DateTime<Utc>>;
}
