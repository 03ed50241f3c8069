// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-zone account lists loaded from local JSON files.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// One entry of an account list as stored on disk.
///
/// Both fields are optional at the file level; entries missing either one
/// are skipped by the refresh engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<serde_json::Value>,
}

/// A usable `(uid, password)` pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub uid: String,
    pub password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential").field("uid", &self.uid).finish_non_exhaustive()
    }
}

impl AccountRecord {
    /// Both fields as strings, or `None` if either is missing.
    pub fn credential(&self) -> Option<Credential> {
        let uid = scalar_to_string(self.uid.as_ref()?)?;
        let password = scalar_to_string(self.password.as_ref()?)?;
        Some(Credential { uid, password })
    }
}

/// Account ids are often stored as bare numbers; accept those as well as strings.
fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl From<serde_json::Value> for AccountRecord {
    /// Entries that are not objects become an empty record.
    fn from(value: serde_json::Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// Load an account list from a JSON file.
///
/// Only the top level must be an array; malformed entries are kept as
/// empty records so positions (and the per-cycle cap) are preserved.
pub fn load(path: &Path) -> anyhow::Result<Vec<AccountRecord>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("cannot parse {}: {e}", path.display()))?;
    Ok(entries.into_iter().map(AccountRecord::from).collect())
}
