// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Why a zone refresh cycle ended without publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// Identifier is not in the configured zone set.
    UnknownZone(String),
    /// The zone's local account list is missing or unreadable.
    AccountsUnavailable(String),
    /// The conditional write to the store did not succeed.
    PublishFailed { path: String },
    /// Anything else that went wrong inside the cycle.
    Internal(String),
}

impl RefreshError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownZone(_) => "UNKNOWN_ZONE",
            Self::AccountsUnavailable(_) => "ACCOUNTS_UNAVAILABLE",
            Self::PublishFailed { .. } => "PUBLISH_FAILED",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownZone(zone) => write!(f, "unknown zone: {zone}"),
            Self::AccountsUnavailable(detail) => write!(f, "account list unavailable: {detail}"),
            Self::PublishFailed { path } => write!(f, "failed to update {path}"),
            Self::Internal(detail) => f.write_str(detail),
        }
    }
}

impl std::error::Error for RefreshError {}

impl From<serde_json::Error> for RefreshError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.to_string())
    }
}
