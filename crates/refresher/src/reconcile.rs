// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup reconciliation: make sure every zone has a token file.

use crate::refresh::ZoneRefresher;

/// Refresh every zone whose token file is missing from the store.
///
/// Runs once before the staleness monitor. A zone that fails to refresh does
/// not stop the others. Returns the ids of the zones that were refreshed.
pub async fn reconcile_all(engine: &ZoneRefresher) -> Vec<String> {
    let mut refreshed = Vec::new();
    for zone in engine.zones().iter() {
        if engine.store().exists(zone.token_path()).await {
            tracing::info!(zone = %zone.id(), path = %zone.token_path(), "token file present");
            engine.notifier().notify(&format!(
                "✅ Token file found for `{}`. Skipping initial refresh.",
                zone.id()
            ));
            continue;
        }

        tracing::info!(zone = %zone.id(), path = %zone.token_path(), "token file missing");
        engine
            .notifier()
            .notify(&format!("⚠️ No token file found for `{}`. Generating now...", zone.id()));
        let _ = engine.refresh(zone.id()).await;
        refreshed.push(zone.id().to_owned());
    }
    refreshed
}
