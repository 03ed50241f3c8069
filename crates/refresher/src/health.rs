// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional liveness endpoint for hosted deployments that expect an open port.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::refresh::ZoneRefresher;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub zones: Vec<ZoneHealth>,
}

#[derive(Debug, Serialize)]
pub struct ZoneHealth {
    pub zone: String,
    /// Last publish by this process; `None` until the first refresh.
    pub last_published: Option<DateTime<Utc>>,
}

/// `GET /health`
async fn health(State(engine): State<Arc<ZoneRefresher>>) -> impl IntoResponse {
    let mut zones = Vec::with_capacity(engine.zones().len());
    for zone in engine.zones().iter() {
        let last_published = engine.published().last_published(zone.id()).await;
        zones.push(ZoneHealth { zone: zone.id().to_owned(), last_published });
    }
    Json(HealthResponse { status: "running".to_owned(), zones })
}

pub fn build_router(engine: Arc<ZoneRefresher>) -> Router {
    Router::new().route("/health", get(health)).with_state(engine)
}

/// Serve the health router on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    engine: Arc<ZoneRefresher>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    axum::serve(listener, build_router(engine))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
