// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Milestone notifications.
//!
//! Every component takes an `Arc<dyn Notifier>`. Delivery is best-effort and
//! never reports back to the caller.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Timeout for a single webhook post.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Fire-and-forget notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notifier that only writes to the log. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::info!(content = message, "notification (no webhook configured)");
    }
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    content: &'a str,
}

/// Posts `{"content": ...}` to a chat webhook.
///
/// Messages are queued and delivered in order by one background task, so a
/// slow webhook never blocks a refresh cycle.
pub struct WebhookNotifier {
    tx: mpsc::UnboundedSender<String>,
}

impl WebhookNotifier {
    /// Spawn the delivery task and return the notifier handle.
    ///
    /// The task exits once every handle is dropped and the queue is drained;
    /// await the returned `JoinHandle` to flush pending messages on shutdown.
    pub fn spawn(url: String) -> anyhow::Result<(Arc<Self>, JoinHandle<()>)> {
        let client = crate::http_client(WEBHOOK_TIMEOUT)?;
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                deliver(&client, &url, &message).await;
            }
            tracing::debug!("webhook notifier stopped");
        });

        Ok((Arc::new(Self { tx }), handle))
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, message: &str) {
        tracing::debug!(content = message, "queueing notification");
        if self.tx.send(message.to_owned()).is_err() {
            tracing::warn!(content = message, "notifier stopped, dropping notification");
        }
    }
}

async fn deliver(client: &reqwest::Client, url: &str, content: &str) {
    let result = client.post(url).json(&WebhookBody { content }).send().await;
    match result {
        Ok(resp) if resp.status().is_success() => {}
        Ok(resp) => {
            tracing::warn!(status = %resp.status(), "webhook rejected notification");
        }
        Err(e) => {
            tracing::warn!(err = %e, "webhook delivery failed");
        }
    }
}
