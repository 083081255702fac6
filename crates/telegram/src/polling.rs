use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::api::{TelegramApi, Update};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("telegram rejected `{method}`: {description}")]
    Api { method: &'static str, description: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 1_000, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Consumer of polled updates.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, update: Update);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    RetriesExhausted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollingSummary {
    pub updates_received: usize,
    pub stop_reason: StopReason,
}

pub struct PollingRunner {
    api: Arc<dyn TelegramApi>,
    handler: Arc<dyn UpdateHandler>,
    reconnect_policy: ReconnectPolicy,
    poll_timeout_secs: u64,
}

impl PollingRunner {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        handler: Arc<dyn UpdateHandler>,
        reconnect_policy: ReconnectPolicy,
        poll_timeout_secs: u64,
    ) -> Self {
        Self { api, handler, reconnect_policy, poll_timeout_secs }
    }

    /// Polls until `shutdown` flips to `true` or consecutive failures exceed the
    /// policy. Each update is handled on its own task; in-flight tasks are
    /// awaited before returning.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> PollingSummary {
        let mut offset: Option<i64> = None;
        let mut failures: u32 = 0;
        let mut updates_received = 0;
        let mut tasks = JoinSet::new();
        let mut stop_reason = StopReason::Shutdown;

        info!(event_name = "ingress.telegram.polling_started", "telegram long polling started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            while tasks.try_join_next().is_some() {}

            let polled = tokio::select! {
                _ = shutdown.changed() => break,
                polled = self.api.get_updates(offset, self.poll_timeout_secs) => polled,
            };

            match polled {
                Ok(updates) => {
                    failures = 0;
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        updates_received += 1;
                        debug!(
                            event_name = "ingress.telegram.update_received",
                            update_id = update.update_id,
                            correlation_id = %format!("tg-{}", update.update_id),
                            "received telegram update"
                        );
                        let handler = self.handler.clone();
                        tasks.spawn(async move { handler.handle(update).await });
                    }
                }
                Err(error) => {
                    warn!(
                        event_name = "ingress.telegram.poll_failed",
                        attempt = failures,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %error,
                        "telegram polling failed"
                    );
                    if failures >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "telegram polling retries exhausted; continuing process without crash"
                        );
                        stop_reason = StopReason::RetriesExhausted;
                        break;
                    }

                    let delay = self.reconnect_policy.backoff(failures);
                    failures += 1;
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = shutdown.changed() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        while tasks.join_next().await.is_some() {}
        info!(
            event_name = "ingress.telegram.polling_stopped",
            updates_received,
            stop_reason = ?stop_reason,
            "telegram long polling stopped"
        );
        PollingSummary { updates_received, stop_reason }
    }
}
