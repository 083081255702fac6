mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use pedrabotnik_core::config::{AppConfig, LoadOptions};
use pedrabotnik_core::domain::workflow::ClientRef;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use pedrabotnik_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState::new(&app.config, app.knowledge_summary, app.sessions.clone()),
    )
    .await?;

    tokio::spawn(drain_handoffs(app.handoff_queue));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let polling = app.telegram_runner.map(|runner| tokio::spawn(async move { runner.run(shutdown_rx).await }));

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        telegram_enabled = polling.is_some(),
        "pedrabotnik-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "pedrabotnik-server stopping"
    );

    let _ = shutdown_tx.send(true);
    if let Some(polling) = polling {
        let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
        match tokio::time::timeout(grace, polling).await {
            Ok(Ok(summary)) => tracing::info!(
                event_name = "system.server.polling_drained",
                correlation_id = "shutdown",
                updates_received = summary.updates_received,
                "telegram polling drained"
            ),
            Ok(Err(error)) => tracing::warn!(
                event_name = "system.server.polling_panicked",
                correlation_id = "shutdown",
                error = %error,
                "telegram polling task failed"
            ),
            Err(_) => tracing::warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "in-flight conversations did not finish before the grace period"
            ),
        }
    }

    Ok(())
}

/// Queued handoffs are logged for the operator desk.
async fn drain_handoffs(mut queue: mpsc::UnboundedReceiver<ClientRef>) {
    while let Some(client) = queue.recv().await {
        tracing::info!(
            event_name = "handoff.queued",
            correlation_id = "handoff",
            client_id = %client.client_id,
            chat_id = %client.chat_id,
            "client waiting for a human operator"
        );
    }
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
