use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use pedrabotnik_core::config::{AppConfig, LlmProvider};
use pedrabotnik_core::session::SessionStore;
use serde::Serialize;
use tracing::{error, info};

use crate::bootstrap::KnowledgeSummary;

#[derive(Clone)]
pub struct HealthState {
    pub llm_provider: LlmProvider,
    pub llm_model: String,
    pub llm_key_present: bool,
    pub telegram_enabled: bool,
    pub knowledge: KnowledgeSummary,
    pub sessions: Arc<dyn SessionStore>,
}

impl HealthState {
    pub fn new(config: &AppConfig, knowledge: KnowledgeSummary, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            llm_provider: config.llm.provider,
            llm_model: config.llm.model.clone(),
            llm_key_present: config.llm.api_key.is_some(),
            telegram_enabled: config.telegram.enabled,
            knowledge,
            sessions,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub llm: HealthCheck,
    pub sessions: HealthCheck,
    pub knowledge: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let llm = llm_check(&state);
    let ready = llm.status == "ready";
    let chats = state.sessions.chat_count().await;

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!(
                "pedrabotnik-server runtime initialized (telegram {})",
                if state.telegram_enabled { "enabled" } else { "disabled" }
            ),
        },
        llm,
        sessions: HealthCheck { status: "ready", detail: format!("{chats} active chats") },
        knowledge: HealthCheck {
            status: "ready",
            detail: format!(
                "{} dialogue examples, {} courses, {} contracts",
                state.knowledge.dialogues, state.knowledge.courses, state.knowledge.contracts
            ),
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

/// Configuration only; no inference request is made.
fn llm_check(state: &HealthState) -> HealthCheck {
    let keyless = state.llm_provider == LlmProvider::Ollama;
    if state.llm_key_present || keyless {
        HealthCheck {
            status: "ready",
            detail: format!("{:?} provider, model `{}`", state.llm_provider, state.llm_model),
        }
    } else {
        HealthCheck { status: "degraded", detail: "llm api key is not configured".to_string() }
    }
}
