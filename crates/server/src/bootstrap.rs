use std::sync::Arc;

use pedrabotnik_agent::runtime::AgentRuntime;
use pedrabotnik_agent::tools::InviteAgentAction;
use pedrabotnik_core::config::{AppConfig, ConfigError, LoadOptions};
use pedrabotnik_core::contracts::ContractRegistry;
use pedrabotnik_core::domain::workflow::ClientRef;
use pedrabotnik_core::knowledge::{KnowledgeBase, KnowledgeError};
use pedrabotnik_core::session::InMemorySessionStore;
use pedrabotnik_telegram::polling::UpdateHandler;
use pedrabotnik_telegram::{
    HandlerSettings, HttpTelegramApi, MessageHandler, PollingRunner, ReconnectPolicy, TelegramApi,
    TransportError,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub agent_runtime: Arc<AgentRuntime>,
    pub sessions: Arc<InMemorySessionStore>,
    pub knowledge_summary: KnowledgeSummary,
    /// Clients waiting for a human operator.
    pub handoff_queue: mpsc::UnboundedReceiver<ClientRef>,
    /// `None` when the Telegram transport is disabled.
    pub telegram_runner: Option<PollingRunner>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KnowledgeSummary {
    pub dialogues: usize,
    pub courses: usize,
    pub contracts: usize,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
    #[error("agent runtime initialization failed: {0}")]
    Runtime(String),
    #[error("telegram transport initialization failed: {0}")]
    Transport(#[from] TransportError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let knowledge = KnowledgeBase::load(&config.knowledge)?;
    let contracts = ContractRegistry::from_config(&config.knowledge);
    if contracts.is_malformed() {
        warn!(
            event_name = "system.bootstrap.contracts_malformed",
            correlation_id = "bootstrap",
            "contract data is unreadable; every lookup will report not found"
        );
    }
    let knowledge_summary = KnowledgeSummary {
        dialogues: knowledge.dialogue_count(),
        courses: knowledge.course_count(),
        contracts: contracts.len(),
    };
    info!(
        event_name = "system.bootstrap.knowledge_loaded",
        correlation_id = "bootstrap",
        dialogues = knowledge_summary.dialogues,
        courses = knowledge_summary.courses,
        contracts = knowledge_summary.contracts,
        "knowledge sources loaded"
    );

    let (handoff_tx, handoff_queue) = mpsc::unbounded_channel();
    let agent_runtime = AgentRuntime::from_config(
        &config,
        Arc::new(knowledge),
        Arc::new(contracts),
        InviteAgentAction::with_queue(handoff_tx),
    )
    .map_err(|error| BootstrapError::Runtime(format!("{error:#}")))?;
    let agent_runtime = Arc::new(agent_runtime);
    let sessions = Arc::new(InMemorySessionStore::new(config.session.max_turns));

    let telegram_runner = if config.telegram.enabled {
        let api: Arc<dyn TelegramApi> = Arc::new(HttpTelegramApi::from_config(&config.telegram)?);
        let handler: Arc<dyn UpdateHandler> = Arc::new(MessageHandler::new(
            agent_runtime.clone(),
            sessions.clone(),
            api.clone(),
            HandlerSettings::from_config(&config),
        ));
        let policy = ReconnectPolicy {
            max_retries: config.telegram.max_retries,
            base_delay_ms: config.telegram.base_delay_ms,
            max_delay_ms: config.telegram.max_delay_ms,
        };
        Some(PollingRunner::new(api, handler, policy, config.telegram.poll_timeout_secs))
    } else {
        None
    };

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        telegram_enabled = telegram_runner.is_some(),
        "application bootstrap finished"
    );

    Ok(Application { config, agent_runtime, sessions, knowledge_summary, handoff_queue, telegram_runner })
}
