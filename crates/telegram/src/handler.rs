use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pedrabotnik_agent::{ConsultationWorkflow, WorkflowRun};
use pedrabotnik_core::config::AppConfig;
use pedrabotnik_core::domain::workflow::{ClientRef, WorkflowInput};
use pedrabotnik_core::errors::{InterfaceError, EMPTY_REPLY};
use pedrabotnik_core::session::SessionStore;
use tracing::{debug, info, warn};

use crate::api::{split_message, Message, TelegramApi, Update, MAX_MESSAGE_CHARS};
use crate::polling::UpdateHandler;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerSettings {
    pub typing_interval: Duration,
    pub workflow_timeout: Duration,
}

impl HandlerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            typing_interval: Duration::from_secs(config.telegram.typing_interval_secs.max(1)),
            workflow_timeout: Duration::from_secs(config.workflow.timeout_secs),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Non-text or blank message.
    Ignored,
    Replied { text: String },
}

/// Runs one workflow per incoming text message and replies in the same chat.
pub struct MessageHandler {
    workflow: Arc<dyn ConsultationWorkflow>,
    sessions: Arc<dyn SessionStore>,
    api: Arc<dyn TelegramApi>,
    settings: HandlerSettings,
}

/// Text sent back for one invocation outcome.
pub fn reply_text(outcome: &Result<WorkflowRun, InterfaceError>) -> String {
    match outcome {
        Ok(run) => run
            .result
            .output_text()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(EMPTY_REPLY)
            .to_owned(),
        Err(error) => error.user_message().to_owned(),
    }
}

impl MessageHandler {
    pub fn new(
        workflow: Arc<dyn ConsultationWorkflow>,
        sessions: Arc<dyn SessionStore>,
        api: Arc<dyn TelegramApi>,
        settings: HandlerSettings,
    ) -> Self {
        Self { workflow, sessions, api, settings }
    }

    pub async fn handle_message(&self, message: &Message) -> HandlerOutcome {
        let Some(text) = message.trimmed_text() else {
            return HandlerOutcome::Ignored;
        };
        let chat_id = message.chat.id;
        let session_key = chat_id.to_string();
        let correlation_id = format!("tg-{chat_id}-{}", message.message_id);

        let prior_turns = self.sessions.history(&session_key).await;
        let input = WorkflowInput::new(text)
            .with_prior_turns(prior_turns)
            .with_client(ClientRef::new(message.client_id().to_string(), session_key.clone()));

        let outcome = self.run_with_typing(chat_id, input, &correlation_id).await;
        if let Ok(run) = &outcome {
            let exchange = run.exchange();
            if !exchange.is_empty() {
                self.sessions.append(&session_key, exchange).await;
            }
        }

        let reply = reply_text(&outcome);
        self.deliver(chat_id, &reply, &correlation_id).await;
        HandlerOutcome::Replied { text: reply }
    }

    async fn run_with_typing(
        &self,
        chat_id: i64,
        input: WorkflowInput,
        correlation_id: &str,
    ) -> Result<WorkflowRun, InterfaceError> {
        let timeout = self.settings.workflow_timeout;
        let work = tokio::time::timeout(timeout, self.workflow.run(input));

        match self.with_typing(chat_id, work).await {
            Ok(Ok(run)) => {
                info!(
                    event_name = "ingress.telegram.workflow_completed",
                    correlation_id,
                    workflow_correlation_id = %run.correlation_id,
                    chat_id,
                    blocked = run.result.is_blocked(),
                    "workflow finished"
                );
                Ok(run)
            }
            Ok(Err(error)) => {
                let error = error.into_interface(correlation_id);
                warn!(
                    event_name = "ingress.telegram.workflow_failed",
                    correlation_id,
                    chat_id,
                    error = %error,
                    "workflow failed"
                );
                Err(error)
            }
            Err(_) => {
                warn!(
                    event_name = "ingress.telegram.workflow_timeout",
                    correlation_id,
                    chat_id,
                    timeout_secs = timeout.as_secs(),
                    "workflow timed out"
                );
                Err(InterfaceError::timeout(timeout.as_secs(), correlation_id))
            }
        }
    }

    /// Keeps the typing indicator alive while `work` runs. Typing errors are ignored.
    async fn with_typing<F>(&self, chat_id: i64, work: F) -> F::Output
    where
        F: Future,
    {
        let api = self.api.clone();
        let interval = self.settings.typing_interval;
        let typing = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(error) = api.send_typing(chat_id).await {
                    debug!(event_name = "ingress.telegram.typing_failed", chat_id, error = %error, "typing failed");
                }
            }
        });

        let output = work.await;
        typing.abort();
        output
    }

    async fn deliver(&self, chat_id: i64, reply: &str, correlation_id: &str) {
        for chunk in split_message(reply, MAX_MESSAGE_CHARS) {
            if let Err(error) = self.api.send_message(chat_id, &chunk).await {
                warn!(
                    event_name = "ingress.telegram.send_failed",
                    correlation_id,
                    chat_id,
                    error = %error,
                    "failed to deliver reply"
                );
                return;
            }
        }
    }
}

#[async_trait]
impl UpdateHandler for MessageHandler {
    async fn handle(&self, update: Update) {
        if let Some(message) = update.message {
            self.handle_message(&message).await;
        }
    }
}
