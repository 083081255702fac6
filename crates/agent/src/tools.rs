//! Side-effect actions a handler may invoke.
//!
//! Every invocation goes through [`ActionRegistry::invoke`], which refuses
//! actions the calling persona does not declare.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use pedrabotnik_core::contracts::ContractRegistry;
use pedrabotnik_core::domain::workflow::ClientRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::persona::{ActionRef, PersonaConfig};

#[async_trait]
pub trait Action: Send + Sync {
    fn action_ref(&self) -> ActionRef;
    async fn execute(&self, input: Value) -> Result<Value>;
}

#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    #[error("persona `{persona}` may not invoke `{action}`")]
    NotAllowed { persona: &'static str, action: &'static str },
    #[error("action `{0}` is not registered")]
    NotRegistered(&'static str),
    #[error("action `{action}` failed: {message}")]
    Failed { action: &'static str, message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActionOutcome {
    pub action: ActionRef,
    pub output: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffReceipt {
    pub status: String,
    pub client_id: String,
    pub chat_id: String,
}

#[derive(Clone, Copy, Debug, Deserialize)]
struct ContractInfoRequest {
    contract_number: i64,
}

/// Queues the conversation for a human consultant.
pub struct InviteAgentAction {
    queue: Option<mpsc::UnboundedSender<ClientRef>>,
}

impl InviteAgentAction {
    /// Handoffs are only logged.
    pub fn logging_only() -> Self {
        Self { queue: None }
    }

    pub fn with_queue(queue: mpsc::UnboundedSender<ClientRef>) -> Self {
        Self { queue: Some(queue) }
    }
}

#[async_trait]
impl Action for InviteAgentAction {
    fn action_ref(&self) -> ActionRef {
        ActionRef::InviteAgent
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let client: ClientRef = serde_json::from_value(input).context("handoff input")?;

        if let Some(queue) = &self.queue {
            if queue.send(client.clone()).is_err() {
                warn!(
                    event_name = "action.handoff_queue_closed",
                    chat_id = %client.chat_id,
                    "handoff queue receiver dropped"
                );
            }
        }
        info!(
            event_name = "action.handoff_queued",
            client_id = %client.client_id,
            chat_id = %client.chat_id,
            "conversation handed to a consultant"
        );

        let receipt = HandoffReceipt {
            status: "queued".to_owned(),
            client_id: client.client_id,
            chat_id: client.chat_id,
        };
        Ok(serde_json::to_value(receipt)?)
    }
}

pub struct ContractInfoAction {
    contracts: Arc<ContractRegistry>,
}

impl ContractInfoAction {
    pub fn new(contracts: Arc<ContractRegistry>) -> Self {
        Self { contracts }
    }
}

#[async_trait]
impl Action for ContractInfoAction {
    fn action_ref(&self) -> ActionRef {
        ActionRef::ContractInfo
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let request: ContractInfoRequest =
            serde_json::from_value(input).context("contract lookup input")?;
        let lookup = self.contracts.lookup(request.contract_number);
        Ok(serde_json::to_value(lookup)?)
    }
}

#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<ActionRef, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn standard(contracts: Arc<ContractRegistry>, handoff: InviteAgentAction) -> Self {
        let mut registry = Self::default();
        registry.register(handoff);
        registry.register(ContractInfoAction::new(contracts));
        registry
    }

    pub fn register<T>(&mut self, action: T)
    where
        T: Action + 'static,
    {
        self.actions.insert(action.action_ref(), Arc::new(action));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub async fn invoke(
        &self,
        persona: &PersonaConfig,
        action: ActionRef,
        input: Value,
    ) -> Result<ActionOutcome, ActionError> {
        if !persona.allows(action) {
            return Err(ActionError::NotAllowed { persona: persona.id, action: action.name() });
        }
        let handler = self.actions.get(&action).ok_or(ActionError::NotRegistered(action.name()))?;

        let output = handler
            .execute(input)
            .await
            .map_err(|error| ActionError::Failed { action: action.name(), message: format!("{error:#}") })?;
        Ok(ActionOutcome { action, output })
    }
}
