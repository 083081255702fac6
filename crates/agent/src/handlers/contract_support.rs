use pedrabotnik_core::contracts::ContractLookup;
use pedrabotnik_core::domain::conversation::{ConversationTurn, Role, Transcript};
use pedrabotnik_core::domain::workflow::{ClientRef, HandlerKind};
use pedrabotnik_core::errors::WorkflowError;
use serde_json::json;
use tracing::info;

use super::replies::{with_closing_line, CONTRACT_NUMBER_PROMPT};
use super::{escalate, run_persona, HandlerReply};
use crate::conversation::{extract_contract_number, is_data_change_request};
use crate::llm::LlmClient;
use crate::persona::{ActionRef, PersonaConfig};
use crate::tools::ActionRegistry;

const HANDLER: HandlerKind = HandlerKind::ContractSupport;

pub struct ContractSupportHandler {
    persona: PersonaConfig,
}

/// Contract number from the current message, or from an earlier message that
/// answered the number prompt. Numbers elsewhere in the history are ignored.
fn contract_number_in(transcript: &Transcript) -> Option<i64> {
    let turns = transcript.turns();
    let current = turns.iter().rposition(|turn| turn.role == Role::User)?;
    let answers_prompt = |index: usize| {
        index
            .checked_sub(1)
            .and_then(|previous| turns.get(previous))
            .is_some_and(|turn| turn.role == Role::Assistant && turn.text().trim() == CONTRACT_NUMBER_PROMPT)
    };

    turns[..=current]
        .iter()
        .enumerate()
        .rev()
        .filter(|(index, turn)| turn.role == Role::User && (*index == current || answers_prompt(*index)))
        .find_map(|(_, turn)| extract_contract_number(&turn.text()))
}

/// Facts for the model, only the fields the lookup returned.
fn compose_status(contract_number: i64, lookup: &ContractLookup) -> String {
    let mut lines = vec![format!("Данные по договору №{contract_number}:")];
    if let Some(payment) = lookup.payment_status() {
        lines.push(format!("Статус оплаты: {payment}."));
    }
    if let Some(documents) = lookup.documents_received() {
        lines.push(format!("Документы получены: {documents}."));
    }
    if let Some(certificate) = lookup.certificate_status() {
        lines.push(format!("Документ об образовании: {certificate}."));
    }
    if let Some(tracking) = lookup.tracking_number() {
        lines.push(format!("Трек-номер посылки: {tracking}."));
    }
    lines.join("\n")
}

impl ContractSupportHandler {
    pub fn new(persona: PersonaConfig) -> Self {
        Self { persona }
    }

    pub async fn respond(
        &self,
        llm: &dyn LlmClient,
        transcript: &Transcript,
        actions: &ActionRegistry,
        client: &ClientRef,
    ) -> Result<HandlerReply, WorkflowError> {
        let latest = transcript.latest_user_text().unwrap_or_default();
        if is_data_change_request(&latest) {
            return Ok(escalate(HANDLER, &self.persona, actions, client).await);
        }

        let Some(contract_number) = contract_number_in(transcript) else {
            return Ok(HandlerReply::text(HANDLER, CONTRACT_NUMBER_PROMPT));
        };

        let outcome = actions
            .invoke(&self.persona, ActionRef::ContractInfo, json!({ "contract_number": contract_number }))
            .await
            .map_err(|error| WorkflowError::Knowledge(error.to_string()))?;
        let lookup: ContractLookup = serde_json::from_value(outcome.output.clone()).unwrap_or_default();
        info!(
            event_name = "handler.contract_support.lookup",
            found = lookup.found,
            usable = lookup.is_usable(),
            "contract looked up"
        );

        if !lookup.is_usable() {
            let reply = escalate(HANDLER, &self.persona, actions, client).await;
            return Ok(reply.preceded_by(vec![outcome]));
        }

        let facts = ConversationTurn::assistant(compose_status(contract_number, &lookup));
        let output = run_persona(llm, HANDLER, &self.persona, &transcript.with_context_turn(facts)).await?;
        let text = output
            .free_text
            .filter(|text| !text.trim().is_empty())
            .ok_or(WorkflowError::MissingOutput { handler: HANDLER })?;

        Ok(HandlerReply::text(HANDLER, with_closing_line(&text)).with_actions(vec![outcome]))
    }
}
