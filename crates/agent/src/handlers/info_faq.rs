use pedrabotnik_core::domain::conversation::{ConversationTurn, Role, Transcript};
use pedrabotnik_core::domain::intent::IntentCategory;
use pedrabotnik_core::domain::workflow::{ClientRef, HandlerKind};
use pedrabotnik_core::errors::WorkflowError;
use pedrabotnik_core::knowledge::{DialogueExample, KnowledgeSource};
use serde::Deserialize;
use tracing::debug;

use super::replies::{
    with_closing_line, CONTRACT_NUMBER_PROMPT, DOCUMENT_SUBMISSION_REPLY, MATERIALS_ACCESS_REPLY,
};
use super::{decode_structured, escalate, run_persona, HandlerReply};
use crate::conversation::{is_already_sent_notice, is_materials_access_request, is_submission_request};
use crate::llm::LlmClient;
use crate::persona::PersonaConfig;
use crate::tools::ActionRegistry;

const HANDLER: HandlerKind = HandlerKind::InfoFaq;
const MAX_DIALOGUE_CANDIDATES: usize = 3;

/// Answers from the dialogue store first, then from the topic section of the
/// resolved category. The category arrives as the last assistant turn; the
/// model picks the source and the stored text is returned verbatim.
pub struct InfoFaqHandler {
    persona: PersonaConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AnswerSource {
    Dialogue,
    Topic,
    None,
}

#[derive(Debug, Deserialize)]
struct AnswerChoice {
    source: AnswerSource,
    /// 1-based number of the chosen dialogue, 0 otherwise.
    #[serde(default)]
    dialogue: i64,
}

/// Category carried by the trailing assistant context turn.
pub fn category_from_context(transcript: &Transcript) -> Option<IntentCategory> {
    transcript
        .turns()
        .last()
        .filter(|turn| turn.role == Role::Assistant)
        .and_then(|turn| turn.text().parse().ok())
}

fn materials_turn(
    dialogues: &[DialogueExample],
    category: IntentCategory,
    section: Option<&str>,
) -> ConversationTurn {
    let mut text = String::from("Материалы для ответа.\n");
    if dialogues.is_empty() {
        text.push_str("\nГотовых ответов в базе диалогов не найдено.\n");
    }
    for (index, example) in dialogues.iter().enumerate() {
        text.push_str(&format!(
            "\nГотовый ответ {}.\nВопрос: {}\nОтвет: {}\n",
            index + 1,
            example.question,
            example.answer
        ));
    }
    match section {
        Some(section) => text.push_str(&format!("\nРаздел справки «{category}»:\n{section}\n")),
        None => text.push_str(&format!("\nРаздела справки «{category}» нет.\n")),
    }
    ConversationTurn::assistant(text)
}

impl InfoFaqHandler {
    pub fn new(persona: PersonaConfig) -> Self {
        Self { persona }
    }

    pub async fn respond(
        &self,
        llm: &dyn LlmClient,
        transcript: &Transcript,
        knowledge: &dyn KnowledgeSource,
        actions: &ActionRegistry,
        client: &ClientRef,
    ) -> Result<HandlerReply, WorkflowError> {
        let category = category_from_context(transcript).unwrap_or(IntentCategory::OtherQuestion);
        let question = transcript.latest_user_text().unwrap_or_default();

        if category == IntentCategory::Handoff {
            return Ok(escalate(HANDLER, &self.persona, actions, client).await);
        }
        if is_submission_request(&question) {
            return Ok(HandlerReply::text(HANDLER, DOCUMENT_SUBMISSION_REPLY));
        }
        if is_already_sent_notice(&question) {
            return Ok(HandlerReply::text(HANDLER, CONTRACT_NUMBER_PROMPT));
        }
        if is_materials_access_request(&question) {
            return Ok(HandlerReply::text(HANDLER, with_closing_line(MATERIALS_ACCESS_REPLY)));
        }

        let dialogues = knowledge.dialogue_candidates(&question, MAX_DIALOGUE_CANDIDATES);
        let section = if category.is_informational() { knowledge.topic_section(category) } else { None };
        if dialogues.is_empty() && section.is_none() {
            debug!(event_name = "handler.info_faq.nothing_found", category = %category, "no material to answer from");
            return Ok(escalate(HANDLER, &self.persona, actions, client).await);
        }

        let context = transcript.with_context_turn(materials_turn(&dialogues, category, section.as_deref()));
        let output = run_persona(llm, HANDLER, &self.persona, &context).await?;
        let choice: AnswerChoice = decode_structured(HANDLER, output)?;

        let answer = match choice.source {
            AnswerSource::Dialogue => usize::try_from(choice.dialogue)
                .ok()
                .and_then(|number| number.checked_sub(1))
                .and_then(|index| dialogues.get(index))
                .map(|example| example.answer.clone()),
            AnswerSource::Topic => section,
            AnswerSource::None => None,
        };
        debug!(
            event_name = "handler.info_faq.source_chosen",
            category = %category,
            source = ?choice.source,
            dialogue_candidates = dialogues.len(),
            answered = answer.is_some(),
            "info answer source"
        );

        match answer {
            Some(answer) => Ok(HandlerReply::text(HANDLER, with_closing_line(&answer))),
            None => Ok(escalate(HANDLER, &self.persona, actions, client).await),
        }
    }
}
