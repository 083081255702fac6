use pedrabotnik_core::domain::conversation::Transcript;
use pedrabotnik_core::domain::intent::{IntentCategory, IntentClassification};
use pedrabotnik_core::domain::workflow::HandlerKind;
use pedrabotnik_core::errors::WorkflowError;

use super::HandlerReply;
use crate::llm::LlmClient;
use crate::persona::PersonaConfig;

const HANDLER: HandlerKind = HandlerKind::Clarifier;

pub struct ClarifierHandler {
    persona: PersonaConfig,
}

/// Sentences of `text`, each with its terminator.
fn sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch == '\n' {
            if !current.trim().is_empty() {
                sentences.push(current.trim().to_owned());
            }
            current.clear();
            continue;
        }
        current.push(ch);
        if matches!(ch, '?' | '.' | '!') {
            if !current.trim().is_empty() {
                sentences.push(current.trim().to_owned());
            }
            current.clear();
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_owned());
    }
    sentences
}

fn names_a_category(sentence: &str) -> bool {
    IntentCategory::ALL.iter().any(|category| sentence.contains(category.as_str()))
}

/// The first question sentence; a plain sentence becomes a question.
pub fn single_question(text: &str) -> Option<String> {
    let candidates: Vec<String> =
        sentences(text).into_iter().filter(|sentence| !names_a_category(sentence)).collect();

    if let Some(question) = candidates.iter().find(|sentence| sentence.ends_with('?')) {
        return Some(question.clone());
    }
    candidates.into_iter().next().map(|sentence| {
        let stem = sentence.trim_end_matches(['.', '!']).trim_end();
        format!("{stem}?")
    })
}

impl ClarifierHandler {
    pub fn new(persona: PersonaConfig) -> Self {
        Self { persona }
    }

    pub async fn respond(
        &self,
        llm: &dyn LlmClient,
        transcript: &Transcript,
        classification: &IntentClassification,
    ) -> Result<HandlerReply, WorkflowError> {
        let output = llm.run(&self.persona, transcript).await.map_err(|error| {
            WorkflowError::Inference { handler: HANDLER, message: format!("{error:#}") }
        })?;

        let text = output.free_text.ok_or(WorkflowError::MissingOutput { handler: HANDLER })?;
        // Fall back to the classifier's question when the model only named categories.
        let question = single_question(&text)
            .or_else(|| single_question(&classification.clarification_question))
            .ok_or(WorkflowError::MissingOutput { handler: HANDLER })?;

        Ok(HandlerReply::text(HANDLER, question))
    }
}
