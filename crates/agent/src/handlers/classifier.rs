use pedrabotnik_core::domain::conversation::{ConversationTurn, Transcript};
use pedrabotnik_core::domain::intent::IntentClassification;
use pedrabotnik_core::domain::workflow::HandlerKind;
use pedrabotnik_core::errors::WorkflowError;

use crate::conversation::ClassificationRules;
use crate::llm::LlmClient;
use crate::persona::PersonaConfig;

const HANDLER: HandlerKind = HandlerKind::IntentClassifier;

#[derive(Clone, Debug, PartialEq)]
pub struct ClassifierRun {
    pub classification: IntentClassification,
    /// One assistant turn carrying the enforced classification as JSON.
    pub new_turns: Vec<ConversationTurn>,
}

pub struct IntentClassifierHandler {
    persona: PersonaConfig,
    rules: ClassificationRules,
}

impl IntentClassifierHandler {
    pub fn new(persona: PersonaConfig, rules: ClassificationRules) -> Self {
        Self { persona, rules }
    }

    pub async fn classify(
        &self,
        llm: &dyn LlmClient,
        transcript: &Transcript,
    ) -> Result<ClassifierRun, WorkflowError> {
        let output = llm.run(&self.persona, transcript).await.map_err(|error| {
            WorkflowError::Inference { handler: HANDLER, message: format!("{error:#}") }
        })?;
        let value = output.structured.ok_or(WorkflowError::MissingOutput { handler: HANDLER })?;

        let proposed: IntentClassification = serde_json::from_value(value)
            .map_err(|error| WorkflowError::InvalidOutput { handler: HANDLER, message: error.to_string() })?;
        let classification = self.rules.apply(proposed, transcript);

        let encoded = serde_json::to_string(&classification)
            .map_err(|error| WorkflowError::InvalidOutput { handler: HANDLER, message: error.to_string() })?;
        Ok(ClassifierRun { classification, new_turns: vec![ConversationTurn::assistant(encoded)] })
    }
}
