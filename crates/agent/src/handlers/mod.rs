//! The five workflow handlers.
//!
//! Every handler runs its persona through the inference client. The answering
//! handlers retrieve knowledge and contract data first and pass it to the model
//! as a context turn; fixed replies (document submission, materials access,
//! escalation) are applied before the model is asked.

pub mod classifier;
pub mod clarifier;
pub mod contract_support;
pub mod course_selector;
pub mod info_faq;
pub mod replies;

use pedrabotnik_core::domain::conversation::{ConversationTurn, Transcript};
use pedrabotnik_core::domain::workflow::{ClientRef, HandlerKind};
use pedrabotnik_core::errors::WorkflowError;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::llm::{InferenceOutput, LlmClient};
use crate::persona::{ActionRef, PersonaConfig};
use crate::tools::{ActionOutcome, ActionRegistry};

pub use classifier::{ClassifierRun, IntentClassifierHandler};
pub use clarifier::ClarifierHandler;
pub use contract_support::ContractSupportHandler;
pub use course_selector::CourseSelectorHandler;
pub use info_faq::InfoFaqHandler;

/// Trace of one handler run.
#[derive(Clone, Debug, PartialEq)]
pub struct HandlerReply {
    pub handler: HandlerKind,
    pub new_turns: Vec<ConversationTurn>,
    pub output_text: String,
    pub actions: Vec<ActionOutcome>,
}

impl HandlerReply {
    pub fn text(handler: HandlerKind, text: impl Into<String>) -> Self {
        let output_text = text.into();
        Self {
            handler,
            new_turns: vec![ConversationTurn::assistant(output_text.clone())],
            output_text,
            actions: Vec::new(),
        }
    }

    pub fn with_actions(mut self, actions: Vec<ActionOutcome>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Records actions that ran before the ones already on the reply.
    pub fn preceded_by(mut self, mut earlier: Vec<ActionOutcome>) -> Self {
        earlier.append(&mut self.actions);
        self.actions = earlier;
        self
    }

    pub fn invoked(&self, action: ActionRef) -> bool {
        self.actions.iter().any(|outcome| outcome.action == action)
    }
}

pub(crate) async fn run_persona(
    llm: &dyn LlmClient,
    handler: HandlerKind,
    persona: &PersonaConfig,
    transcript: &Transcript,
) -> Result<InferenceOutput, WorkflowError> {
    llm.run(persona, transcript)
        .await
        .map_err(|error| WorkflowError::Inference { handler, message: format!("{error:#}") })
}

pub(crate) fn decode_structured<T: DeserializeOwned>(
    handler: HandlerKind,
    output: InferenceOutput,
) -> Result<T, WorkflowError> {
    let value = output.structured.ok_or(WorkflowError::MissingOutput { handler })?;
    serde_json::from_value(value)
        .map_err(|error| WorkflowError::InvalidOutput { handler, message: error.to_string() })
}

/// Escalation text plus a handoff. A failed handoff is logged, the reply still goes out.
pub(crate) async fn escalate(
    handler: HandlerKind,
    persona: &PersonaConfig,
    actions: &ActionRegistry,
    client: &ClientRef,
) -> HandlerReply {
    let reply = HandlerReply::text(handler, replies::ESCALATION_REPLY);
    if !client.is_known() {
        warn!(event_name = "action.handoff_skipped", handler = %handler, "no client reference for handoff");
        return reply;
    }

    let input = match serde_json::to_value(client) {
        Ok(input) => input,
        Err(error) => {
            warn!(event_name = "action.handoff_failed", handler = %handler, error = %error, "handoff input");
            return reply;
        }
    };
    match actions.invoke(persona, ActionRef::InviteAgent, input).await {
        Ok(outcome) => reply.with_actions(vec![outcome]),
        Err(error) => {
            warn!(
                event_name = "action.handoff_failed",
                handler = %handler,
                chat_id = %client.chat_id,
                error = %error,
                "handoff could not be queued"
            );
            reply
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use pedrabotnik_core::contracts::ContractRegistry;
    use pedrabotnik_core::domain::conversation::Transcript;
    use pedrabotnik_core::domain::course::{CourseFacts, FocusVocabulary};
    use pedrabotnik_core::domain::intent::IntentCategory;
    use pedrabotnik_core::knowledge::{CourseRecord, DialogueExample, KnowledgeSource, OneOrMany};
    use serde_json::json;
    use tokio::sync::Mutex;

    use crate::llm::{InferenceOutput, LlmClient};
    use crate::persona::PersonaConfig;
    use crate::tools::{ActionRegistry, InviteAgentAction};

    /// Knowledge with one dialogue answer, one topic section and one course.
    pub struct FixtureKnowledge;

    impl KnowledgeSource for FixtureKnowledge {
        fn dialogue_candidates(&self, question: &str, _limit: usize) -> Vec<DialogueExample> {
            if question.to_lowercase().contains("удостоверение") {
                vec![DialogueExample {
                    question: "Как получить удостоверение?".to_owned(),
                    answer: "Удостоверение отправляется Почтой России.".to_owned(),
                }]
            } else {
                Vec::new()
            }
        }

        fn topic_section(&self, category: IntentCategory) -> Option<String> {
            (category == IntentCategory::Payment).then(|| "Оплата принимается картой или по счету.".to_owned())
        }

        fn recommend_courses(&self, facts: &CourseFacts) -> Vec<CourseRecord> {
            if facts.focus.iter().any(|focus| focus.starts_with("матем")) {
                vec![CourseRecord {
                    course_name: "Методика преподавания математики".to_owned(),
                    course_type: "Повышение квалификации".to_owned(),
                    pricing_and_course_length: json!("72 ч., 2500 руб."),
                    course_page_link: "https://педработник.рф/math".to_owned(),
                    education_level: OneOrMany::One("Школа".to_owned()),
                    professions: OneOrMany::Many(vec!["Учитель математики".to_owned()]),
                }]
            } else {
                Vec::new()
            }
        }

        fn focus_vocabulary(&self) -> FocusVocabulary {
            FocusVocabulary::default()
        }
    }

    /// Answers each persona with a fixed output and records what it was shown.
    #[derive(Default)]
    pub struct ScriptedModel {
        outputs: Vec<(&'static str, InferenceOutput)>,
        seen: Mutex<Vec<(&'static str, Transcript)>>,
    }

    impl ScriptedModel {
        pub fn answering(mut self, persona: &'static str, output: InferenceOutput) -> Self {
            self.outputs.push((persona, output));
            self
        }

        pub async fn calls(&self) -> Vec<&'static str> {
            self.seen.lock().await.iter().map(|(persona, _)| *persona).collect()
        }

        /// Text of the last turn handed to the model.
        pub async fn last_context(&self) -> Option<String> {
            let seen = self.seen.lock().await;
            seen.last().and_then(|(_, transcript)| transcript.turns().last()).map(|turn| turn.text())
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedModel {
        async fn run(&self, persona: &PersonaConfig, transcript: &Transcript) -> Result<InferenceOutput> {
            self.seen.lock().await.push((persona.id, transcript.clone()));
            match self.outputs.iter().find(|(id, _)| *id == persona.id) {
                Some((_, output)) => Ok(output.clone()),
                None => bail!("no scripted output for persona `{}`", persona.id),
            }
        }
    }

    pub fn actions() -> ActionRegistry {
        let contracts = ContractRegistry::from_json_str(
            r#"{
                "1001": {"payment_status": "оплачен", "documents_received": true,
                         "certificate_status": "отправлен", "tracking_number": "80080012345678"},
                "1002": {"note": "пусто"}
            }"#,
        );
        ActionRegistry::standard(Arc::new(contracts), InviteAgentAction::logging_only())
    }
}
