use serde::{Deserialize, Serialize};

use crate::domain::conversation::ConversationTurn;
use crate::domain::safety::BlockedDetail;

/// The workflow participants that speak on behalf of the assistant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    IntentClassifier,
    Clarifier,
    InfoFaq,
    CourseSelector,
    ContractSupport,
}

impl HandlerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntentClassifier => "intent_classifier",
            Self::Clarifier => "clarifier",
            Self::InfoFaq => "info_faq",
            Self::CourseSelector => "course_selector",
            Self::ContractSupport => "contract_support",
        }
    }
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers of the person behind a conversation, used by the handoff action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRef {
    pub client_id: String,
    pub chat_id: String,
}

impl ClientRef {
    pub fn new(client_id: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self { client_id: client_id.into(), chat_id: chat_id.into() }
    }

    pub fn is_known(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub input_as_text: String,
    #[serde(default)]
    pub prior_turns: Vec<ConversationTurn>,
    #[serde(default)]
    pub client: ClientRef,
}

impl WorkflowInput {
    pub fn new(input_as_text: impl Into<String>) -> Self {
        Self { input_as_text: input_as_text.into(), ..Self::default() }
    }

    pub fn with_prior_turns(mut self, prior_turns: Vec<ConversationTurn>) -> Self {
        self.prior_turns = prior_turns;
        self
    }

    pub fn with_client(mut self, client: ClientRef) -> Self {
        self.client = client;
        self
    }

    /// Input fields the PII scrub is allowed to rewrite.
    pub fn scrubbable_fields_mut(&mut self) -> impl Iterator<Item = &mut String> {
        std::iter::once(&mut self.input_as_text)
    }
}

/// Terminal value of one workflow run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowResult {
    Blocked { safe_text: String, verdict_detail: BlockedDetail },
    Reply { output_text: String },
}

impl WorkflowResult {
    pub fn reply(output_text: impl Into<String>) -> Self {
        Self::Reply { output_text: output_text.into() }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    pub fn output_text(&self) -> Option<&str> {
        match self {
            Self::Reply { output_text } => Some(output_text),
            Self::Blocked { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ClientRef, WorkflowInput, WorkflowResult};
    use crate::domain::safety::BlockedDetail;

    #[test]
    fn results_serialize_without_a_tag() {
        let reply = serde_json::to_value(WorkflowResult::reply("Готово")).expect("reply");
        assert_eq!(reply, json!({"output_text": "Готово"}));

        let blocked = WorkflowResult::Blocked {
            safe_text: "***".to_owned(),
            verdict_detail: BlockedDetail::default(),
        };
        let value = serde_json::to_value(&blocked).expect("blocked");
        assert_eq!(value["safe_text"], "***");
        assert_eq!(value["verdict_detail"]["jailbreak"]["failed"], false);
        assert!(blocked.is_blocked());
        assert_eq!(blocked.output_text(), None);
    }

    #[test]
    fn scrub_reaches_the_raw_input_field() {
        let mut input = WorkflowInput::new("почта a@b.ru")
            .with_client(ClientRef::new("42", "42"));
        for field in input.scrubbable_fields_mut() {
            *field = field.replace("a@b.ru", "<EMAIL_ADDRESS>");
        }

        assert_eq!(input.input_as_text, "почта <EMAIL_ADDRESS>");
        assert!(input.client.is_known());
        assert!(!ClientRef::default().is_known());
    }
}
