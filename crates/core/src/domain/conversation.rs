use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
    OutputText { text: String },
    /// Content kinds the workflow carries through untouched (images, files, ...).
    Opaque { kind: String, payload: Value },
}

impl ContentPart {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::InputText { text } | Self::OutputText { text } => Some(text),
            Self::Opaque { .. } => None,
        }
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        match self {
            Self::InputText { text } | Self::OutputText { text } => Some(text),
            Self::Opaque { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: vec![ContentPart::InputText { text: text.into() }] }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: vec![ContentPart::OutputText { text: text.into() }] }
    }

    /// All text parts joined with newlines; opaque parts are skipped.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(ContentPart::text).collect::<Vec<_>>().join("\n")
    }
}

/// Append-only transcript owned by a single workflow invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    /// Prior history first, then the new user turn.
    pub fn seeded(prior_turns: Vec<ConversationTurn>, user_text: &str) -> Self {
        let mut turns = prior_turns;
        turns.push(ConversationTurn::user(user_text));
        Self { turns }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn append<I>(&mut self, turns: I)
    where
        I: IntoIterator<Item = ConversationTurn>,
    {
        self.turns.extend(turns);
    }

    /// A copy of the transcript with one extra context turn at the end.
    pub fn with_context_turn(&self, turn: ConversationTurn) -> Self {
        let mut turns = self.turns.clone();
        turns.push(turn);
        Self { turns }
    }

    pub fn latest_user_text(&self) -> Option<String> {
        self.turns.iter().rev().find(|turn| turn.role == Role::User).map(ConversationTurn::text)
    }

    /// User texts, oldest first.
    pub fn user_texts(&self) -> Vec<String> {
        self.turns
            .iter()
            .filter(|turn| turn.role == Role::User)
            .map(ConversationTurn::text)
            .collect()
    }

    /// Mutable access to every text part; reserved for the PII scrub pass.
    pub fn text_parts_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.turns.iter_mut().flat_map(|turn| turn.content.iter_mut()).filter_map(ContentPart::text_mut)
    }
}
