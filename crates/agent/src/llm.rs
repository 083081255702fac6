use anyhow::Result;
use async_trait::async_trait;
use pedrabotnik_core::domain::conversation::{ConversationTurn, Transcript};
use serde_json::Value;

use crate::persona::PersonaConfig;

/// What one persona run produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InferenceOutput {
    /// Turns to append to the transcript, in order.
    pub new_turns: Vec<ConversationTurn>,
    /// Parsed structured output, when the persona asked for a schema.
    pub structured: Option<Value>,
    pub free_text: Option<String>,
}

impl InferenceOutput {
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            new_turns: vec![ConversationTurn::assistant(text.clone())],
            structured: None,
            free_text: Some(text),
        }
    }

    pub fn structured(value: Value) -> Self {
        Self {
            new_turns: vec![ConversationTurn::assistant(value.to_string())],
            structured: Some(value),
            free_text: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn run(&self, persona: &PersonaConfig, transcript: &Transcript) -> Result<InferenceOutput>;
}
