//! Persona configuration for each workflow participant.
//!
//! A persona bundles the instructions handed to the inference client, the
//! actions the handler may invoke and the knowledge it may read. Instructions
//! are opaque to the workflow.

use std::borrow::Cow;

use pedrabotnik_core::domain::intent::IntentClassification;
use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionRef {
    InviteAgent,
    ContractInfo,
}

impl ActionRef {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InviteAgent => "inviteAgent",
            Self::ContractInfo => "getcontractinfo",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KnowledgeRef {
    Dialogues,
    Topics,
    RetrainingCatalog,
    UpskillingCatalog,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OutputMode {
    Text,
    Structured { name: &'static str, schema: Value },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PersonaConfig {
    pub id: &'static str,
    pub instructions: Cow<'static, str>,
    pub allowed_actions: Vec<ActionRef>,
    pub knowledge_refs: Vec<KnowledgeRef>,
    pub output: OutputMode,
    pub model: String,
}

impl PersonaConfig {
    pub fn allows(&self, action: ActionRef) -> bool {
        self.allowed_actions.contains(&action)
    }

    pub fn structured_schema(&self) -> Option<(&'static str, &Value)> {
        match &self.output {
            OutputMode::Structured { name, schema } => Some((name, schema)),
            OutputMode::Text => None,
        }
    }

    pub fn intent_classifier(model: impl Into<String>) -> Self {
        Self {
            id: "intent_classifier",
            instructions: Cow::Borrowed(include_str!("../personas/intent_classifier.md")),
            allowed_actions: Vec::new(),
            knowledge_refs: Vec::new(),
            output: OutputMode::Structured {
                name: "intent_classification",
                schema: IntentClassification::json_schema(),
            },
            model: model.into(),
        }
    }

    pub fn clarifier(model: impl Into<String>) -> Self {
        Self {
            id: "clarifier",
            instructions: Cow::Borrowed(include_str!("../personas/clarifier.md")),
            allowed_actions: Vec::new(),
            knowledge_refs: Vec::new(),
            output: OutputMode::Text,
            model: model.into(),
        }
    }

    pub fn info_faq(model: impl Into<String>) -> Self {
        Self {
            id: "info_faq",
            instructions: Cow::Borrowed(include_str!("../personas/info_faq.md")),
            allowed_actions: vec![ActionRef::InviteAgent],
            knowledge_refs: vec![KnowledgeRef::Dialogues, KnowledgeRef::Topics],
            output: OutputMode::Structured {
                name: "info_faq_answer",
                schema: json!({
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["source", "dialogue"],
                    "properties": {
                        "source": { "type": "string", "enum": ["dialogue", "topic", "none"] },
                        "dialogue": { "type": "integer" }
                    }
                }),
            },
            model: model.into(),
        }
    }

    pub fn course_selector(model: impl Into<String>) -> Self {
        Self {
            id: "course_selector",
            instructions: Cow::Borrowed(include_str!("../personas/course_selector.md")),
            allowed_actions: vec![ActionRef::InviteAgent],
            knowledge_refs: vec![
                KnowledgeRef::RetrainingCatalog,
                KnowledgeRef::UpskillingCatalog,
                KnowledgeRef::Dialogues,
            ],
            output: OutputMode::Structured {
                name: "course_selection",
                schema: json!({
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["on_topic", "course_ids"],
                    "properties": {
                        "on_topic": { "type": "boolean" },
                        "course_ids": { "type": "array", "items": { "type": "integer" }, "maxItems": 3 }
                    }
                }),
            },
            model: model.into(),
        }
    }

    pub fn contract_support(model: impl Into<String>) -> Self {
        Self {
            id: "contract_support",
            instructions: Cow::Borrowed(include_str!("../personas/contract_support.md")),
            allowed_actions: vec![ActionRef::ContractInfo, ActionRef::InviteAgent],
            knowledge_refs: vec![KnowledgeRef::Dialogues],
            output: OutputMode::Text,
            model: model.into(),
        }
    }

    pub fn jailbreak_detector(model: impl Into<String>) -> Self {
        Self {
            id: "jailbreak_detector",
            instructions: Cow::Borrowed(include_str!("../personas/jailbreak_detector.md")),
            allowed_actions: Vec::new(),
            knowledge_refs: Vec::new(),
            output: OutputMode::Structured {
                name: "jailbreak_verdict",
                schema: json!({
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["flagged", "confidence", "reasoning"],
                    "properties": {
                        "flagged": { "type": "boolean" },
                        "confidence": { "type": "number" },
                        "reasoning": { "type": "string" }
                    }
                }),
            },
            model: model.into(),
        }
    }
}

/// The five handler personas of one deployment.
#[derive(Clone, Debug)]
pub struct PersonaSet {
    pub intent_classifier: PersonaConfig,
    pub clarifier: PersonaConfig,
    pub info_faq: PersonaConfig,
    pub course_selector: PersonaConfig,
    pub contract_support: PersonaConfig,
}

impl PersonaSet {
    pub fn for_model(model: &str) -> Self {
        Self {
            intent_classifier: PersonaConfig::intent_classifier(model),
            clarifier: PersonaConfig::clarifier(model),
            info_faq: PersonaConfig::info_faq(model),
            course_selector: PersonaConfig::course_selector(model),
            contract_support: PersonaConfig::contract_support(model),
        }
    }
}
