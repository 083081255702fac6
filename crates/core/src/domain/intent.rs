use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Confidence strictly below this value routes to the clarifier.
pub const CLARIFICATION_CONFIDENCE_THRESHOLD: f64 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    AboutInstitute,
    ProgramChoice,
    DocumentsForStudy,
    Registration,
    ApplicationSubmission,
    Payment,
    LearningProcess,
    Attestation,
    DocumentsSubmission,
    OtherQuestion,
    CourseSelection,
    ContractSupport,
    Handoff,
}

impl IntentCategory {
    pub const ALL: [IntentCategory; 13] = [
        Self::AboutInstitute,
        Self::ProgramChoice,
        Self::DocumentsForStudy,
        Self::Registration,
        Self::ApplicationSubmission,
        Self::Payment,
        Self::LearningProcess,
        Self::Attestation,
        Self::DocumentsSubmission,
        Self::OtherQuestion,
        Self::CourseSelection,
        Self::ContractSupport,
        Self::Handoff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AboutInstitute => "about_institute",
            Self::ProgramChoice => "program_choice",
            Self::DocumentsForStudy => "documents_for_study",
            Self::Registration => "registration",
            Self::ApplicationSubmission => "application_submission",
            Self::Payment => "payment",
            Self::LearningProcess => "learning_process",
            Self::Attestation => "attestation",
            Self::DocumentsSubmission => "documents_submission",
            Self::OtherQuestion => "other_question",
            Self::CourseSelection => "course_selection",
            Self::ContractSupport => "contract_support",
            Self::Handoff => "handoff",
        }
    }

    /// The nine topics answered from the topic-section store.
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            Self::AboutInstitute
                | Self::ProgramChoice
                | Self::DocumentsForStudy
                | Self::Registration
                | Self::ApplicationSubmission
                | Self::Payment
                | Self::LearningProcess
                | Self::Attestation
                | Self::DocumentsSubmission
        )
    }
}

impl std::fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntentCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| format!("unknown intent category `{value}`"))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub category: IntentCategory,
    pub confidence: f64,
    pub needs_clarification: bool,
    #[serde(default)]
    pub clarification_question: String,
    pub needs_contract_number: bool,
}

impl IntentClassification {
    /// Guard of the clarifying branch; `confidence == 0.6` passes.
    pub fn requires_clarifier(&self) -> bool {
        self.confidence < CLARIFICATION_CONFIDENCE_THRESHOLD || self.needs_clarification
    }

    /// JSON schema handed to the inference collaborator for structured output.
    pub fn json_schema() -> Value {
        let categories: Vec<&str> = IntentCategory::ALL.iter().map(IntentCategory::as_str).collect();
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": [
                "category",
                "confidence",
                "needs_clarification",
                "clarification_question",
                "needs_contract_number"
            ],
            "properties": {
                "category": { "type": "string", "enum": categories },
                "confidence": { "type": "number" },
                "needs_clarification": { "type": "boolean" },
                "clarification_question": { "type": "string" },
                "needs_contract_number": { "type": "boolean" }
            }
        })
    }
}
