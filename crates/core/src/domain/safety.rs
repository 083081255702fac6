use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCheck {
    Pii,
    Moderation,
    Jailbreak,
    Hallucination,
    Nsfw,
    UrlFilter,
    CustomPromptCheck,
    PromptInjection,
}

impl SafetyCheck {
    pub const ALL: [SafetyCheck; 8] = [
        Self::Pii,
        Self::Moderation,
        Self::Jailbreak,
        Self::Hallucination,
        Self::Nsfw,
        Self::UrlFilter,
        Self::CustomPromptCheck,
        Self::PromptInjection,
    ];

    /// Display name used by guardrail policy documents.
    pub fn guardrail_name(&self) -> &'static str {
        match self {
            Self::Pii => "Contains PII",
            Self::Moderation => "Moderation",
            Self::Jailbreak => "Jailbreak",
            Self::Hallucination => "Hallucination Detection",
            Self::Nsfw => "NSFW Text",
            Self::UrlFilter => "URL Filter",
            Self::CustomPromptCheck => "Custom Prompt Check",
            Self::PromptInjection => "Prompt Injection Detection",
        }
    }
}

/// Typed detail of one verdict. Unknown keys are kept in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VerdictInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymized_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub detected_entities: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flagged_categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hallucination_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hallucinated_statements: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verified_statements: Vec<String>,
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub check: SafetyCheck,
    pub triggered: bool,
    pub info: VerdictInfo,
}

impl VerdictRecord {
    pub fn pass(check: SafetyCheck) -> Self {
        Self { check, triggered: false, info: VerdictInfo::default() }
    }
}

/// Verdicts of one screening pass, in the order the classifier produced them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VerdictSet {
    records: Vec<VerdictRecord>,
}

impl VerdictSet {
    pub fn new(records: Vec<VerdictRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[VerdictRecord] {
        &self.records
    }

    pub fn get(&self, check: SafetyCheck) -> Option<&VerdictRecord> {
        self.records.iter().find(|record| record.check == check)
    }

    pub fn any_triggered(&self) -> bool {
        self.records.iter().any(|record| record.triggered)
    }

    fn triggered(&self, check: SafetyCheck) -> bool {
        self.get(check).map(|record| record.triggered).unwrap_or(false)
    }

    /// Sanitized text beats anonymized text; otherwise the fallback comes back unchanged.
    pub fn masked_text(&self, fallback: &str) -> String {
        self.records
            .iter()
            .find_map(|record| record.info.checked_text.clone())
            .or_else(|| self.records.iter().find_map(|record| record.info.anonymized_text.clone()))
            .unwrap_or_else(|| fallback.to_owned())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckFailure {
    pub failed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PiiFailure {
    pub failed: bool,
    pub detected_counts: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModerationFailure {
    pub failed: bool,
    pub flagged_categories: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HallucinationFailure {
    pub failed: bool,
    pub reasoning: Option<String>,
    pub hallucination_type: Option<String>,
    pub hallucinated_statements: Vec<String>,
    pub verified_statements: Vec<String>,
}

/// Per-check summary returned with a blocked result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockedDetail {
    pub pii: PiiFailure,
    pub moderation: ModerationFailure,
    pub jailbreak: CheckFailure,
    pub hallucination: HallucinationFailure,
    pub nsfw: CheckFailure,
    pub url_filter: CheckFailure,
    pub custom_prompt_check: CheckFailure,
    pub prompt_injection: CheckFailure,
}

impl BlockedDetail {
    pub fn from_verdicts(verdicts: &VerdictSet) -> Self {
        let pii = verdicts.get(SafetyCheck::Pii);
        let detected_counts: Vec<String> = pii
            .map(|record| {
                record
                    .info
                    .detected_entities
                    .iter()
                    .map(|(entity, matches)| format!("{entity}:{}", matches.len()))
                    .collect()
            })
            .unwrap_or_default();

        let flagged_categories = verdicts
            .get(SafetyCheck::Moderation)
            .map(|record| record.info.flagged_categories.clone())
            .unwrap_or_default();

        let hallucination = verdicts.get(SafetyCheck::Hallucination).map(|record| &record.info);

        Self {
            pii: PiiFailure {
                failed: !detected_counts.is_empty() || verdicts.triggered(SafetyCheck::Pii),
                detected_counts,
            },
            moderation: ModerationFailure {
                failed: verdicts.triggered(SafetyCheck::Moderation) || !flagged_categories.is_empty(),
                flagged_categories,
            },
            jailbreak: CheckFailure { failed: verdicts.triggered(SafetyCheck::Jailbreak) },
            hallucination: HallucinationFailure {
                failed: verdicts.triggered(SafetyCheck::Hallucination),
                reasoning: hallucination.and_then(|info| info.reasoning.clone()),
                hallucination_type: hallucination.and_then(|info| info.hallucination_type.clone()),
                hallucinated_statements: hallucination
                    .map(|info| info.hallucinated_statements.clone())
                    .unwrap_or_default(),
                verified_statements: hallucination
                    .map(|info| info.verified_statements.clone())
                    .unwrap_or_default(),
            },
            nsfw: CheckFailure { failed: verdicts.triggered(SafetyCheck::Nsfw) },
            url_filter: CheckFailure { failed: verdicts.triggered(SafetyCheck::UrlFilter) },
            custom_prompt_check: CheckFailure {
                failed: verdicts.triggered(SafetyCheck::CustomPromptCheck),
            },
            prompt_injection: CheckFailure {
                failed: verdicts.triggered(SafetyCheck::PromptInjection),
            },
        }
    }
}
