use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use pedrabotnik_core::config::CheckConfig;
use pedrabotnik_core::domain::conversation::Transcript;
use pedrabotnik_core::domain::safety::{SafetyCheck, VerdictInfo, VerdictRecord};
use serde::Deserialize;

use super::pii::PiiMasker;
use super::{GuardrailPolicy, SafetyClassifier};
use crate::llm::LlmClient;
use crate::persona::PersonaConfig;

const DEFAULT_JAILBREAK_THRESHOLD: f64 = 0.7;

#[derive(Debug, Deserialize)]
struct JailbreakVerdict {
    flagged: bool,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Jailbreak detection through the inference provider, PII through [`PiiMasker`].
pub struct ModelSafetyClassifier {
    llm: Arc<dyn LlmClient>,
    default_model: String,
}

impl ModelSafetyClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, default_model: impl Into<String>) -> Self {
        Self { llm, default_model: default_model.into() }
    }

    async fn jailbreak(&self, text: &str, config: &CheckConfig) -> Result<VerdictRecord> {
        let model = config.model.clone().unwrap_or_else(|| self.default_model.clone());
        let persona = PersonaConfig::jailbreak_detector(model);
        let output = self.llm.run(&persona, &Transcript::seeded(Vec::new(), text)).await?;

        let value = output.structured.ok_or_else(|| anyhow!("jailbreak detector returned no verdict"))?;
        let verdict: JailbreakVerdict =
            serde_json::from_value(value).context("jailbreak verdict did not match its schema")?;

        let threshold = config.confidence_threshold.unwrap_or(DEFAULT_JAILBREAK_THRESHOLD);
        let confidence = verdict.confidence.clamp(0.0, 1.0);
        Ok(VerdictRecord {
            check: SafetyCheck::Jailbreak,
            triggered: verdict.flagged && confidence >= threshold,
            info: VerdictInfo {
                confidence: Some(confidence),
                reasoning: verdict.reasoning,
                ..Default::default()
            },
        })
    }

    fn pii(text: &str, config: &CheckConfig) -> VerdictRecord {
        let masked = PiiMasker::for_entities(&config.entities).mask(text);
        let found = masked.has_detections();
        VerdictRecord {
            check: SafetyCheck::Pii,
            triggered: config.block && found,
            info: VerdictInfo {
                anonymized_text: found.then_some(masked.text),
                detected_entities: masked.detected,
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl SafetyClassifier for ModelSafetyClassifier {
    async fn run_check(
        &self,
        text: &str,
        policy: &GuardrailPolicy,
        strict: bool,
    ) -> Result<Vec<VerdictRecord>> {
        let mut records = Vec::with_capacity(policy.checks.len());
        for config in &policy.checks {
            let record = match config.check {
                SafetyCheck::Jailbreak => self.jailbreak(text, config).await?,
                SafetyCheck::Pii => Self::pii(text, config),
                unsupported if strict => {
                    return Err(anyhow!(
                        "safety check `{}` is not supported by this classifier",
                        unsupported.guardrail_name()
                    ));
                }
                unsupported => VerdictRecord::pass(unsupported),
            };
            records.push(record);
        }
        Ok(records)
    }
}
