//! Workflow orchestration: screen, classify, then exactly one terminal handler.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use pedrabotnik_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink,
};
use pedrabotnik_core::config::AppConfig;
use pedrabotnik_core::contracts::ContractRegistry;
use pedrabotnik_core::domain::conversation::{ConversationTurn, Transcript};
use pedrabotnik_core::domain::intent::IntentClassification;
use pedrabotnik_core::domain::safety::BlockedDetail;
use pedrabotnik_core::domain::workflow::{HandlerKind, WorkflowInput, WorkflowResult};
use pedrabotnik_core::errors::WorkflowError;
use pedrabotnik_core::flows::{
    ConsultationFlow, FlowEngine, TransitionOutcome, WorkflowAction, WorkflowEvent, WorkflowState,
    WorkflowTransitionError,
};
use pedrabotnik_core::knowledge::KnowledgeSource;
use tracing::{info, warn};

use crate::conversation::ClassificationRules;
use crate::guardrails::{extract_masked_text, GuardrailPolicy, ModelSafetyClassifier, SafetyScreen};
use crate::handlers::{
    ClarifierHandler, ContractSupportHandler, CourseSelectorHandler, HandlerReply,
    InfoFaqHandler, IntentClassifierHandler,
};
use crate::llm::LlmClient;
use crate::openai::OpenAiClient;
use crate::persona::{ActionRef, PersonaSet};
use crate::tools::{ActionRegistry, InviteAgentAction};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkflowTrace {
    /// States visited, starting with `Start`.
    pub states: Vec<WorkflowState>,
    pub classification: Option<IntentClassification>,
    pub handler: Option<HandlerKind>,
    pub actions: Vec<ActionRef>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowRun {
    pub result: WorkflowResult,
    pub transcript: Transcript,
    pub trace: WorkflowTrace,
    pub correlation_id: String,
    /// The user text after the PII scrub.
    pub input_text: String,
}

impl WorkflowRun {
    /// Turns worth keeping in the chat history: the user text and the reply.
    pub fn exchange(&self) -> Vec<ConversationTurn> {
        match &self.result {
            WorkflowResult::Reply { output_text } => vec![
                ConversationTurn::user(self.input_text.clone()),
                ConversationTurn::assistant(output_text.clone()),
            ],
            WorkflowResult::Blocked { .. } => Vec::new(),
        }
    }
}

/// Seam between transports and the orchestrator.
#[async_trait]
pub trait ConsultationWorkflow: Send + Sync {
    async fn run(&self, input: WorkflowInput) -> Result<WorkflowRun, WorkflowError>;
}

/// Forwards audit events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            event_name = %event.event_type,
            category = ?event.category,
            outcome = ?event.outcome,
            correlation_id = %event.correlation_id,
            chat_id = event.chat_id.as_deref().unwrap_or("-"),
            metadata = ?event.metadata,
            "audit"
        );
    }
}

pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    screen: SafetyScreen,
    knowledge: Arc<dyn KnowledgeSource>,
    actions: Arc<ActionRegistry>,
    classifier: IntentClassifierHandler,
    clarifier: ClarifierHandler,
    info_faq: InfoFaqHandler,
    course_selector: CourseSelectorHandler,
    contract_support: ContractSupportHandler,
    engine: FlowEngine<ConsultationFlow>,
    audit: Arc<dyn AuditSink>,
}

struct Progress<'a> {
    state: WorkflowState,
    trace: WorkflowTrace,
    audit: &'a AuditContext,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        screen: SafetyScreen,
        knowledge: Arc<dyn KnowledgeSource>,
        actions: Arc<ActionRegistry>,
        personas: PersonaSet,
    ) -> Self {
        let rules = ClassificationRules::new(knowledge.focus_vocabulary());
        Self {
            llm,
            screen,
            knowledge,
            actions,
            classifier: IntentClassifierHandler::new(personas.intent_classifier, rules),
            clarifier: ClarifierHandler::new(personas.clarifier),
            info_faq: InfoFaqHandler::new(personas.info_faq),
            course_selector: CourseSelectorHandler::new(personas.course_selector),
            contract_support: ContractSupportHandler::new(personas.contract_support),
            engine: FlowEngine::default(),
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// Runtime backed by the configured inference provider.
    pub fn from_config(
        config: &AppConfig,
        knowledge: Arc<dyn KnowledgeSource>,
        contracts: Arc<ContractRegistry>,
        handoff: InviteAgentAction,
    ) -> Result<Self> {
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::from_config(&config.llm)?);
        let classifier = ModelSafetyClassifier::new(llm.clone(), config.safety.jailbreak_model.clone());
        let screen = SafetyScreen::new(
            Arc::new(classifier),
            GuardrailPolicy::from_config(&config.safety),
            config.safety.strict,
        );
        let actions = Arc::new(ActionRegistry::standard(contracts, handoff));

        Ok(Self::new(llm, screen, knowledge, actions, PersonaSet::for_model(&config.llm.model)))
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    fn step(&self, progress: &mut Progress<'_>, event: WorkflowEvent) -> Result<TransitionOutcome, WorkflowError> {
        let outcome =
            self.engine.apply_with_audit(&progress.state, &event, self.audit.as_ref(), progress.audit)?;
        progress.state = outcome.to;
        progress.trace.states.push(outcome.to);
        Ok(outcome)
    }

    fn emit(&self, context: &AuditContext, event_type: &str, category: AuditCategory, outcome: AuditOutcome) {
        self.audit.emit(AuditEvent::in_context(context, event_type, category, outcome));
    }

    pub async fn run_workflow(&self, input: WorkflowInput) -> Result<WorkflowRun, WorkflowError> {
        let chat_id = Some(input.client.chat_id.clone()).filter(|id| !id.trim().is_empty());
        let audit = AuditContext::for_invocation(chat_id, "workflow");

        let result = self.run_in_context(input, &audit).await;
        if let Err(error) = &result {
            warn!(
                event_name = "workflow.failed",
                correlation_id = %audit.correlation_id,
                handler = error.handler().map(|handler| handler.as_str()).unwrap_or("-"),
                error = %error,
                "workflow invocation failed"
            );
            self.audit.emit(
                AuditEvent::in_context(&audit, "workflow.failed", AuditCategory::System, AuditOutcome::Failed)
                    .with_metadata("error", error.to_string()),
            );
        }
        result
    }

    async fn run_in_context(
        &self,
        input: WorkflowInput,
        audit: &AuditContext,
    ) -> Result<WorkflowRun, WorkflowError> {
        let initial = self.engine.initial_state();
        let mut progress = Progress {
            state: initial,
            trace: WorkflowTrace { states: vec![initial], ..WorkflowTrace::default() },
            audit,
        };
        self.step(&mut progress, WorkflowEvent::InputReceived)?;

        let transcript = Transcript::seeded(input.prior_turns.clone(), &input.input_as_text);
        let screened = self.screen.screen_and_scrub(transcript, input).await?;

        if screened.tripwire_triggered() {
            self.step(&mut progress, WorkflowEvent::TripwireTriggered)?;
            self.emit(audit, "safety.tripwire_triggered", AuditCategory::Safety, AuditOutcome::Rejected);
            warn!(
                event_name = "workflow.blocked",
                correlation_id = %audit.correlation_id,
                "input blocked by the safety screen"
            );
            let result = WorkflowResult::Blocked {
                safe_text: extract_masked_text(&screened.verdicts, &screened.input.input_as_text),
                verdict_detail: BlockedDetail::from_verdicts(&screened.verdicts),
            };
            return Ok(WorkflowRun {
                result,
                transcript: screened.transcript,
                trace: progress.trace,
                correlation_id: audit.correlation_id.clone(),
                input_text: screened.input.input_as_text,
            });
        }

        self.step(&mut progress, WorkflowEvent::ScreenPassed)?;
        let mut transcript = screened.transcript;
        let input = screened.input;

        let classified = self.classifier.classify(self.llm.as_ref(), &transcript).await?;
        transcript.append(classified.new_turns);
        let classification = classified.classification;
        self.audit.emit(
            AuditEvent::in_context(
                audit,
                "classification.resolved",
                AuditCategory::Classification,
                AuditOutcome::Success,
            )
            .with_metadata("category", classification.category.as_str())
            .with_metadata("confidence", format!("{:.2}", classification.confidence)),
        );
        progress.trace.classification = Some(classification.clone());

        let event = WorkflowEvent::from_classification(&classification);
        let dispatch = self.step(&mut progress, event)?;

        let reply = match dispatch.actions.as_slice() {
            [WorkflowAction::RunClarifier] => {
                self.clarifier.respond(self.llm.as_ref(), &transcript, &classification).await?
            }
            [WorkflowAction::RunContractSupport] => {
                self.contract_support
                    .respond(self.llm.as_ref(), &transcript, &self.actions, &input.client)
                    .await?
            }
            [WorkflowAction::RunCourseSelector] => {
                self.course_selector
                    .respond(
                        self.llm.as_ref(),
                        &transcript,
                        self.knowledge.as_ref(),
                        &self.actions,
                        &input.client,
                    )
                    .await?
            }
            [WorkflowAction::RunInfoFaq] => {
                let with_category = transcript
                    .with_context_turn(ConversationTurn::assistant(classification.category.as_str()));
                self.info_faq
                    .respond(
                        self.llm.as_ref(),
                        &with_category,
                        self.knowledge.as_ref(),
                        &self.actions,
                        &input.client,
                    )
                    .await?
            }
            _ => {
                return Err(WorkflowTransitionError::InvalidTransition { state: dispatch.from, event }.into());
            }
        };

        self.finish(reply, transcript, progress, input.input_as_text)
    }

    fn finish(
        &self,
        reply: HandlerReply,
        mut transcript: Transcript,
        mut progress: Progress<'_>,
        input_text: String,
    ) -> Result<WorkflowRun, WorkflowError> {
        if reply.output_text.trim().is_empty() {
            return Err(WorkflowError::MissingOutput { handler: reply.handler });
        }

        for outcome in &reply.actions {
            self.audit.emit(
                AuditEvent::in_context(progress.audit, "action.invoked", AuditCategory::Action, AuditOutcome::Success)
                    .with_metadata("action", outcome.action.name())
                    .with_metadata("handler", reply.handler.as_str()),
            );
            progress.trace.actions.push(outcome.action);
        }
        progress.trace.handler = Some(reply.handler);
        transcript.append(reply.new_turns);

        info!(
            event_name = "workflow.completed",
            correlation_id = %progress.audit.correlation_id,
            handler = %reply.handler,
            state = ?progress.state,
            turns = transcript.len(),
            "workflow produced a reply"
        );

        Ok(WorkflowRun {
            result: WorkflowResult::reply(reply.output_text),
            transcript,
            trace: progress.trace,
            correlation_id: progress.audit.correlation_id.clone(),
            input_text,
        })
    }
}

#[async_trait]
impl ConsultationWorkflow for AgentRuntime {
    async fn run(&self, input: WorkflowInput) -> Result<WorkflowRun, WorkflowError> {
        self.run_workflow(input).await
    }
}
