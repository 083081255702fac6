use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::intent::IntentCategory;
use crate::flows::states::{TransitionOutcome, WorkflowAction, WorkflowEvent, WorkflowState};

pub trait FlowDefinition {
    fn initial_state(&self) -> WorkflowState;
    fn transition(
        &self,
        current: &WorkflowState,
        event: &WorkflowEvent,
    ) -> Result<TransitionOutcome, WorkflowTransitionError>;
}

/// Screening, classification, then exactly one terminal handler.
#[derive(Clone, Debug, Default)]
pub struct ConsultationFlow;

impl FlowDefinition for ConsultationFlow {
    fn initial_state(&self) -> WorkflowState {
        WorkflowState::Start
    }

    fn transition(
        &self,
        current: &WorkflowState,
        event: &WorkflowEvent,
    ) -> Result<TransitionOutcome, WorkflowTransitionError> {
        transition_consultation(current, event)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> WorkflowState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &WorkflowState,
        event: &WorkflowEvent,
    ) -> Result<TransitionOutcome, WorkflowTransitionError> {
        self.flow.transition(current, event)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &WorkflowState,
        event: &WorkflowEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, WorkflowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.chat_id.clone(),
                        audit.correlation_id.clone(),
                        "workflow.transition_applied",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.chat_id.clone(),
                        audit.correlation_id.clone(),
                        "workflow.transition_rejected",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<ConsultationFlow> {
    fn default() -> Self {
        Self::new(ConsultationFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: WorkflowState, event: WorkflowEvent },
}

fn transition_consultation(
    current: &WorkflowState,
    event: &WorkflowEvent,
) -> Result<TransitionOutcome, WorkflowTransitionError> {
    use WorkflowAction::{
        ReturnBlocked, RunClarifier, RunContractSupport, RunCourseSelector, RunInfoFaq,
        RunIntentClassifier, RunSafetyScreen,
    };
    use WorkflowEvent::{
        ClarificationRequired, InputReceived, IntentResolved, ScreenPassed, TripwireTriggered,
    };
    use WorkflowState::{
        Blocked, Clarifying, Classifying, DispatchContract, DispatchCourse, DispatchInfo,
        Screening, Start,
    };

    let (to, actions) = match (current, event) {
        (Start, InputReceived) => (Screening, vec![RunSafetyScreen]),
        (Screening, TripwireTriggered) => (Blocked, vec![ReturnBlocked]),
        (Screening, ScreenPassed) => (Classifying, vec![RunIntentClassifier]),
        (Classifying, ClarificationRequired) => (Clarifying, vec![RunClarifier]),
        (Classifying, IntentResolved(IntentCategory::ContractSupport)) => {
            (DispatchContract, vec![RunContractSupport])
        }
        (Classifying, IntentResolved(IntentCategory::CourseSelection)) => {
            (DispatchCourse, vec![RunCourseSelector])
        }
        (Classifying, IntentResolved(_)) => (DispatchInfo, vec![RunInfoFaq]),
        _ => {
            return Err(WorkflowTransitionError::InvalidTransition {
                state: *current,
                event: *event,
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: *event, actions })
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::intent::{IntentCategory, IntentClassification};
    use crate::flows::engine::{FlowEngine, WorkflowTransitionError};
    use crate::flows::states::{WorkflowAction, WorkflowEvent, WorkflowState};

    fn classified(category: IntentCategory, confidence: f64) -> IntentClassification {
        IntentClassification {
            category,
            confidence,
            needs_clarification: false,
            clarification_question: String::new(),
            needs_contract_number: false,
        }
    }

    fn run_to_dispatch(classification: &IntentClassification) -> WorkflowState {
        let engine = FlowEngine::default();
        let mut state = engine.initial_state();
        for event in [
            WorkflowEvent::InputReceived,
            WorkflowEvent::ScreenPassed,
            WorkflowEvent::from_classification(classification),
        ] {
            state = engine.apply(&state, &event).expect("legal transition").to;
        }
        state
    }

    #[test]
    fn tripwire_stops_at_blocked() {
        let engine = FlowEngine::default();
        let screening = engine
            .apply(&WorkflowState::Start, &WorkflowEvent::InputReceived)
            .expect("start -> screening");
        assert_eq!(screening.actions, vec![WorkflowAction::RunSafetyScreen]);

        let blocked = engine
            .apply(&screening.to, &WorkflowEvent::TripwireTriggered)
            .expect("screening -> blocked");
        assert_eq!(blocked.to, WorkflowState::Blocked);
        assert!(blocked.to.is_terminal());
        assert!(engine.apply(&blocked.to, &WorkflowEvent::ScreenPassed).is_err());
    }

    #[test]
    fn each_category_reaches_exactly_one_handler() {
        for category in IntentCategory::ALL {
            let state = run_to_dispatch(&classified(category, 0.95));
            let expected = match category {
                IntentCategory::ContractSupport => WorkflowState::DispatchContract,
                IntentCategory::CourseSelection => WorkflowState::DispatchCourse,
                _ => WorkflowState::DispatchInfo,
            };
            assert_eq!(state, expected, "category {category}");
        }
    }

    #[test]
    fn clarification_gate_precedes_category_dispatch() {
        assert_eq!(
            run_to_dispatch(&classified(IntentCategory::ContractSupport, 0.59)),
            WorkflowState::Clarifying
        );
        assert_eq!(
            run_to_dispatch(&classified(IntentCategory::ContractSupport, 0.6)),
            WorkflowState::DispatchContract
        );

        let mut flagged = classified(IntentCategory::CourseSelection, 0.9);
        flagged.needs_clarification = true;
        assert_eq!(run_to_dispatch(&flagged), WorkflowState::Clarifying);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(&WorkflowState::Start, &WorkflowEvent::ScreenPassed)
            .expect_err("start cannot skip screening");

        assert_eq!(
            error,
            WorkflowTransitionError::InvalidTransition {
                state: WorkflowState::Start,
                event: WorkflowEvent::ScreenPassed,
            }
        );
    }

    #[test]
    fn flow_transition_emits_audit_event() {
        let engine = FlowEngine::default();
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new(Some("777".to_owned()), "req-42", "workflow");

        engine
            .apply_with_audit(&WorkflowState::Start, &WorkflowEvent::InputReceived, &sink, &audit)
            .expect("transition should succeed");
        let _ = engine.apply_with_audit(
            &WorkflowState::Blocked,
            &WorkflowEvent::InputReceived,
            &sink,
            &audit,
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].correlation_id, "req-42");
        assert_eq!(events[0].chat_id.as_deref(), Some("777"));
        assert_eq!(events[0].event_type, "workflow.transition_applied");
        assert_eq!(events[1].event_type, "workflow.transition_rejected");
    }
}
