use serde::{Deserialize, Serialize};

use crate::domain::intent::{IntentCategory, IntentClassification};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowState {
    Start,
    Screening,
    Blocked,
    Classifying,
    Clarifying,
    DispatchContract,
    DispatchCourse,
    DispatchInfo,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Blocked
                | Self::Clarifying
                | Self::DispatchContract
                | Self::DispatchCourse
                | Self::DispatchInfo
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowEvent {
    InputReceived,
    TripwireTriggered,
    ScreenPassed,
    ClarificationRequired,
    IntentResolved(IntentCategory),
}

impl WorkflowEvent {
    /// Classification outcome as an event; the clarification gate wins over the category.
    pub fn from_classification(classification: &IntentClassification) -> Self {
        if classification.requires_clarifier() {
            Self::ClarificationRequired
        } else {
            Self::IntentResolved(classification.category)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowAction {
    RunSafetyScreen,
    ReturnBlocked,
    RunIntentClassifier,
    RunClarifier,
    RunContractSupport,
    RunCourseSelector,
    RunInfoFaq,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub event: WorkflowEvent,
    pub actions: Vec<WorkflowAction>,
}
