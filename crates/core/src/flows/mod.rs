pub mod engine;
pub mod states;

pub use engine::{ConsultationFlow, FlowDefinition, FlowEngine, WorkflowTransitionError};
pub use states::{TransitionOutcome, WorkflowAction, WorkflowEvent, WorkflowState};
