use thiserror::Error;

use crate::{domain::workflow::HandlerKind, flows::WorkflowTransitionError};

/// Reply sent to the user when an invocation fails for any reason.
pub const GENERIC_FAILURE_REPLY: &str = "Произошла ошибка. Попробуйте еще раз.";
/// Reply sent to the user when the workflow produced no text.
pub const EMPTY_REPLY: &str = "Извините, не удалось сформировать ответ.";

#[derive(Clone, Debug, Error, PartialEq)]
pub enum WorkflowError {
    #[error(transparent)]
    Transition(#[from] WorkflowTransitionError),
    #[error("safety screening failed: {0}")]
    Safety(String),
    #[error("inference failed in {handler}: {message}")]
    Inference { handler: HandlerKind, message: String },
    #[error("{handler} produced no output")]
    MissingOutput { handler: HandlerKind },
    #[error("{handler} produced invalid output: {message}")]
    InvalidOutput { handler: HandlerKind, message: String },
    #[error("knowledge source failure: {0}")]
    Knowledge(String),
}

impl WorkflowError {
    pub fn handler(&self) -> Option<HandlerKind> {
        match self {
            Self::Inference { handler, .. }
            | Self::MissingOutput { handler }
            | Self::InvalidOutput { handler, .. } => Some(*handler),
            Self::Transition(_) | Self::Safety(_) | Self::Knowledge(_) => None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Internal detail never reaches the user.
    pub fn user_message(&self) -> &'static str {
        GENERIC_FAILURE_REPLY
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::ServiceUnavailable { correlation_id, .. }
            | Self::Timeout { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    pub fn timeout(seconds: u64, correlation_id: impl Into<String>) -> Self {
        Self::Timeout { seconds, correlation_id: correlation_id.into() }
    }
}

impl WorkflowError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Timeout { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<WorkflowError> for InterfaceError {
    fn from(value: WorkflowError) -> Self {
        let message = value.to_string();
        match value {
            WorkflowError::Safety(_) | WorkflowError::Inference { .. } => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            WorkflowError::Transition(_)
            | WorkflowError::MissingOutput { .. }
            | WorkflowError::InvalidOutput { .. }
            | WorkflowError::Knowledge(_) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
