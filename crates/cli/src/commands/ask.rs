use std::sync::Arc;

use pedrabotnik_agent::tools::InviteAgentAction;
use pedrabotnik_agent::{AgentRuntime, WorkflowRun};
use pedrabotnik_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use pedrabotnik_core::contracts::ContractRegistry;
use pedrabotnik_core::domain::intent::IntentClassification;
use pedrabotnik_core::domain::workflow::{ClientRef, HandlerKind, WorkflowInput, WorkflowResult};
use pedrabotnik_core::flows::WorkflowState;
use pedrabotnik_core::knowledge::KnowledgeBase;
use serde::Serialize;

use super::CommandResult;

const COMMAND: &str = "ask";

#[derive(Debug, Serialize)]
struct AskOutput<'a> {
    correlation_id: &'a str,
    result: &'a WorkflowResult,
    handler: Option<HandlerKind>,
    classification: Option<&'a IntentClassification>,
    states: &'a [WorkflowState],
    actions: Vec<&'static str>,
}

impl<'a> AskOutput<'a> {
    fn from_run(run: &'a WorkflowRun) -> Self {
        Self {
            correlation_id: &run.correlation_id,
            result: &run.result,
            handler: run.trace.handler,
            classification: run.trace.classification.as_ref(),
            states: &run.trace.states,
            actions: run.trace.actions.iter().map(|action| action.name()).collect(),
        }
    }
}

/// One workflow invocation with the configured collaborators; the transport stays off.
pub fn run(text: &str, chat_id: Option<&str>) -> CommandResult {
    let options = LoadOptions {
        overrides: ConfigOverrides { telegram_enabled: Some(false), ..ConfigOverrides::default() },
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure(COMMAND, "config", error.to_string(), 2),
    };
    let knowledge = match KnowledgeBase::load(&config.knowledge) {
        Ok(knowledge) => knowledge,
        Err(error) => return CommandResult::failure(COMMAND, "knowledge", error.to_string(), 2),
    };
    let contracts = ContractRegistry::from_config(&config.knowledge);

    let runtime = match AgentRuntime::from_config(
        &config,
        Arc::new(knowledge),
        Arc::new(contracts),
        InviteAgentAction::logging_only(),
    ) {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::failure(COMMAND, "runtime_init", format!("{error:#}"), 1),
    };

    let executor = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(executor) => executor,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                1,
            );
        }
    };

    let mut input = WorkflowInput::new(text);
    if let Some(chat_id) = chat_id {
        input = input.with_client(ClientRef::new(chat_id, chat_id));
    }

    match executor.block_on(runtime.run_workflow(input)) {
        Ok(run) => CommandResult::json(COMMAND, &AskOutput::from_run(&run)),
        Err(error) => CommandResult::failure(COMMAND, "workflow", error.to_string(), 1),
    }
}

#[cfg(test)]
mod tests {
    use pedrabotnik_agent::persona::ActionRef;
    use pedrabotnik_agent::{WorkflowRun, WorkflowTrace};
    use pedrabotnik_core::domain::conversation::Transcript;
    use pedrabotnik_core::domain::workflow::{HandlerKind, WorkflowResult};
    use pedrabotnik_core::flows::WorkflowState;
    use serde_json::Value;

    use super::AskOutput;

    #[test]
    fn output_carries_reply_and_trace() {
        let run = WorkflowRun {
            result: WorkflowResult::reply("Пожалуйста, обратитесь к оператору."),
            transcript: Transcript::default(),
            trace: WorkflowTrace {
                states: vec![WorkflowState::Start, WorkflowState::Screening],
                classification: None,
                handler: Some(HandlerKind::ContractSupport),
                actions: vec![ActionRef::InviteAgent],
            },
            correlation_id: "req-1".to_owned(),
            input_text: "договор 1234".to_owned(),
        };

        let value: Value = serde_json::to_value(AskOutput::from_run(&run)).expect("json");

        assert_eq!(value["result"]["output_text"], "Пожалуйста, обратитесь к оператору.");
        assert_eq!(value["handler"], "contract_support");
        assert_eq!(value["states"][1], "Screening");
        assert_eq!(value["actions"][0], ActionRef::InviteAgent.name());
    }
}
