//! Agent runtime: the consultation workflow behind the chat transports.
//!
//! One invocation runs a strictly sequential pipeline:
//! 1. **Safety screen** (`guardrails`) - tripwire checks plus the optional PII scrub
//! 2. **Intent classification** (`handlers::classifier`) - structured model output,
//!    made routing-safe by `conversation::ClassificationRules`
//! 3. **One terminal handler** - clarifier, info FAQ, course selector or contract support
//!
//! # Key Types
//!
//! - `AgentRuntime` - orchestrator (see `runtime` module)
//! - `LlmClient` - pluggable inference seam, `OpenAiClient` for OpenAI-compatible APIs
//! - `ActionRegistry` - handoff and contract lookup, gated by each persona's allow-list
//!
//! The model never decides contract data or course catalogs. Those come from
//! the knowledge sources and actions only.

pub mod conversation;
pub mod guardrails;
pub mod handlers;
pub mod llm;
pub mod openai;
pub mod persona;
pub mod runtime;
pub mod tools;

pub use runtime::{AgentRuntime, ConsultationWorkflow, WorkflowRun, WorkflowTrace};
