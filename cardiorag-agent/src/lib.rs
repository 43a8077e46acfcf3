//! The routing agent: a bounded reason, act, observe loop over two tools.

mod config;
mod error;
mod event;
mod executor;
pub mod phase;
mod registry;
mod runtime;
mod scratchpad;
mod tool;
pub mod tools;
mod validation;

pub use config::{AgentConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_STOPPED_ANSWER, DEFAULT_SYSTEM_PROMPT};
pub use error::AgentError;
pub use event::{
    validate_single_terminal, validate_step_started_precedes_terminal,
    validate_tool_dispatch_cardinality, AgentEvent, FailureReason,
};
pub use executor::{AgentExecutor, AgentOutput, RunStatus};
pub use phase::Idle;
pub use registry::{RegistryBuildError, ToolRegistry, ToolRegistryBuilder};
pub use runtime::{AgentRuntime, LoopTransition, Signals, TransitionWithEvents};
pub use scratchpad::{AgentAction, Scratchpad, ScratchpadEntry};
pub use tool::{AgentTool, CancellationToken, QuestionArgs, QuestionTool, ToolContext};
pub use validation::{validate_model_action, ModelAction, ToolInvocation};
