use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cardiorag_core::{
    retry_with_delay, with_timeout, CardioError, LlmRequest, RetryPolicy, Runnable, ToolCallingLlm,
    ToolError, Value,
};
use cardiorag_prompt::{ChatPromptTemplate, MessagePromptTemplate};
use serde::Serialize;
use tokio::time::Instant;
use tracing::Instrument;

use crate::validation::ToolInvocation;
use crate::{
    AgentConfig, AgentError, AgentEvent, AgentRuntime, CancellationToken, FailureReason,
    LoopTransition, Scratchpad, ScratchpadEntry, Signals, ToolContext, ToolRegistry,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RunStatus {
    Done,
    Failed(FailureReason),
}

/// Result of one run: the answer plus the audit trail that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutput {
    pub input: String,
    pub output: String,
    pub status: RunStatus,
    pub steps: Vec<ScratchpadEntry>,
    pub events: Vec<AgentEvent>,
}

impl AgentOutput {
    /// Steps rendered as strings, in the order the tools ran.
    pub fn intermediate_steps(&self) -> Vec<String> {
        self.steps.iter().map(ToString::to_string).collect()
    }
}

/// Drives the reason, act, observe loop over a [`ToolRegistry`].
#[derive(Clone)]
pub struct AgentExecutor {
    llm: Arc<dyn ToolCallingLlm>,
    registry: Arc<ToolRegistry>,
    prompt: ChatPromptTemplate,
    config: AgentConfig,
}

impl std::fmt::Debug for AgentExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentExecutor")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AgentExecutor {
    pub fn new(
        llm: Arc<dyn ToolCallingLlm>,
        registry: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Result<Self, CardioError> {
        config.validate()?;
        let prompt = ChatPromptTemplate::new(vec![
            MessagePromptTemplate::system(&config.system_prompt),
            MessagePromptTemplate::human("{{input}}"),
            MessagePromptTemplate::placeholder("agent_scratchpad"),
        ]);
        Ok(Self {
            llm,
            registry,
            prompt,
            config,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn run(
        &self,
        question: &str,
        cancellation: &CancellationToken,
    ) -> Result<AgentOutput, AgentError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::EmptyQuestion);
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("agent_run", run_id = %run_id);
        self.run_loop(question, &run_id, cancellation)
            .instrument(span)
            .await
    }

    /// [`run`](Self::run) under `policy`; each attempt starts from an empty
    /// scratchpad.
    pub async fn run_with_retry(
        &self,
        question: &str,
        policy: &RetryPolicy,
        cancellation: &CancellationToken,
    ) -> Result<AgentOutput, CardioError> {
        retry_with_delay(policy, |attempt| async move {
            tracing::debug!(attempt, "starting agent run");
            self.run(question, cancellation)
                .await
                .map_err(CardioError::from)
        })
        .await
    }

    async fn run_loop(
        &self,
        question: &str,
        run_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<AgentOutput, AgentError> {
        let started = Instant::now();
        let signals = || Signals {
            cancelled: cancellation.is_cancelled(),
            out_of_time: self
                .config
                .max_execution_time
                .is_some_and(|limit| started.elapsed() >= limit),
        };

        let mut scratchpad = Scratchpad::new();
        let mut events = Vec::new();
        let (mut transition, initial) = AgentRuntime::new(self.config.max_iterations).start(signals());
        record(&mut events, initial);

        loop {
            transition = match transition {
                LoopTransition::Thinking(runtime) => {
                    let request = self.build_request(question, &scratchpad)?;
                    let response =
                        match with_timeout(self.config.llm_timeout, self.llm.invoke(request)).await {
                            Ok(response) => response,
                            Err(error) => return Err(runtime.on_model_error(error)),
                        };
                    let (next, stepped) = runtime.on_model_response(signals(), response)?;
                    record(&mut events, stepped);
                    next
                }
                LoopTransition::Acting(runtime, invocation) => {
                    let ctx = ToolContext {
                        run_id: run_id.to_string(),
                        step_id: runtime.step_id(),
                        cancellation: cancellation.clone(),
                    };
                    let result = self.dispatch(&invocation, &ctx).await;
                    let (next, stepped) = runtime.on_tool_result(signals(), &invocation, result);
                    record(&mut events, stepped);
                    next
                }
                LoopTransition::Observing(runtime, entry) => {
                    scratchpad.push_step(entry);
                    let (next, stepped) = runtime.think(signals());
                    record(&mut events, stepped);
                    next
                }
                LoopTransition::Reprompting(runtime, reason) => {
                    scratchpad.push_reprompt(format!(
                        "Your previous reply could not be used ({reason}). Answer the question \
                         directly or call one of these tools: {}.",
                        self.registry.names().join(", ")
                    ));
                    let (next, stepped) = runtime.think(signals());
                    record(&mut events, stepped);
                    next
                }
                LoopTransition::Completed(runtime, answer) => {
                    tracing::info!(steps = runtime.step_id(), "agent run completed");
                    return Ok(AgentOutput {
                        input: question.to_string(),
                        output: answer,
                        status: RunStatus::Done,
                        steps: scratchpad.into_steps(),
                        events,
                    });
                }
                LoopTransition::Failed(runtime, reason) => {
                    tracing::warn!(
                        steps = runtime.step_id(),
                        max_iterations = runtime.max_iterations(),
                        ?reason,
                        "agent run stopped before reaching an answer"
                    );
                    return Ok(AgentOutput {
                        input: question.to_string(),
                        output: self.config.stopped_answer.clone(),
                        status: RunStatus::Failed(reason),
                        steps: scratchpad.into_steps(),
                        events,
                    });
                }
                LoopTransition::Interrupted(runtime) => {
                    return Err(AgentError::Cancelled {
                        step_id: runtime.step_id(),
                    });
                }
            };
        }
    }

    fn build_request(&self, question: &str, scratchpad: &Scratchpad) -> Result<LlmRequest, AgentError> {
        let history = serde_json::to_value(scratchpad.to_messages())
            .map_err(|err| AgentError::Prompt(err.into()))?;
        let mut vars = HashMap::new();
        vars.insert("input".to_string(), Value::from(question));
        vars.insert("agent_scratchpad".to_string(), history);

        let messages = self
            .prompt
            .format_messages(&vars)
            .map_err(AgentError::Prompt)?;
        Ok(LlmRequest {
            model: self.config.model.clone(),
            messages,
            tools: self.registry.specs().to_vec(),
        })
    }

    async fn dispatch(&self, invocation: &ToolInvocation, ctx: &ToolContext) -> Result<String, ToolError> {
        let Some(tool) = invocation.tool else {
            return Err(ToolError::InvalidInput(format!(
                "unknown tool, use one of: {}",
                self.registry.names().join(", ")
            )));
        };

        let call = self.registry.dispatch(tool, invocation.call.args.clone(), ctx);
        match self.config.tool_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(ToolError::Timeout(limit))),
            None => call.await,
        }
    }
}

fn record(log: &mut Vec<AgentEvent>, events: Vec<AgentEvent>) {
    for event in &events {
        event.trace();
    }
    log.extend(events);
}

#[async_trait]
impl Runnable<String, AgentOutput> for AgentExecutor {
    async fn invoke(&self, input: String) -> Result<AgentOutput, CardioError> {
        self.run(&input, &CancellationToken::new())
            .await
            .map_err(CardioError::from)
    }
}
