use std::marker::PhantomData;

use cardiorag_core::{CardioError, LlmResponse, ToolError};

use crate::phase::{Acting, Completed, Failed, Idle, Interrupted, Observing, Thinking};
use crate::validation::{validate_model_action, ModelAction, ToolInvocation};
use crate::{AgentAction, AgentError, AgentEvent, FailureReason, ScratchpadEntry};

/// External conditions sampled at every transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub cancelled: bool,
    pub out_of_time: bool,
}

/// The agent loop as a typestate machine. Each phase only exposes the
/// transitions that are legal from it; a runtime is consumed by every move.
pub struct AgentRuntime<Phase> {
    step_id: u32,
    remaining_budget: u32,
    max_iterations: u32,
    _phase: PhantomData<Phase>,
}

impl<Phase> std::fmt::Debug for AgentRuntime<Phase> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("phase", &std::any::type_name::<Phase>())
            .field("step_id", &self.step_id)
            .field("remaining_budget", &self.remaining_budget)
            .finish()
    }
}

#[derive(Debug)]
pub enum LoopTransition {
    Thinking(AgentRuntime<Thinking>),
    Acting(AgentRuntime<Acting>, ToolInvocation),
    Observing(AgentRuntime<Observing>, ScratchpadEntry),
    /// The model reply was unusable; the next step asks again.
    Reprompting(AgentRuntime<Observing>, String),
    Completed(AgentRuntime<Completed>, String),
    Failed(AgentRuntime<Failed>, FailureReason),
    Interrupted(AgentRuntime<Interrupted>),
}

pub type TransitionWithEvents = (LoopTransition, Vec<AgentEvent>);

impl<Phase> AgentRuntime<Phase> {
    /// Steps taken so far; the id of the current step while one is open.
    pub fn step_id(&self) -> u32 {
        self.step_id
    }

    pub fn remaining_budget(&self) -> u32 {
        self.remaining_budget
    }

    fn transition<NextPhase>(self) -> AgentRuntime<NextPhase> {
        AgentRuntime {
            step_id: self.step_id,
            remaining_budget: self.remaining_budget,
            max_iterations: self.max_iterations,
            _phase: PhantomData,
        }
    }

    fn interrupt(self) -> TransitionWithEvents {
        let step_id = self.step_id;
        (
            LoopTransition::Interrupted(self.transition()),
            vec![AgentEvent::Interrupted { step_id }],
        )
    }

    fn fail(self, reason: FailureReason) -> TransitionWithEvents {
        let step_id = self.step_id;
        (
            LoopTransition::Failed(self.transition(), reason.clone()),
            vec![AgentEvent::Failed { step_id, reason }],
        )
    }

    fn begin_step(self, signals: Signals) -> TransitionWithEvents {
        if signals.cancelled {
            return self.interrupt();
        }
        if signals.out_of_time {
            return self.fail(FailureReason::TimeLimit);
        }
        if self.remaining_budget == 0 {
            return self.fail(FailureReason::IterationLimit);
        }

        let mut thinking: AgentRuntime<Thinking> = self.transition();
        thinking.remaining_budget -= 1;
        thinking.step_id += 1;
        let step_id = thinking.step_id;
        (
            LoopTransition::Thinking(thinking),
            vec![AgentEvent::StepStarted { step_id }],
        )
    }
}

impl AgentRuntime<Idle> {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            step_id: 0,
            remaining_budget: max_iterations,
            max_iterations,
            _phase: PhantomData,
        }
    }

    pub fn start(self, signals: Signals) -> TransitionWithEvents {
        self.begin_step(signals)
    }
}

impl AgentRuntime<Thinking> {
    /// A cancelled run discards the response it was waiting for.
    pub fn on_model_response(
        self,
        signals: Signals,
        response: LlmResponse,
    ) -> Result<TransitionWithEvents, AgentError> {
        if signals.cancelled {
            return Ok(self.interrupt());
        }

        let step_id = self.step_id;
        let mut events = vec![AgentEvent::ModelResponded { step_id }];
        match validate_model_action(step_id, response) {
            Ok(ModelAction::FinalAnswer { content }) => {
                events.push(AgentEvent::Completed { step_id });
                Ok((LoopTransition::Completed(self.transition(), content), events))
            }
            Ok(ModelAction::ToolCall(invocation)) => {
                events.push(AgentEvent::ToolDispatched {
                    step_id,
                    tool: invocation.call.name.clone(),
                });
                Ok((LoopTransition::Acting(self.transition(), invocation), events))
            }
            Err(AgentError::InvalidModelAction { reason, .. }) => {
                events.push(AgentEvent::Reprompted {
                    step_id,
                    reason: reason.clone(),
                });
                Ok((LoopTransition::Reprompting(self.transition(), reason), events))
            }
            Err(other) => Err(other),
        }
    }

    pub fn on_model_error(self, error: CardioError) -> AgentError {
        AgentError::ModelTransport {
            step_id: self.step_id,
            source: error,
        }
    }
}

impl AgentRuntime<Acting> {
    /// Tool failures become the step's observation; they never end the run.
    pub fn on_tool_result(
        self,
        signals: Signals,
        invocation: &ToolInvocation,
        result: Result<String, ToolError>,
    ) -> TransitionWithEvents {
        let step_id = self.step_id;
        let tool = &invocation.call.name;

        if signals.cancelled {
            let (transition, events) = self.interrupt();
            let mut all = vec![AgentEvent::ToolFailed {
                step_id,
                reason: "run cancelled".to_string(),
            }];
            all.extend(events);
            return (transition, all);
        }

        let (observation, event) = match result {
            Ok(output) => (output, AgentEvent::ToolCompleted { step_id }),
            Err(error) => {
                let reason = error.to_string();
                (
                    format!("[TOOL ERROR] {tool}: {reason}"),
                    AgentEvent::ToolFailed { step_id, reason },
                )
            }
        };

        let entry = ScratchpadEntry {
            action: AgentAction::from_call(&invocation.call, &invocation.thought),
            observation,
        };
        (LoopTransition::Observing(self.transition(), entry), vec![event])
    }
}

impl AgentRuntime<Observing> {
    pub fn think(self, signals: Signals) -> TransitionWithEvents {
        self.begin_step(signals)
    }
}

impl AgentRuntime<Failed> {
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }
}
