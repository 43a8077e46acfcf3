use std::collections::{HashMap, HashSet};

use serde::Serialize;

/// Why a run ended in the failed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    IterationLimit,
    TimeLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    StepStarted { step_id: u32 },
    ModelResponded { step_id: u32 },
    Reprompted { step_id: u32, reason: String },
    ToolDispatched { step_id: u32, tool: String },
    ToolCompleted { step_id: u32 },
    ToolFailed { step_id: u32, reason: String },
    Completed { step_id: u32 },
    Failed { step_id: u32, reason: FailureReason },
    Interrupted { step_id: u32 },
}

impl AgentEvent {
    pub fn step_id(&self) -> u32 {
        match self {
            AgentEvent::StepStarted { step_id }
            | AgentEvent::ModelResponded { step_id }
            | AgentEvent::Reprompted { step_id, .. }
            | AgentEvent::ToolDispatched { step_id, .. }
            | AgentEvent::ToolCompleted { step_id }
            | AgentEvent::ToolFailed { step_id, .. }
            | AgentEvent::Completed { step_id }
            | AgentEvent::Failed { step_id, .. }
            | AgentEvent::Interrupted { step_id } => *step_id,
        }
    }

    fn closes_step(&self) -> bool {
        matches!(
            self,
            AgentEvent::ToolCompleted { .. }
                | AgentEvent::ToolFailed { .. }
                | AgentEvent::Reprompted { .. }
                | AgentEvent::Completed { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentEvent::Completed { .. } | AgentEvent::Failed { .. } | AgentEvent::Interrupted { .. }
        )
    }

    pub(crate) fn trace(&self) {
        match self {
            AgentEvent::ToolFailed { step_id, reason } => {
                tracing::warn!(step_id, %reason, "tool failed")
            }
            AgentEvent::Failed { step_id, reason } => {
                tracing::warn!(step_id, ?reason, "agent run failed")
            }
            AgentEvent::Interrupted { step_id } => tracing::info!(step_id, "agent run interrupted"),
            AgentEvent::ToolDispatched { step_id, tool } => {
                tracing::info!(step_id, %tool, "tool dispatched")
            }
            other => tracing::debug!(step_id = other.step_id(), event = ?other, "agent event"),
        }
    }
}

pub fn validate_step_started_precedes_terminal(events: &[AgentEvent]) -> Result<(), String> {
    let mut started: HashSet<u32> = HashSet::new();

    for (index, event) in events.iter().enumerate() {
        match event {
            AgentEvent::StepStarted { step_id } => {
                started.insert(*step_id);
            }
            _ if event.closes_step() => {
                let step_id = event.step_id();
                if !started.contains(&step_id) {
                    return Err(format!(
                        "step-closing event before StepStarted for step {step_id} at index {index}"
                    ));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

pub fn validate_tool_dispatch_cardinality(events: &[AgentEvent]) -> Result<(), String> {
    let mut outstanding_by_step: HashMap<u32, u32> = HashMap::new();
    let mut dispatched: HashSet<u32> = HashSet::new();

    for (index, event) in events.iter().enumerate() {
        match event {
            AgentEvent::ToolDispatched { step_id, .. } => {
                let outstanding = outstanding_by_step.entry(*step_id).or_insert(0);
                if !dispatched.insert(*step_id) {
                    return Err(format!(
                        "second dispatch in step {step_id} at index {index}"
                    ));
                }
                *outstanding += 1;
            }
            AgentEvent::ToolCompleted { step_id } | AgentEvent::ToolFailed { step_id, .. } => {
                let outstanding = outstanding_by_step.entry(*step_id).or_insert(0);
                if *outstanding == 0 {
                    return Err(format!(
                        "tool outcome without dispatch for step {step_id} at index {index}"
                    ));
                }
                *outstanding -= 1;
            }
            _ => {}
        }
    }

    for (step_id, outstanding) in outstanding_by_step {
        if outstanding != 0 {
            return Err(format!(
                "missing completion/failure counterpart for step {step_id}: {outstanding} dispatch(es) still open"
            ));
        }
    }

    Ok(())
}

/// Exactly one terminal event, and nothing after it.
pub fn validate_single_terminal(events: &[AgentEvent]) -> Result<(), String> {
    let terminals: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, event)| event.is_terminal())
        .map(|(index, _)| index)
        .collect();

    match terminals.as_slice() {
        [] => Err("run emitted no terminal event".to_string()),
        [index] if *index + 1 == events.len() => Ok(()),
        [index] => Err(format!("events recorded after terminal event at index {index}")),
        [first, second, ..] => Err(format!(
            "terminal event emitted more than once (first at index {first}, duplicate at index {second})"
        )),
    }
}
