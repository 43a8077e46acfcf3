use std::fmt;

use cardiorag_core::{Message, ToolCall, Value};
use serde::Serialize;

/// What the agent asked a tool to do in one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentAction {
    pub tool: String,
    pub tool_input: Value,
    pub call_id: String,
    pub log: String,
}

impl AgentAction {
    pub fn from_call(call: &ToolCall, thought: &str) -> Self {
        let mut log = format!("Invoking: `{}` with `{}`", call.name, call.args);
        if !thought.is_empty() {
            log.push_str("\nresponded: ");
            log.push_str(thought);
        }
        Self {
            tool: call.name.clone(),
            tool_input: call.args.clone(),
            call_id: call.id.clone(),
            log,
        }
    }
}

/// One (action, observation) pair of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScratchpadEntry {
    pub action: AgentAction,
    pub observation: String,
}

impl fmt::Display for ScratchpadEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(AgentAction(tool={:?}, tool_input={}, log={:?}), {:?})",
            self.action.tool, self.action.tool_input, self.action.log, self.observation
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Step(ScratchpadEntry),
    /// Corrective instruction sent after an unusable model reply.
    Reprompt(String),
}

/// Append-only record of one run, replayed into every reasoning call.
#[derive(Debug, Clone, Default)]
pub struct Scratchpad {
    items: Vec<Item>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_step(&mut self, entry: ScratchpadEntry) {
        self.items.push(Item::Step(entry));
    }

    pub fn push_reprompt(&mut self, instruction: impl Into<String>) {
        self.items.push(Item::Reprompt(instruction.into()));
    }

    pub fn steps(&self) -> impl Iterator<Item = &ScratchpadEntry> {
        self.items.iter().filter_map(|item| match item {
            Item::Step(entry) => Some(entry),
            Item::Reprompt(_) => None,
        })
    }

    pub fn into_steps(self) -> Vec<ScratchpadEntry> {
        self.items
            .into_iter()
            .filter_map(|item| match item {
                Item::Step(entry) => Some(entry),
                Item::Reprompt(_) => None,
            })
            .collect()
    }

    /// Each step becomes an assistant turn carrying exactly its own call,
    /// followed by the matching tool result.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.items.len() * 2);
        for item in &self.items {
            match item {
                Item::Step(entry) => {
                    let call = ToolCall {
                        id: entry.action.call_id.clone(),
                        name: entry.action.tool.clone(),
                        args: entry.action.tool_input.clone(),
                    };
                    messages.push(Message::assistant_tool_calls("", vec![call]));
                    messages.push(Message::tool_result(
                        entry.action.call_id.clone(),
                        entry.observation.clone(),
                    ));
                }
                Item::Reprompt(instruction) => messages.push(Message::user(instruction.clone())),
            }
        }
        messages
    }
}
