use cardiorag_core::{LlmResponse, ToolCall};

use crate::{AgentError, AgentTool};

/// A tool call chosen from one model turn. `tool` is `None` when the model
/// named a tool that does not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub call: ToolCall,
    pub tool: Option<AgentTool>,
    /// Text the model sent alongside the call, if any.
    pub thought: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelAction {
    FinalAnswer { content: String },
    ToolCall(ToolInvocation),
}

/// Turns one model response into the next action.
///
/// Only one tool runs per step. When several calls arrive, known tools beat
/// unknown names, the graph tool beats semantic search, and otherwise the
/// first emitted call wins.
pub fn validate_model_action(step_id: u32, response: LlmResponse) -> Result<ModelAction, AgentError> {
    let LlmResponse {
        content,
        tool_calls,
    } = response;

    if tool_calls.is_empty() {
        let answer = content.trim();
        if answer.is_empty() {
            return Err(AgentError::InvalidModelAction {
                step_id,
                reason: "reply contained neither an answer nor a tool call".to_string(),
                raw_response: content,
            });
        }
        return Ok(ModelAction::FinalAnswer {
            content: answer.to_string(),
        });
    }

    let total = tool_calls.len();
    let (_, chosen) = tool_calls
        .into_iter()
        .enumerate()
        .map(|(index, call)| {
            let tool = AgentTool::from_name(&call.name);
            let precedence = tool.map_or(u8::MAX, AgentTool::precedence);
            ((precedence, index), ToolInvocation {
                call,
                tool,
                thought: String::new(),
            })
        })
        .min_by_key(|(key, _)| *key)
        .ok_or_else(|| AgentError::InvalidModelAction {
            step_id,
            reason: "empty tool call list".to_string(),
            raw_response: content.clone(),
        })?;

    if total > 1 {
        tracing::warn!(
            step_id,
            requested = total,
            chosen = %chosen.call.name,
            "model requested several tools; running one"
        );
    }

    Ok(ModelAction::ToolCall(ToolInvocation {
        thought: content.trim().to_string(),
        ..chosen
    }))
}
