use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use cardiorag_core::{ToolError, ToolSpec, Value};

use crate::{AgentTool, QuestionArgs, QuestionTool, ToolContext};

/// Immutable mapping from every [`AgentTool`] to its implementation.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<AgentTool, Arc<dyn QuestionTool>>,
    specs: Vec<ToolSpec>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().map(|tool| tool.name()).collect()
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub async fn dispatch(
        &self,
        tool: AgentTool,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let runner = self
            .tools
            .get(&tool)
            .ok_or_else(|| ToolError::ExecutionFailed(format!("{tool} is not registered")))?;
        let args = QuestionArgs::from_value(args)?;
        runner.run(&args.question, ctx).await
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: BTreeMap<AgentTool, Arc<dyn QuestionTool>>,
    duplicate: Option<AgentTool>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, tool: AgentTool, runner: Arc<dyn QuestionTool>) -> Self {
        if self.tools.insert(tool, runner).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(tool);
        }
        self
    }

    /// Fails unless every tool in [`AgentTool::ALL`] is registered exactly once.
    pub fn build(self) -> Result<ToolRegistry, RegistryBuildError> {
        if let Some(tool) = self.duplicate {
            return Err(RegistryBuildError::DuplicateTool(tool));
        }
        if let Some(missing) = AgentTool::ALL
            .into_iter()
            .find(|tool| !self.tools.contains_key(tool))
        {
            return Err(RegistryBuildError::MissingTool(missing));
        }

        // sorted by name so the request payload is stable
        let mut specs: Vec<ToolSpec> = self.tools.keys().map(|tool| tool.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ToolRegistry {
            tools: self.tools,
            specs,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryBuildError {
    MissingTool(AgentTool),
    DuplicateTool(AgentTool),
}

impl fmt::Display for RegistryBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryBuildError::MissingTool(tool) => write!(f, "tool {tool} is not registered"),
            RegistryBuildError::DuplicateTool(tool) => {
                write!(f, "tool {tool} is registered more than once")
            }
        }
    }
}

impl std::error::Error for RegistryBuildError {}
