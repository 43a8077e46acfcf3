use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use cardiorag_core::{ToolError, ToolSpec, Value};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
pub use tokio_util::sync::CancellationToken;

const SOCIAL_MEDIA_POSTS_DESCRIPTION: &str = "Useful for exploring social media posts about \
cardiovascular diseases: patient experiences, symptoms, treatments, opinions and public \
discussion of heart health. Uses semantic search over post text. Not suitable for counts, \
statistics or questions about specific entities and their metrics. Pass the user's entire \
question as input, for example \"What are common concerns about heart disease treatments?\".";

const GRAPH_DATABASE_DESCRIPTION: &str = "Useful for exploring a graph database of Entities \
(institutions or individuals in the cardiovascular disease social media landscape), their \
relationships, social media accounts, authors, posts, domains and performance metrics such as \
followers. Use it for factual, counting and ranking questions. Pass the user's entire question \
as input, for example \"Which Entity has the highest number of followers on its social media \
accounts?\".";

/// The closed set of tools the agent can route a question to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTool {
    SocialMediaPosts,
    GraphDatabase,
}

impl AgentTool {
    pub const ALL: [AgentTool; 2] = [AgentTool::SocialMediaPosts, AgentTool::GraphDatabase];

    pub fn name(self) -> &'static str {
        match self {
            AgentTool::SocialMediaPosts => "explore_social_media_posts",
            AgentTool::GraphDatabase => "explore_graph_database",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AgentTool::SocialMediaPosts => SOCIAL_MEDIA_POSTS_DESCRIPTION,
            AgentTool::GraphDatabase => GRAPH_DATABASE_DESCRIPTION,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Lower wins when the model asks for several tools in one turn.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            AgentTool::GraphDatabase => 0,
            AgentTool::SocialMediaPosts => 1,
        }
    }

    pub fn spec(self) -> ToolSpec {
        let schema = schemars::schema_for!(QuestionArgs);
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: serde_json::to_value(schema).unwrap_or_else(|_| {
                serde_json::json!({
                    "type": "object",
                    "properties": {"question": {"type": "string"}},
                    "required": ["question"]
                })
            }),
        }
    }
}

impl fmt::Display for AgentTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AgentTool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown tool '{s}'"))
    }
}

/// Arguments shared by every agent tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionArgs {
    /// The user's entire question, verbatim.
    pub question: String,
}

impl QuestionArgs {
    /// Accepts the object form `{"question": ...}` or a bare string, which
    /// some models send for single-argument tools.
    pub fn from_value(args: Value) -> Result<Self, ToolError> {
        let parsed = match args {
            Value::String(question) => QuestionArgs { question },
            other => serde_json::from_value(other)?,
        };
        if parsed.question.trim().is_empty() {
            return Err(ToolError::InvalidInput("question must not be empty".to_string()));
        }
        Ok(parsed)
    }
}

#[derive(Clone, Debug)]
pub struct ToolContext {
    pub run_id: String,
    pub step_id: u32,
    pub cancellation: CancellationToken,
}

/// A tool answers one natural-language question with text.
#[async_trait]
pub trait QuestionTool: Send + Sync {
    async fn run(&self, question: &str, ctx: &ToolContext) -> Result<String, ToolError>;
}
