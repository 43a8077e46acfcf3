use std::time::Duration;

use cardiorag_core::CardioError;

pub const DEFAULT_MAX_ITERATIONS: u32 = 15;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful chatbot that answers questions about \
patient experiences, patients' pains and gains and anything else in the conversation around \
cardiovascular diseases, based on social media posts. You can also answer questions about a \
graph database of entities related to cardiovascular diseases, their relationships, social \
media accounts and performance metrics.\n\
Use explore_graph_database for questions about specific entities, accounts, domains, metrics, \
counts and rankings. Use explore_social_media_posts for questions about opinions, experiences, \
symptoms and treatments. Call one tool at a time and answer only from tool results.";

pub const DEFAULT_STOPPED_ANSWER: &str =
    "Agent stopped due to iteration limit or time limit. I could not determine an answer to this question.";

#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Empty defers to the client's default model.
    pub model: String,
    pub max_iterations: u32,
    pub max_execution_time: Option<Duration>,
    pub llm_timeout: Option<Duration>,
    pub tool_timeout: Option<Duration>,
    pub system_prompt: String,
    /// Output of a run that hit a ceiling.
    pub stopped_answer: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_execution_time: None,
            llm_timeout: None,
            tool_timeout: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            stopped_answer: DEFAULT_STOPPED_ANSWER.to_string(),
        }
    }
}

impl AgentConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_execution_time(mut self, limit: Duration) -> Self {
        self.max_execution_time = Some(limit);
        self
    }

    pub fn with_llm_timeout(mut self, limit: Duration) -> Self {
        self.llm_timeout = Some(limit);
        self
    }

    pub fn with_tool_timeout(mut self, limit: Duration) -> Self {
        self.tool_timeout = Some(limit);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn validate(&self) -> Result<(), CardioError> {
        if self.max_iterations == 0 {
            return Err(CardioError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.max_execution_time.is_some_and(|limit| limit.is_zero()) {
            return Err(CardioError::InvalidConfig(
                "max_execution_time must be positive".to_string(),
            ));
        }
        if self.stopped_answer.trim().is_empty() {
            return Err(CardioError::InvalidConfig(
                "stopped_answer must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
