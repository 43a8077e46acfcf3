use cardiorag_core::CardioError;

#[derive(Debug)]
pub enum AgentError {
    EmptyQuestion,
    /// The reasoning call failed or timed out. Retryable at the run level.
    ModelTransport {
        step_id: u32,
        source: CardioError,
    },
    InvalidModelAction {
        step_id: u32,
        reason: String,
        raw_response: String,
    },
    Prompt(CardioError),
    Cancelled {
        step_id: u32,
    },
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::EmptyQuestion => f.write_str("Question must not be empty"),
            AgentError::ModelTransport { step_id, source } => {
                write!(f, "Model call failed at step {step_id}: {source}")
            }
            AgentError::InvalidModelAction {
                step_id, reason, ..
            } => write!(f, "Invalid model action at step {step_id}: {reason}"),
            AgentError::Prompt(source) => write!(f, "Prompt construction failed: {source}"),
            AgentError::Cancelled { step_id } => write!(f, "Run cancelled at step {step_id}"),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgentError::ModelTransport { source, .. } | AgentError::Prompt(source) => Some(source),
            _ => None,
        }
    }
}

impl From<AgentError> for CardioError {
    fn from(error: AgentError) -> Self {
        match error {
            AgentError::EmptyQuestion => {
                CardioError::InvalidInput("question must not be empty".to_string())
            }
            // keep the transport error so the retry wrapper can classify it
            AgentError::ModelTransport { source, .. } => source,
            AgentError::InvalidModelAction {
                raw_response,
                reason,
                ..
            } => CardioError::ParseFailed {
                output: raw_response,
                reason,
            },
            AgentError::Prompt(source) => source,
            AgentError::Cancelled { .. } => CardioError::Cancelled,
        }
    }
}
