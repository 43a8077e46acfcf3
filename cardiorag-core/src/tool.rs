use std::time::Duration;

use thiserror::Error;

/// Failure of a single tool invocation. The agent loop turns these into
/// observations instead of aborting the run.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
