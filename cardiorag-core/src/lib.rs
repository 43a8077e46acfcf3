mod document;
mod embedding;
mod error;
pub mod grounding;
mod llm;
mod retry;
mod runnable;
mod timeout;
mod tool;
mod vector_store;

pub use document::Document;
pub use embedding::Embedding;
pub use error::{CardioError, EmbeddingError, StoreError};
pub use grounding::GroundingPolicy;
pub use llm::{LlmRequest, LlmResponse, Message, Role, ToolCall, ToolCallingLlm, ToolSpec};
pub use retry::{is_retryable, retry_with_delay, Backoff, RetryPolicy, Retrying};
pub use runnable::{Runnable, RunnableExt};
pub use timeout::with_timeout;
pub use tool::ToolError;
pub use vector_store::{SearchResult, VectorStore};

pub type Value = serde_json::Value;
