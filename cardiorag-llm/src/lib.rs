//! Clients for OpenAI-compatible chat completion and embedding endpoints.

mod connection;
mod embeddings;
pub mod openai_compatible;

pub use cardiorag_core::{LlmRequest, LlmResponse, Message, Role, ToolCall, ToolSpec};
pub use embeddings::{OpenAiEmbeddings, OpenAiEmbeddingsBuilder};
pub use openai_compatible::{
    ChatCompletionRequest, OpenAiCompatibleBuilder, OpenAiCompatibleClient,
};
