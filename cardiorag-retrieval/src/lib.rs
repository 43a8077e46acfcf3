mod base_retriever;
mod error;
mod hash_embedder;
mod in_memory;
mod qa;
mod retriever;

pub use base_retriever::BaseRetriever;
pub use error::{RetrievalError, RetrievalResult};
pub use hash_embedder::HashEmbedder;
pub use in_memory::InMemoryVectorStore;
pub use qa::{RetrievalQa, RetrievalQaConfig, DEFAULT_TOP_K};
pub use retriever::Retriever;
