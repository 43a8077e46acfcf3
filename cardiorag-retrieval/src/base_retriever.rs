use async_trait::async_trait;
use cardiorag_core::SearchResult;

use crate::error::RetrievalError;

/// Query-to-records lookup behind the semantic tool.
///
/// Results are ordered by descending relevance, with ties in a stable order,
/// so the same query against an unchanged index ranks identically.
#[async_trait]
pub trait BaseRetriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize)
        -> Result<Vec<SearchResult>, RetrievalError>;
}
