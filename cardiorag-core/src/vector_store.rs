use async_trait::async_trait;

use crate::{Document, StoreError};

#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
}

/// Read side of a vector similarity index.
///
/// Implementations return at most `top_k` results ordered by descending score.
/// Equal scores must come back in a stable order (insertion order or record
/// id) so that a fixed index state always yields the same ranking.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>, StoreError>;
}
