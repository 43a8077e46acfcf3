use thiserror::Error;
use cardiorag_core::{CardioError, EmbeddingError, StoreError};

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("answer generation failed: {0}")]
    Generation(#[from] CardioError),
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;
