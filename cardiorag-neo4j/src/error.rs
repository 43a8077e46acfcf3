use std::time::Duration;

use cardiorag_core::StoreError;
use cardiorag_cypher::GraphStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Neo4jError {
    #[error("invalid configuration: uri is required")]
    MissingUri,
    #[error("invalid configuration: {0}")]
    InvalidUri(String),
    #[error("invalid configuration: database cannot be empty")]
    EmptyDatabase,
    #[error("invalid configuration: vector index name cannot be empty")]
    EmptyIndexName,
    #[error("invalid configuration: at least one text property is required")]
    NoTextProperties,
    #[error("neo4j request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("neo4j request timed out after {0:?}")]
    Timeout(Duration),
    #[error("neo4j returned HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },
    #[error("cypher error [{code}]: {message}")]
    Cypher { code: String, message: String },
    #[error("invalid neo4j response: {message}")]
    InvalidResponse { message: String },
}

impl From<Neo4jError> for GraphStoreError {
    fn from(value: Neo4jError) -> Self {
        match value {
            Neo4jError::Timeout(limit) => GraphStoreError::Timeout(limit),
            Neo4jError::Cypher { code, message } => GraphStoreError::Query { code, message },
            Neo4jError::InvalidResponse { message } => GraphStoreError::InvalidResponse(message),
            other => GraphStoreError::Connection(other.to_string()),
        }
    }
}

impl From<Neo4jError> for StoreError {
    fn from(value: Neo4jError) -> Self {
        StoreError::Internal(Box::new(value))
    }
}
