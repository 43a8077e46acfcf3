use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use cardiorag_core::Value;

use crate::{guard, GraphSchema, ReadOnlyQuery};

/// One result record, keyed by column name.
pub type Row = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum GraphStoreError {
    #[error("graph store connection failed: {0}")]
    Connection(String),
    #[error("graph query failed [{code}]: {message}")]
    Query { code: String, message: String },
    #[error("graph query timed out after {0:?}")]
    Timeout(Duration),
    #[error("graph store returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Read-only access to the structured store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn execute(&self, query: &ReadOnlyQuery) -> Result<Vec<Row>, GraphStoreError>;
}

/// Result of running a query. Failures fold into `Empty` with a detail
/// message instead of reaching the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(Vec<Row>),
    Empty { detail: Option<String> },
}

impl QueryOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, QueryOutcome::Empty { .. })
    }

    pub fn rows(&self) -> &[Row] {
        match self {
            QueryOutcome::Rows(rows) => rows,
            QueryOutcome::Empty { .. } => &[],
        }
    }
}

#[derive(Clone)]
pub struct CypherExecutor {
    store: Arc<dyn GraphStore>,
    schema: Arc<GraphSchema>,
    timeout: Option<Duration>,
}

impl CypherExecutor {
    pub fn new(store: Arc<dyn GraphStore>, schema: Arc<GraphSchema>) -> Self {
        Self {
            store,
            schema,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub async fn execute(&self, query: &ReadOnlyQuery) -> QueryOutcome {
        // a ReadOnlyQuery may have been checked against another schema
        if let Err(violation) = guard::check(query.as_str(), &self.schema) {
            tracing::warn!(query = %query, %violation, "query rejected before execution");
            return QueryOutcome::Empty {
                detail: Some(format!("query rejected: {violation}")),
            };
        }

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.store.execute(query))
                .await
                .unwrap_or(Err(GraphStoreError::Timeout(limit))),
            None => self.store.execute(query).await,
        };

        match result {
            Ok(rows) if rows.is_empty() => {
                tracing::info!(query = %query, "graph query returned no rows");
                QueryOutcome::Empty { detail: None }
            }
            Ok(rows) => {
                tracing::debug!(query = %query, rows = rows.len(), "graph query returned rows");
                QueryOutcome::Rows(rows)
            }
            Err(err) => {
                tracing::warn!(query = %query, error = %err, "graph query failed");
                QueryOutcome::Empty {
                    detail: Some(err.to_string()),
                }
            }
        }
    }
}
