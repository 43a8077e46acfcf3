use async_trait::async_trait;
use cardiorag_core::Value;
use cardiorag_cypher::{GraphStore, GraphStoreError, ReadOnlyQuery, Row};

use crate::Neo4jClient;

/// [`GraphStore`] backed by Neo4j. Statements always run in READ access
/// mode, so the server refuses writes even if one slipped past the guard.
#[derive(Clone, Debug)]
pub struct Neo4jGraphStore {
    client: Neo4jClient,
}

impl Neo4jGraphStore {
    pub fn new(client: Neo4jClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Neo4jClient {
        &self.client
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn execute(&self, query: &ReadOnlyQuery) -> Result<Vec<Row>, GraphStoreError> {
        let params = Value::Object(Default::default());
        let rows = self.client.run_read(query.as_str(), &params).await?;
        tracing::debug!(rows = rows.len(), database = self.client.database(), "neo4j query done");
        Ok(rows)
    }
}
