use std::collections::HashMap;

use async_trait::async_trait;
use cardiorag_core::{Document, SearchResult, StoreError, Value, VectorStore};
use cardiorag_cypher::Row;
use serde_json::json;

use crate::{Neo4jClient, Neo4jError};

pub const DEFAULT_INDEX_NAME: &str = "post_index";
pub const DEFAULT_TEXT_PROPERTIES: [&str; 2] = ["Page Type Name", "Full Text"];

/// Map projection keys cannot be parameters, so the embedding property is
/// spliced in as a quoted identifier and nulled out before it leaves the server.
fn query_nodes(embedding_property: &str) -> String {
    format!(
        "CALL db.index.vector.queryNodes($index, $k, $embedding) \
YIELD node, score \
RETURN elementId(node) AS id, score, \
[prop IN $text_properties | coalesce(toString(node[prop]), '')] AS texts, \
node {{.*, `{}`: null}} AS metadata \
ORDER BY score DESC, id ASC",
        embedding_property.replace('`', "``")
    )
}

/// Similarity search over an existing Neo4j vector index.
///
/// Each hit's content is the configured text properties rendered as
/// `"\n<property>: <value>"` lines; remaining node properties become
/// metadata, minus the embedding itself.
#[derive(Clone, Debug)]
pub struct Neo4jVectorIndex {
    client: Neo4jClient,
    index_name: String,
    text_properties: Vec<String>,
    embedding_property: String,
}

impl Neo4jVectorIndex {
    pub fn new(client: Neo4jClient) -> Self {
        Self {
            client,
            index_name: DEFAULT_INDEX_NAME.to_string(),
            text_properties: DEFAULT_TEXT_PROPERTIES.iter().map(|p| p.to_string()).collect(),
            embedding_property: "embedding".to_string(),
        }
    }

    pub fn with_index_name(mut self, name: impl Into<String>) -> Result<Self, Neo4jError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Neo4jError::EmptyIndexName);
        }
        self.index_name = name;
        Ok(self)
    }

    pub fn with_text_properties<I, S>(mut self, properties: I) -> Result<Self, Neo4jError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let properties: Vec<String> = properties
            .into_iter()
            .map(Into::into)
            .filter(|p| !p.trim().is_empty())
            .collect();
        if properties.is_empty() {
            return Err(Neo4jError::NoTextProperties);
        }
        self.text_properties = properties;
        Ok(self)
    }

    pub fn with_embedding_property(mut self, property: impl Into<String>) -> Self {
        self.embedding_property = property.into();
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn to_result(&self, mut row: Row) -> Result<SearchResult, Neo4jError> {
        let id = match row.remove("id") {
            Some(Value::String(id)) => id,
            other => {
                return Err(Neo4jError::InvalidResponse {
                    message: format!("vector hit has no string id: {other:?}"),
                })
            }
        };
        let score = row
            .remove("score")
            .and_then(|score| score.as_f64())
            .ok_or_else(|| Neo4jError::InvalidResponse {
                message: format!("vector hit '{id}' has no numeric score"),
            })? as f32;

        let texts = match row.remove("texts") {
            Some(Value::Array(texts)) => texts,
            _ => Vec::new(),
        };
        let content = self
            .text_properties
            .iter()
            .zip(texts)
            .map(|(prop, value)| match value {
                Value::String(text) => format!("\n{prop}: {text}"),
                other => format!("\n{prop}: {other}"),
            })
            .collect::<String>();

        let mut metadata: HashMap<String, Value> = match row.remove("metadata") {
            Some(Value::Object(map)) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        metadata.remove(&self.embedding_property);
        for prop in &self.text_properties {
            metadata.remove(prop);
        }

        Ok(SearchResult {
            document: Document {
                id,
                content,
                metadata,
                embedding: None,
            },
            score,
        })
    }
}

#[async_trait]
impl VectorStore for Neo4jVectorIndex {
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        if query_embedding.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let params = json!({
            "index": self.index_name,
            "k": top_k,
            "embedding": query_embedding,
            "text_properties": self.text_properties,
        });
        let statement = query_nodes(&self.embedding_property);
        let rows = self.client.run_read(&statement, &params).await?;

        let mut results = rows
            .into_iter()
            .map(|row| self.to_result(row))
            .collect::<Result<Vec<_>, _>>()?;

        results.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.document.id.cmp(&right.document.id))
        });
        results.truncate(top_k);
        tracing::debug!(index = %self.index_name, hits = results.len(), "vector index search");
        Ok(results)
    }
}
