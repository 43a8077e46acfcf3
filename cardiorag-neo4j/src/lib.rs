//! Neo4j adapters for cardiorag: a read-only graph store and a vector index,
//! both speaking the HTTP transactional endpoint.

mod config;
mod error;
mod store;
mod vector;

use std::fmt;
use std::time::Duration;

pub use config::Neo4jStoreBuilder;
pub use error::Neo4jError;
pub use store::Neo4jGraphStore;
pub use vector::{Neo4jVectorIndex, DEFAULT_INDEX_NAME, DEFAULT_TEXT_PROPERTIES};

use cardiorag_core::Value;
use cardiorag_cypher::Row;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

/// Connection shared by [`Neo4jGraphStore`] and [`Neo4jVectorIndex`].
#[derive(Clone)]
pub struct Neo4jClient {
    http: reqwest::Client,
    base_url: Url,
    database: String,
    user: Option<String>,
    password: Option<SecretString>,
    timeout: Duration,
}

impl fmt::Debug for Neo4jClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };

        f.debug_struct("Neo4jClient")
            .field("base_url", &self.base_url.as_str())
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &password)
            .finish()
    }
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    statements: [Statement<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Statement<'a> {
    statement: &'a str,
    parameters: &'a Value,
    result_data_contents: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<ServerError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<RecordData>,
}

#[derive(Debug, Deserialize)]
struct RecordData {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ServerError {
    code: String,
    message: String,
}

impl Neo4jClient {
    pub fn builder() -> Neo4jStoreBuilder {
        Neo4jStoreBuilder::new()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Runs one statement in an auto-committed READ transaction and returns
    /// its records keyed by column.
    pub async fn run_read(&self, statement: &str, parameters: &Value) -> Result<Vec<Row>, Neo4jError> {
        let body = CommitRequest {
            statements: [Statement {
                statement,
                parameters,
                result_data_contents: ["row"],
            }],
        };

        let mut request = self
            .http
            .post(self.endpoint())
            .header("access-mode", "READ")
            .json(&body);
        if let Some(user) = &self.user {
            request = request.basic_auth(
                user,
                self.password.as_ref().map(|password| password.expose_secret()),
            );
        }

        let response: CommitResponse = self.send_and_decode(request).await?;
        if let Some(error) = response.errors.into_iter().next() {
            return Err(Neo4jError::Cypher {
                code: error.code,
                message: error.message,
            });
        }

        let result = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| Neo4jError::InvalidResponse {
                message: "response carried no statement result".to_string(),
            })?;
        into_rows(result)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.base_url.as_str().trim_end_matches('/'),
            self.database
        )
    }

    async fn send_and_decode<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, Neo4jError> {
        let response = request.send().await.map_err(|err| self.request_error(err))?;
        let status = response.status();
        let body = response.text().await.map_err(|err| self.request_error(err))?;

        if !status.is_success() {
            return Err(Neo4jError::HttpStatus {
                status: status.as_u16(),
                message: neo4j_error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|err| Neo4jError::InvalidResponse {
            message: format!("failed to decode neo4j response body: {err}"),
        })
    }

    fn request_error(&self, err: reqwest::Error) -> Neo4jError {
        if err.is_timeout() {
            Neo4jError::Timeout(self.timeout)
        } else {
            Neo4jError::Request(err)
        }
    }
}

fn into_rows(result: StatementResult) -> Result<Vec<Row>, Neo4jError> {
    let columns = result.columns;
    result
        .data
        .into_iter()
        .map(|record| {
            if record.row.len() != columns.len() {
                return Err(Neo4jError::InvalidResponse {
                    message: format!(
                        "record has {} values for {} columns",
                        record.row.len(),
                        columns.len()
                    ),
                });
            }
            Ok(columns.iter().cloned().zip(record.row).collect())
        })
        .collect()
}

fn neo4j_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "unknown neo4j error".to_string();
    }

    serde_json::from_str::<CommitResponse>(trimmed)
        .ok()
        .and_then(|envelope| envelope.errors.into_iter().next())
        .map(|error| format!("{}: {}", error.code, error.message))
        .unwrap_or_else(|| trimmed.to_string())
}
