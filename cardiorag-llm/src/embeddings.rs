use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use cardiorag_core::{Embedding, EmbeddingError};

use crate::connection::{non_empty_secret, parse_base_url, Connection, HttpFailure};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl From<HttpFailure> for EmbeddingError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Timeout(limit) => EmbeddingError::Timeout(limit),
            HttpFailure::Status { status: 429, .. } => {
                EmbeddingError::RateLimited { retry_after: None }
            }
            HttpFailure::Decode(message) => EmbeddingError::InvalidResponse(message),
            other => EmbeddingError::Provider(other.to_string()),
        }
    }
}

/// `/v1/embeddings` client producing fixed-dimension vectors.
#[derive(Clone)]
pub struct OpenAiEmbeddings {
    connection: Connection,
    model: String,
    dimension: usize,
}

impl fmt::Debug for OpenAiEmbeddings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiEmbeddings")
            .field("base_url", &self.connection.base_url().as_str())
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbeddings {
    pub fn builder() -> OpenAiEmbeddingsBuilder {
        OpenAiEmbeddingsBuilder::default()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedding for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response: EmbeddingsResponse = self
            .connection
            .post_json(
                "v1/embeddings",
                &EmbeddingsRequest {
                    model: &self.model,
                    input: texts,
                },
            )
            .await?;

        if response.data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|datum| datum.index);
        data.into_iter()
            .map(|datum| {
                if datum.embedding.len() == self.dimension {
                    Ok(datum.embedding)
                } else {
                    Err(EmbeddingError::InvalidResponse(format!(
                        "expected dimension {}, got {}",
                        self.dimension,
                        datum.embedding.len()
                    )))
                }
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Default, Clone)]
pub struct OpenAiEmbeddingsBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    dimension: Option<usize>,
    timeout: Option<Duration>,
}

impl fmt::Debug for OpenAiEmbeddingsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };

        f.debug_struct("OpenAiEmbeddingsBuilder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("api_key", &api_key)
            .finish()
    }
}

impl OpenAiEmbeddingsBuilder {
    pub fn base_url(mut self, value: impl Into<String>) -> Self {
        self.base_url = Some(value.into());
        self
    }

    pub fn api_key(mut self, value: impl Into<String>) -> Self {
        self.api_key = Some(value.into());
        self
    }

    pub fn model(mut self, value: impl Into<String>) -> Self {
        self.model = Some(value.into());
        self
    }

    /// Vector width the index was built with; responses of another width are rejected.
    pub fn dimension(mut self, value: usize) -> Self {
        self.dimension = Some(value);
        self
    }

    pub fn timeout(mut self, value: Duration) -> Self {
        self.timeout = Some(value);
        self
    }

    pub fn build(self) -> Result<OpenAiEmbeddings, EmbeddingError> {
        let base_url = self
            .base_url
            .ok_or_else(|| EmbeddingError::Provider("base_url is required".to_string()))?;
        let base_url = parse_base_url(&base_url).map_err(EmbeddingError::Provider)?;
        let model = self
            .model
            .filter(|model| !model.trim().is_empty())
            .ok_or_else(|| EmbeddingError::Provider("model is required".to_string()))?;
        let dimension = match self.dimension {
            Some(0) | None => {
                return Err(EmbeddingError::Provider(
                    "dimension must be a positive integer".to_string(),
                ))
            }
            Some(dimension) => dimension,
        };

        let connection = Connection::new(
            base_url,
            self.api_key.and_then(non_empty_secret),
            self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        )
        .map_err(EmbeddingError::Provider)?;

        Ok(OpenAiEmbeddings {
            connection,
            model,
            dimension,
        })
    }
}
