use async_trait::async_trait;

use crate::EmbeddingError;

/// Turns text into the vectors stored in the post index.
///
/// Questions are embedded with the same model that embedded the posts, so
/// `dimension` must match the index the vectors are searched against.
#[async_trait]
pub trait Embedding: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds one text at a time unless the provider overrides it with a
    /// single batched request. Output order follows `texts`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedding for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.is_empty() {
                return Err(EmbeddingError::InvalidResponse("empty text".to_string()));
            }
            Ok(vec![text.len() as f32])
        }

        fn dimension(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn default_batch_keeps_input_order() {
        let texts = vec!["statins".to_string(), "ace".to_string()];

        let vectors = LengthEmbedder.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors, vec![vec![7.0], vec![3.0]]);
    }

    #[tokio::test]
    async fn default_batch_stops_at_the_first_failure() {
        let texts = vec!["ok".to_string(), String::new()];

        let err = LengthEmbedder.embed_batch(&texts).await.unwrap_err();

        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }
}
