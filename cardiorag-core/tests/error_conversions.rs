use std::time::Duration;

use cardiorag_core::{CardioError, EmbeddingError, StoreError};

#[test]
fn embedding_error_converts_to_provider_failure() {
    let err: CardioError = EmbeddingError::InvalidResponse("short vector".to_string()).into();
    assert!(matches!(err, CardioError::LlmProvider(_)));
    assert!(err.to_string().contains("short vector"));
}

#[test]
fn embedding_timeout_stays_a_timeout() {
    let err: CardioError = EmbeddingError::Timeout(Duration::from_secs(3)).into();
    assert!(matches!(err, CardioError::Timeout(d) if d == Duration::from_secs(3)));
    assert!(cardiorag_core::is_retryable(&err));
}

#[test]
fn store_error_conversion_keeps_message() {
    let err: CardioError = StoreError::InvalidId("post-17".to_string()).into();
    assert!(err.to_string().contains("post-17"));
    assert!(!cardiorag_core::is_retryable(&err));
}

#[test]
fn question_mark_lifts_embedding_errors() {
    fn embed() -> Result<(), EmbeddingError> {
        Err(EmbeddingError::Provider("bad embed".to_string()))
    }

    fn answer() -> Result<(), CardioError> {
        embed()?;
        Ok(())
    }

    let err = answer().unwrap_err();
    assert!(err.to_string().contains("bad embed"));
}
