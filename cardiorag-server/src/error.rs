//! Error responses for the HTTP boundary.
//!
//! Bodies are generic: the detailed cause goes to the log, never to the
//! caller.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cardiorag_core::CardioError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidInput,
    Cancelled,
    AgentFailed,
}

impl ErrorCode {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequest | ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::AgentFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request body rejected: {reason}")]
    Rejected { status: StatusCode, reason: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("agent failed: {0}")]
    Agent(CardioError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: ErrorCode,
    message: &'static str,
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::Rejected { .. } => ErrorCode::InvalidRequest,
            ApiError::InvalidInput(_) => ErrorCode::InvalidInput,
            ApiError::Cancelled => ErrorCode::Cancelled,
            ApiError::Agent(_) => ErrorCode::AgentFailed,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Rejected { status, .. } => *status,
            other => other.code().status_code(),
        }
    }

    fn public_message(&self) -> &'static str {
        match self.code() {
            ErrorCode::InvalidRequest => "Request body must be JSON of the form {\"text\": \"...\"}.",
            ErrorCode::InvalidInput => "The question must not be empty.",
            ErrorCode::Cancelled => "The request was cancelled before an answer was ready.",
            ErrorCode::AgentFailed => {
                "An error occurred while processing your message. Please try again or rephrase your message."
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            reason: rejection.body_text(),
        }
    }
}

impl From<CardioError> for ApiError {
    fn from(error: CardioError) -> Self {
        match error {
            CardioError::InvalidInput(reason) => ApiError::InvalidInput(reason),
            CardioError::Cancelled => ApiError::Cancelled,
            other => ApiError::Agent(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        } else {
            tracing::info!(error = %self, %status, "request rejected");
        }

        let body = ErrorBody {
            code: self.code(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
