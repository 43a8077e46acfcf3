use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use cardiorag_agent::{AgentExecutor, CancellationToken};
use cardiorag_core::RetryPolicy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::ApiError;

pub const AGENT_PATH: &str = "/cvd-rag-agent";

#[derive(Debug, Clone, Deserialize)]
pub struct QueryInput {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutput {
    pub input: String,
    pub output: String,
    pub intermediate_steps: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct HttpLimits {
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for HttpLimits {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(600),
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Shared by every request; the executor and its clients are read-only.
#[derive(Clone)]
pub struct AppState {
    agent: Arc<AgentExecutor>,
    retry: RetryPolicy,
}

impl AppState {
    pub fn new(agent: AgentExecutor, retry: RetryPolicy) -> Self {
        Self {
            agent: Arc::new(agent),
            retry,
        }
    }
}

pub fn router(state: AppState, limits: HttpLimits) -> Router {
    Router::new()
        .route("/", get(status))
        .route(AGENT_PATH, post(ask_agent))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(limits.max_body_bytes))
                .layer(TimeoutLayer::new(limits.request_timeout)),
        )
}

async fn status() -> Json<Value> {
    Json(json!({ "status": "running" }))
}

async fn ask_agent(
    State(state): State<AppState>,
    payload: Result<Json<QueryInput>, JsonRejection>,
) -> Result<Json<QueryOutput>, ApiError> {
    let Json(query) = payload?;

    // dropping the request future (client gone, timeout layer) cancels the run
    let cancellation = CancellationToken::new();
    let _cancel_on_drop = cancellation.clone().drop_guard();

    let output = state
        .agent
        .run_with_retry(&query.text, &state.retry, &cancellation)
        .await?;

    tracing::info!(
        status = ?output.status,
        steps = output.steps.len(),
        "answered question"
    );
    Ok(Json(QueryOutput {
        input: query.text,
        intermediate_steps: output.intermediate_steps(),
        output: output.output,
    }))
}
