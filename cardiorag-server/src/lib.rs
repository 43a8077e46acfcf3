//! HTTP service exposing the CardioRAG agent.

pub mod bootstrap;
pub mod config;
mod error;
pub mod routes;

pub use config::ServerConfig;
pub use error::{ApiError, ErrorCode};
pub use routes::{router, AppState, HttpLimits, QueryInput, QueryOutput, AGENT_PATH};
