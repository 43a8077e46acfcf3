use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use cardiorag_agent::{AgentConfig, DEFAULT_MAX_ITERATIONS};
use cardiorag_core::RetryPolicy;
use clap::{Args, Parser};

use crate::routes::HttpLimits;

/// Service configuration, read from flags or the environment after `.env`
/// has been loaded.
#[derive(Clone, Parser)]
#[command(name = "cardiorag-server", version, about = "HTTP front door for the CardioRAG agent")]
pub struct ServerConfig {
    #[arg(long, env = "CARDIORAG_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    #[command(flatten)]
    pub openai: OpenAiArgs,

    #[command(flatten)]
    pub neo4j: Neo4jArgs,

    #[command(flatten)]
    pub agent: AgentArgs,

    #[command(flatten)]
    pub http: HttpArgs,
}

#[derive(Clone, Args)]
pub struct OpenAiArgs {
    /// Provider root without the `/v1` suffix.
    #[arg(long = "openai-base-url", env = "OPENAI_BASE_URL", default_value = "https://api.openai.com")]
    pub base_url: String,

    #[arg(long = "openai-api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model used by the agent, the Cypher chain and the review chain.
    #[arg(long = "agent-model", env = "AGENT_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    #[arg(long = "embedding-model", env = "EMBEDDING_MODEL", default_value = "text-embedding-ada-002")]
    pub embedding_model: String,

    #[arg(long = "embedding-dimension", env = "EMBEDDING_DIMENSION", default_value_t = 1536)]
    pub embedding_dimension: usize,
}

#[derive(Clone, Args)]
pub struct Neo4jArgs {
    /// HTTP endpoint of the database, e.g. `http://localhost:7474`.
    #[arg(long = "neo4j-uri", env = "NEO4J_URI")]
    pub uri: String,

    #[arg(long = "neo4j-username", env = "NEO4J_USERNAME")]
    pub username: Option<String>,

    #[arg(long = "neo4j-password", env = "NEO4J_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long = "neo4j-database", env = "NEO4J_DATABASE", default_value = "neo4j")]
    pub database: String,

    #[arg(long = "vector-index", env = "CARDIORAG_VECTOR_INDEX", default_value = cardiorag_neo4j::DEFAULT_INDEX_NAME)]
    pub vector_index: String,

    /// Comma-separated node properties rendered into each retrieved record.
    #[arg(
        long = "text-properties",
        env = "CARDIORAG_TEXT_PROPERTIES",
        value_delimiter = ',',
        default_value = "Page Type Name,Full Text"
    )]
    pub text_properties: Vec<String>,

    /// Replaces the built-in graph schema.
    #[arg(long = "schema-path", env = "CARDIORAG_SCHEMA_PATH")]
    pub schema_path: Option<PathBuf>,

    #[arg(long = "query-timeout-secs", env = "CARDIORAG_QUERY_TIMEOUT_SECS", default_value_t = 30)]
    pub query_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct AgentArgs {
    #[arg(long, env = "CARDIORAG_TOP_K", default_value_t = cardiorag_retrieval::DEFAULT_TOP_K)]
    pub top_k: usize,

    #[arg(long, env = "CARDIORAG_MAX_ROWS", default_value_t = cardiorag_cypher::DEFAULT_MAX_ROWS)]
    pub max_rows: usize,

    #[arg(long, env = "CARDIORAG_MAX_ITERATIONS", default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: u32,

    /// Wall-clock ceiling for one run; unset means no limit.
    #[arg(long, env = "CARDIORAG_MAX_EXECUTION_SECS")]
    pub max_execution_secs: Option<u64>,

    #[arg(long, env = "CARDIORAG_LLM_TIMEOUT_SECS", default_value_t = 60)]
    pub llm_timeout_secs: u64,

    #[arg(long, env = "CARDIORAG_TOOL_TIMEOUT_SECS", default_value_t = 120)]
    pub tool_timeout_secs: u64,

    #[arg(long, env = "CARDIORAG_RETRY_ATTEMPTS", default_value_t = 10)]
    pub retry_attempts: usize,

    #[arg(long, env = "CARDIORAG_RETRY_DELAY_MS", default_value_t = 1000)]
    pub retry_delay_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct HttpArgs {
    #[arg(long, env = "CARDIORAG_REQUEST_TIMEOUT_SECS", default_value_t = 600)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "CARDIORAG_MAX_BODY_BYTES", default_value_t = 64 * 1024)]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn agent_config(&self) -> AgentConfig {
        let mut config = AgentConfig::default()
            .with_model(self.openai.model.clone())
            .with_max_iterations(self.agent.max_iterations)
            .with_llm_timeout(Duration::from_secs(self.agent.llm_timeout_secs))
            .with_tool_timeout(Duration::from_secs(self.agent.tool_timeout_secs));
        if let Some(secs) = self.agent.max_execution_secs {
            config = config.with_max_execution_time(Duration::from_secs(secs));
        }
        config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.agent.retry_attempts,
            Duration::from_millis(self.agent.retry_delay_ms),
        )
    }

    pub fn http_limits(&self) -> HttpLimits {
        HttpLimits {
            request_timeout: Duration::from_secs(self.http.request_timeout_secs),
            max_body_bytes: self.http.max_body_bytes,
        }
    }
}

fn redact(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<redacted>"
    } else {
        "<none>"
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("openai", &self.openai)
            .field("neo4j", &self.neo4j)
            .field("agent", &self.agent)
            .field("http", &self.http)
            .finish()
    }
}

impl fmt::Debug for OpenAiArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiArgs")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimension", &self.embedding_dimension)
            .finish()
    }
}

impl fmt::Debug for Neo4jArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jArgs")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("database", &self.database)
            .field("vector_index", &self.vector_index)
            .field("text_properties", &self.text_properties)
            .field("schema_path", &self.schema_path)
            .field("query_timeout_secs", &self.query_timeout_secs)
            .finish()
    }
}
