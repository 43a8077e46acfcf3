//! Wires the clients, chains and tools into one [`AgentExecutor`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cardiorag_agent::tools::{GraphDatabaseTool, SocialMediaPostsTool};
use cardiorag_agent::{AgentExecutor, AgentTool, ToolRegistry};
use cardiorag_core::ToolCallingLlm;
use cardiorag_cypher::{GraphQaChain, GraphQaConfig, GraphSchema};
use cardiorag_llm::{OpenAiCompatibleClient, OpenAiEmbeddings};
use cardiorag_neo4j::{Neo4jClient, Neo4jGraphStore, Neo4jVectorIndex};
use cardiorag_retrieval::{RetrievalQa, RetrievalQaConfig, Retriever};

use crate::ServerConfig;

pub fn load_schema(path: Option<&Path>) -> anyhow::Result<GraphSchema> {
    let Some(path) = path else {
        return Ok(GraphSchema::cardiovascular());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading graph schema from {}", path.display()))?;
    let schema = GraphSchema::from_json(&raw)
        .with_context(|| format!("parsing graph schema from {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        labels = schema.nodes.len(),
        relationships = schema.relationships.len(),
        "loaded graph schema"
    );
    Ok(schema)
}

pub fn build_agent(config: &ServerConfig) -> anyhow::Result<AgentExecutor> {
    let llm_timeout = Duration::from_secs(config.agent.llm_timeout_secs);

    let mut chat = OpenAiCompatibleClient::builder()
        .base_url(&config.openai.base_url)
        .context("invalid OpenAI base URL")?
        .default_model(config.openai.model.clone())
        .temperature(0.0)
        .timeout(llm_timeout);
    if let Some(key) = &config.openai.api_key {
        chat = chat.api_key(key.clone());
    }
    let llm: Arc<dyn ToolCallingLlm> = Arc::new(chat.build().context("building chat client")?);

    let mut embeddings = OpenAiEmbeddings::builder()
        .base_url(config.openai.base_url.clone())
        .model(config.openai.embedding_model.clone())
        .dimension(config.openai.embedding_dimension)
        .timeout(llm_timeout);
    if let Some(key) = &config.openai.api_key {
        embeddings = embeddings.api_key(key.clone());
    }
    let embeddings = embeddings.build().context("building embeddings client")?;

    let neo4j = connect_neo4j(config)?;
    let index = Neo4jVectorIndex::new(neo4j.clone())
        .with_index_name(config.neo4j.vector_index.clone())?
        .with_text_properties(config.neo4j.text_properties.clone())?;

    let reviews = RetrievalQa::new(
        Arc::new(Retriever::new(embeddings, index)),
        llm.clone(),
        RetrievalQaConfig::default()
            .with_top_k(config.agent.top_k)
            .with_llm_timeout(llm_timeout),
    );

    let schema = Arc::new(load_schema(config.neo4j.schema_path.as_deref())?);
    let graph = GraphQaChain::new(
        llm.clone(),
        Arc::new(Neo4jGraphStore::new(neo4j)),
        schema,
        GraphQaConfig::default()
            .with_max_rows(config.agent.max_rows)
            .with_llm_timeout(llm_timeout)
            .with_query_timeout(Duration::from_secs(config.neo4j.query_timeout_secs)),
    );

    let registry = ToolRegistry::builder()
        .register(
            AgentTool::SocialMediaPosts,
            Arc::new(SocialMediaPostsTool::new(reviews)),
        )
        .register(AgentTool::GraphDatabase, Arc::new(GraphDatabaseTool::new(graph)))
        .build()?;

    let agent = AgentExecutor::new(llm, Arc::new(registry), config.agent_config())
        .context("invalid agent configuration")?;
    tracing::info!(
        model = %config.openai.model,
        tools = ?agent.registry().names(),
        max_iterations = agent.config().max_iterations,
        "agent ready"
    );
    Ok(agent)
}

fn connect_neo4j(config: &ServerConfig) -> anyhow::Result<Neo4jClient> {
    let mut builder = Neo4jClient::builder()
        .uri(config.neo4j.uri.clone())
        .database(config.neo4j.database.clone())
        .timeout(Duration::from_secs(config.neo4j.query_timeout_secs));
    if let Some(user) = &config.neo4j.username {
        builder = builder.user(user.clone());
    }
    if let Some(password) = &config.neo4j.password {
        builder = builder.password(password.clone());
    }
    let client = builder.build().context("configuring Neo4j client")?;
    tracing::info!(
        base_url = %client.base_url(),
        database = client.database(),
        "neo4j client configured"
    );
    Ok(client)
}
