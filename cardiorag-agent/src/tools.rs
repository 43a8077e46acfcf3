//! Adapters exposing the retrieval and graph chains as agent tools.

use async_trait::async_trait;
use cardiorag_core::ToolError;
use cardiorag_cypher::GraphQaChain;
use cardiorag_retrieval::RetrievalQa;

use crate::{QuestionTool, ToolContext};

pub struct SocialMediaPostsTool {
    qa: RetrievalQa,
}

impl SocialMediaPostsTool {
    pub fn new(qa: RetrievalQa) -> Self {
        Self { qa }
    }
}

#[async_trait]
impl QuestionTool for SocialMediaPostsTool {
    async fn run(&self, question: &str, ctx: &ToolContext) -> Result<String, ToolError> {
        tracing::debug!(run_id = %ctx.run_id, step_id = ctx.step_id, "semantic search over posts");
        self.qa
            .answer(question)
            .await
            .map_err(|err| ToolError::ExecutionFailed(err.to_string()))
    }
}

pub struct GraphDatabaseTool {
    chain: GraphQaChain,
}

impl GraphDatabaseTool {
    pub fn new(chain: GraphQaChain) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl QuestionTool for GraphDatabaseTool {
    async fn run(&self, question: &str, ctx: &ToolContext) -> Result<String, ToolError> {
        let output = self
            .chain
            .run(question)
            .await
            .map_err(|err| ToolError::ExecutionFailed(err.to_string()))?;
        tracing::debug!(
            run_id = %ctx.run_id,
            step_id = ctx.step_id,
            query = output.query.as_deref().unwrap_or("<none>"),
            rows = output.row_count,
            "graph tool answered"
        );
        Ok(output.answer)
    }
}
