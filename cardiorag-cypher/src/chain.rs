use std::sync::Arc;
use std::time::Duration;

use cardiorag_core::{CardioError, GroundingPolicy, ToolCallingLlm};

use crate::{
    CypherExecutor, CypherSynthesizer, GraphAnswerSynthesizer, GraphSchema, GraphStore,
    SynthesizedQuery, DEFAULT_MAX_ROWS,
};

#[derive(Clone, Debug)]
pub struct GraphQaConfig {
    /// Empty defers to the client's default model.
    pub model: String,
    pub max_rows: usize,
    pub grounding: GroundingPolicy,
    pub llm_timeout: Option<Duration>,
    pub query_timeout: Option<Duration>,
    pub dont_know: String,
    pub no_query: String,
}

impl Default for GraphQaConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_rows: DEFAULT_MAX_ROWS,
            grounding: GroundingPolicy::default(),
            llm_timeout: None,
            query_timeout: None,
            dont_know: "I don't know. The graph database has no data matching this question."
                .to_string(),
            no_query: "I could not derive an answer from the graph database".to_string(),
        }
    }
}

impl GraphQaConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_grounding(mut self, grounding: GroundingPolicy) -> Self {
        self.grounding = grounding;
        self
    }

    pub fn with_llm_timeout(mut self, limit: Duration) -> Self {
        self.llm_timeout = Some(limit);
        self
    }

    pub fn with_query_timeout(mut self, limit: Duration) -> Self {
        self.query_timeout = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphQaOutput {
    /// The executed query, if one was produced.
    pub query: Option<String>,
    pub row_count: usize,
    pub answer: String,
}

/// Question in, answer out over the graph: synthesize, execute, answer.
#[derive(Clone)]
pub struct GraphQaChain {
    synthesizer: CypherSynthesizer,
    executor: CypherExecutor,
    answerer: GraphAnswerSynthesizer,
    no_query: String,
}

impl GraphQaChain {
    pub fn new(
        llm: Arc<dyn ToolCallingLlm>,
        store: Arc<dyn GraphStore>,
        schema: Arc<GraphSchema>,
        config: GraphQaConfig,
    ) -> Self {
        let synthesizer = CypherSynthesizer::new(llm.clone(), schema.clone())
            .with_model(config.model.clone())
            .with_llm_timeout(config.llm_timeout);
        let mut executor = CypherExecutor::new(store, schema);
        if let Some(limit) = config.query_timeout {
            executor = executor.with_timeout(limit);
        }
        let answerer = GraphAnswerSynthesizer::new(llm, config.dont_know)
            .with_model(config.model)
            .with_max_rows(config.max_rows)
            .with_grounding(config.grounding)
            .with_llm_timeout(config.llm_timeout);

        Self {
            synthesizer,
            executor,
            answerer,
            no_query: config.no_query,
        }
    }

    pub async fn run(&self, question: &str) -> Result<GraphQaOutput, CardioError> {
        let query = match self.synthesizer.synthesize(question).await? {
            SynthesizedQuery::Query(query) => query,
            SynthesizedQuery::NoQuery { reason } => {
                return Ok(GraphQaOutput {
                    query: None,
                    row_count: 0,
                    answer: format!("{}: {reason}.", self.no_query),
                });
            }
        };

        let outcome = self.executor.execute(&query).await;
        let row_count = outcome.rows().len();
        let answer = self.answerer.answer(question, &outcome).await?;

        Ok(GraphQaOutput {
            query: Some(query.into_inner()),
            row_count,
            answer,
        })
    }
}
