use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cardiorag_core::{with_timeout, CardioError, LlmRequest, ToolCallingLlm, Value};
use cardiorag_prompt::{ChatPromptTemplate, MessagePromptTemplate};

use crate::{guard, GraphSchema, GuardViolation, ReadOnlyQuery};

/// What the model is told to answer when no query fits the schema.
pub const NO_QUERY_SENTINEL: &str = "NO_QUERY";

const CYPHER_SYSTEM_TEMPLATE: &str = "You are a Neo4j developer translating user questions into \
Cypher to answer questions about cardiovascular disease social media data: entities, their \
social media accounts, domains, metrics, authors and posts.\n\
Rules:\n\
- Use only the node labels, relationship types and properties listed in the schema.\n\
- Write read-only queries. Never use CREATE, MERGE, DELETE, SET, REMOVE, DROP or LOAD CSV.\n\
- Wrap names containing spaces in backticks, for example p.`Full Text`.\n\
- Use case-insensitive matching for names, for example toLower(e.EntityName) CONTAINS 'mayo'.\n\
- Return only the columns needed to answer, with readable aliases.\n\
- Reply with the Cypher statement only, without explanations or code fences.\n\
- If the question cannot be answered from this schema, reply with exactly {{sentinel}}.\n\n\
Schema:\n{{schema}}\n\
Examples:\n{{examples}}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoQueryReason {
    /// The model replied with the sentinel.
    ModelDeclined,
    EmptyOutput,
    Rejected(GuardViolation),
}

impl fmt::Display for NoQueryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoQueryReason::ModelDeclined => write!(f, "the question does not map onto the graph schema"),
            NoQueryReason::EmptyOutput => write!(f, "no query was produced"),
            NoQueryReason::Rejected(violation) => write!(f, "the generated query was rejected: {violation}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesizedQuery {
    Query(ReadOnlyQuery),
    NoQuery { reason: NoQueryReason },
}

/// Builds a schema-aware prompt, asks the model for Cypher and admits the
/// reply only through [`guard::check`].
#[derive(Clone)]
pub struct CypherSynthesizer {
    llm: Arc<dyn ToolCallingLlm>,
    schema: Arc<GraphSchema>,
    prompt: ChatPromptTemplate,
    model: String,
    llm_timeout: Option<Duration>,
}

impl CypherSynthesizer {
    pub fn new(llm: Arc<dyn ToolCallingLlm>, schema: Arc<GraphSchema>) -> Self {
        Self {
            llm,
            schema,
            prompt: ChatPromptTemplate::new(vec![
                MessagePromptTemplate::system(CYPHER_SYSTEM_TEMPLATE),
                MessagePromptTemplate::human("{{question}}"),
            ]),
            model: String::new(),
            llm_timeout: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_llm_timeout(mut self, limit: Option<Duration>) -> Self {
        self.llm_timeout = limit;
        self
    }

    pub fn schema(&self) -> &GraphSchema {
        &self.schema
    }

    pub async fn synthesize(&self, question: &str) -> Result<SynthesizedQuery, CardioError> {
        let mut vars = HashMap::new();
        vars.insert("schema".to_string(), Value::from(self.schema.describe()));
        vars.insert("examples".to_string(), Value::from(self.schema.describe_examples()));
        vars.insert("sentinel".to_string(), Value::from(NO_QUERY_SENTINEL));
        vars.insert("question".to_string(), Value::from(question));

        let mut request = LlmRequest::chat(self.prompt.format_messages(&vars)?);
        request.model = self.model.clone();
        let response = with_timeout(self.llm_timeout, self.llm.invoke(request)).await?;

        let raw = guard::sanitize(&response.content);
        if raw.is_empty() {
            return Ok(SynthesizedQuery::NoQuery {
                reason: NoQueryReason::EmptyOutput,
            });
        }
        if raw.eq_ignore_ascii_case(NO_QUERY_SENTINEL) {
            tracing::info!("model declined to write a graph query");
            return Ok(SynthesizedQuery::NoQuery {
                reason: NoQueryReason::ModelDeclined,
            });
        }

        match guard::check(&raw, &self.schema) {
            Ok(query) => {
                tracing::info!(cypher = %query, "generated cypher");
                Ok(SynthesizedQuery::Query(query))
            }
            Err(violation) => {
                tracing::warn!(cypher = %raw, %violation, "generated cypher rejected");
                Ok(SynthesizedQuery::NoQuery {
                    reason: NoQueryReason::Rejected(violation),
                })
            }
        }
    }
}
