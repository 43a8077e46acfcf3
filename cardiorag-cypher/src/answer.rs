use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cardiorag_core::{with_timeout, CardioError, GroundingPolicy, LlmRequest, ToolCallingLlm, Value};
use cardiorag_prompt::{ChatPromptTemplate, MessagePromptTemplate};

use crate::{QueryOutcome, Row};

pub const DEFAULT_MAX_ROWS: usize = 50;

const ANSWER_SYSTEM_TEMPLATE: &str = "You turn graph database results into a short, natural answer. \
The information below is authoritative and complete; do not doubt it and do not correct it with \
your own knowledge. Use only this information. Never add names, numbers or facts that do not appear in it.\n\
Information:\n{{context}}";

/// Phrases executor rows as an answer to the original question.
#[derive(Clone)]
pub struct GraphAnswerSynthesizer {
    llm: Arc<dyn ToolCallingLlm>,
    prompt: ChatPromptTemplate,
    model: String,
    max_rows: usize,
    grounding: GroundingPolicy,
    dont_know: String,
    llm_timeout: Option<Duration>,
}

impl GraphAnswerSynthesizer {
    pub fn new(llm: Arc<dyn ToolCallingLlm>, dont_know: impl Into<String>) -> Self {
        Self {
            llm,
            prompt: ChatPromptTemplate::new(vec![
                MessagePromptTemplate::system(ANSWER_SYSTEM_TEMPLATE),
                MessagePromptTemplate::human("{{question}}"),
            ]),
            model: String::new(),
            max_rows: DEFAULT_MAX_ROWS,
            grounding: GroundingPolicy::default(),
            dont_know: dont_know.into(),
            llm_timeout: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows.max(1);
        self
    }

    pub fn with_grounding(mut self, grounding: GroundingPolicy) -> Self {
        self.grounding = grounding;
        self
    }

    pub fn with_llm_timeout(mut self, limit: Option<Duration>) -> Self {
        self.llm_timeout = limit;
        self
    }

    /// An empty result short-circuits to the don't-know answer without a
    /// model call. A failed or rejected query is an error, never "no data".
    pub async fn answer(&self, question: &str, outcome: &QueryOutcome) -> Result<String, CardioError> {
        let rows = match outcome {
            QueryOutcome::Empty { detail: None } => {
                tracing::debug!("no rows to answer from");
                return Ok(self.dont_know.clone());
            }
            QueryOutcome::Empty {
                detail: Some(detail),
            } => {
                return Err(CardioError::ToolCallFailed {
                    tool_name: "cypher".to_string(),
                    reason: detail.clone(),
                });
            }
            QueryOutcome::Rows(rows) => rows,
        };

        if rows.len() > self.max_rows {
            tracing::debug!(
                total = rows.len(),
                kept = self.max_rows,
                "truncating rows passed to answer synthesis"
            );
        }
        let context = render_rows(&rows[..rows.len().min(self.max_rows)])?;

        let mut vars = HashMap::new();
        vars.insert("context".to_string(), Value::from(context.as_str()));
        vars.insert("question".to_string(), Value::from(question));
        let mut request = LlmRequest::chat(self.prompt.format_messages(&vars)?);
        request.model = self.model.clone();

        let response = with_timeout(self.llm_timeout, self.llm.invoke(request)).await?;
        let answer = response.content.trim().to_string();
        if answer.is_empty() {
            return Ok(self.dont_know.clone());
        }
        Ok(self.grounding.apply(answer, &context, &self.dont_know))
    }
}

fn render_rows(rows: &[Row]) -> Result<String, CardioError> {
    let lines = rows
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}
