use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cardiorag_core::{with_timeout, GroundingPolicy, LlmRequest, SearchResult, ToolCallingLlm, Value};
use cardiorag_prompt::{ChatPromptTemplate, MessagePromptTemplate};

use crate::{BaseRetriever, RetrievalResult};

pub const DEFAULT_TOP_K: usize = 20;

const DOCUMENT_SEPARATOR: &str = "\n\n";

const REVIEW_SYSTEM_TEMPLATE: &str = "Your job is to use social media posts to answer questions about \
cardiovascular disease and the conversation around it. Answer as accurately and in as much detail \
as the context allows, but use only the context below. Do not add facts, names or figures that are \
not in the context. If the context does not answer the question, say that you don't know.\n\
{{context}}";

#[derive(Clone, Debug)]
pub struct RetrievalQaConfig {
    pub top_k: usize,
    /// Empty defers to the client's default model.
    pub model: String,
    pub grounding: GroundingPolicy,
    pub dont_know: String,
    pub llm_timeout: Option<Duration>,
}

impl Default for RetrievalQaConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            model: String::new(),
            grounding: GroundingPolicy::default(),
            dont_know: "I don't know. None of the retrieved social media posts answer this question."
                .to_string(),
            llm_timeout: None,
        }
    }
}

impl RetrievalQaConfig {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
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
}

/// "Stuff" question answering: every retrieved record goes into one prompt
/// and the model answers from that context alone.
#[derive(Clone)]
pub struct RetrievalQa {
    retriever: Arc<dyn BaseRetriever>,
    llm: Arc<dyn ToolCallingLlm>,
    prompt: ChatPromptTemplate,
    config: RetrievalQaConfig,
}

impl RetrievalQa {
    pub fn new(
        retriever: Arc<dyn BaseRetriever>,
        llm: Arc<dyn ToolCallingLlm>,
        config: RetrievalQaConfig,
    ) -> Self {
        Self {
            retriever,
            llm,
            prompt: ChatPromptTemplate::new(vec![
                MessagePromptTemplate::system(REVIEW_SYSTEM_TEMPLATE),
                MessagePromptTemplate::human("{{question}}"),
            ]),
            config,
        }
    }

    /// Replaces the answer prompt; it must use `{{context}}` and `{{question}}`.
    pub fn with_prompt(mut self, prompt: ChatPromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn config(&self) -> &RetrievalQaConfig {
        &self.config
    }

    pub async fn answer(&self, question: &str) -> RetrievalResult<String> {
        let results = self.retriever.retrieve(question, self.config.top_k).await?;
        if results.is_empty() {
            tracing::info!("no posts retrieved; answering with don't-know");
            return Ok(self.config.dont_know.clone());
        }

        let context = stuff_context(&results);
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), Value::from(context.as_str()));
        vars.insert("question".to_string(), Value::from(question));
        let messages = self.prompt.format_messages(&vars)?;

        let mut request = LlmRequest::chat(messages);
        request.model = self.config.model.clone();
        let response = with_timeout(self.config.llm_timeout, self.llm.invoke(request)).await?;

        let answer = response.content.trim().to_string();
        if answer.is_empty() {
            return Ok(self.config.dont_know.clone());
        }

        Ok(self
            .config
            .grounding
            .apply(answer, &context, &self.config.dont_know))
    }
}

fn stuff_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|result| result.document.content.as_str())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}
