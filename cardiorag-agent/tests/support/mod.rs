#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cardiorag_agent::{
    AgentConfig, AgentExecutor, AgentTool, QuestionTool, ToolContext, ToolRegistry,
};
use cardiorag_core::{
    CardioError, LlmRequest, LlmResponse, ToolCall, ToolCallingLlm, ToolError,
};
use serde_json::json;

pub fn answer(text: &str) -> LlmResponse {
    LlmResponse {
        content: text.to_string(),
        tool_calls: vec![],
    }
}

pub fn call(id: &str, tool: &str, question: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: tool.to_string(),
        args: json!({ "question": question }),
    }
}

pub fn calls(calls: Vec<ToolCall>) -> LlmResponse {
    LlmResponse {
        content: String::new(),
        tool_calls: calls,
    }
}

enum Script {
    Queue(VecDeque<Result<LlmResponse, String>>),
    Always(LlmResponse),
    AlwaysFail(String),
}

pub struct ScriptedLlm {
    script: Mutex<Script>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<LlmResponse>) -> Arc<Self> {
        Self::with_script(Script::Queue(replies.into_iter().map(Ok).collect()))
    }

    pub fn with_results(replies: Vec<Result<LlmResponse, String>>) -> Arc<Self> {
        Self::with_script(Script::Queue(replies.into_iter().collect()))
    }

    pub fn always(reply: LlmResponse) -> Arc<Self> {
        Self::with_script(Script::Always(reply))
    }

    pub fn always_failing(message: &str) -> Arc<Self> {
        Self::with_script(Script::AlwaysFail(message.to_string()))
    }

    fn with_script(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ToolCallingLlm for ScriptedLlm {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, CardioError> {
        self.requests.lock().unwrap().push(request);
        let mut script = self.script.lock().unwrap();
        let next = match &mut *script {
            Script::Queue(queue) => queue
                .pop_front()
                .unwrap_or_else(|| Err("script exhausted".to_string())),
            Script::Always(reply) => Ok(reply.clone()),
            Script::AlwaysFail(message) => Err(message.clone()),
        };
        next.map_err(CardioError::LlmProvider)
    }
}

pub enum Behaviour {
    Reply(String),
    Fail(String),
    Sleep(Duration),
}

pub struct StubTool {
    behaviour: Behaviour,
    questions: Mutex<Vec<String>>,
    runs: AtomicUsize,
}

impl StubTool {
    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(Behaviour::Reply(text.to_string()))
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Self::new(Behaviour::Fail(reason.to_string()))
    }

    pub fn sleeping(duration: Duration) -> Arc<Self> {
        Self::new(Behaviour::Sleep(duration))
    }

    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            questions: Mutex::new(Vec::new()),
            runs: AtomicUsize::new(0),
        })
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionTool for StubTool {
    async fn run(&self, question: &str, _ctx: &ToolContext) -> Result<String, ToolError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.questions.lock().unwrap().push(question.to_string());
        match &self.behaviour {
            Behaviour::Reply(text) => Ok(text.clone()),
            Behaviour::Fail(reason) => Err(ToolError::ExecutionFailed(reason.clone())),
            Behaviour::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok("slept".to_string())
            }
        }
    }
}

pub fn registry(posts: Arc<StubTool>, graph: Arc<StubTool>) -> Arc<ToolRegistry> {
    Arc::new(
        ToolRegistry::builder()
            .register(AgentTool::SocialMediaPosts, posts)
            .register(AgentTool::GraphDatabase, graph)
            .build()
            .expect("both tools registered"),
    )
}

pub fn executor(
    llm: Arc<ScriptedLlm>,
    posts: Arc<StubTool>,
    graph: Arc<StubTool>,
    config: AgentConfig,
) -> AgentExecutor {
    AgentExecutor::new(llm, registry(posts, graph), config).expect("valid config")
}

pub const POSTS: &str = "explore_social_media_posts";
pub const GRAPH: &str = "explore_graph_database";
