//! Generic OpenAI-compatible chat completion client.
//!
//! Works against any provider that speaks the `/v1/chat/completions` wire format
//! with function-style tool calls (OpenAI, Azure-style proxies, vLLM, LM Studio).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use cardiorag_core::{
    CardioError, LlmRequest, LlmResponse, Message, Role, ToolCall, ToolCallingLlm, ToolSpec, Value,
};

use crate::connection::{non_empty_secret, parse_base_url, Connection, HttpFailure};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Request body for the chat completions endpoint.
#[derive(Serialize, Debug, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: WireFunctionCall,
}

/// `arguments` is a JSON document encoded as a string on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct WireTool {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: WireFunction,
}

#[derive(Serialize, Debug, Clone)]
pub struct WireFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Non-streaming response from chat completions.
#[derive(Deserialize, Debug, Clone)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Choice {
    pub message: WireMessage,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

fn function_type() -> String {
    "function".to_string()
}

fn to_wire_message(message: Message) -> Result<WireMessage, CardioError> {
    let tool_calls = if message.tool_calls.is_empty() {
        None
    } else {
        Some(
            message
                .tool_calls
                .into_iter()
                .map(|call| {
                    Ok(WireToolCall {
                        id: call.id,
                        call_type: function_type(),
                        function: WireFunctionCall {
                            name: call.name,
                            arguments: serde_json::to_string(&call.args)?,
                        },
                    })
                })
                .collect::<Result<Vec<_>, CardioError>>()?,
        )
    };

    if message.role == Role::Tool && message.tool_call_id.is_none() {
        return Err(CardioError::InvalidInput(
            "tool message missing tool_call_id".to_string(),
        ));
    }

    let content = if message.content.is_empty() && tool_calls.is_some() {
        None
    } else {
        Some(message.content)
    };

    Ok(WireMessage {
        role: message.role,
        content,
        tool_calls,
        tool_call_id: message.tool_call_id,
    })
}

fn to_wire_tool(spec: ToolSpec) -> WireTool {
    WireTool {
        tool_type: "function",
        function: WireFunction {
            name: spec.name,
            description: spec.description,
            parameters: spec.parameters,
        },
    }
}

fn from_wire_tool_call(call: WireToolCall) -> ToolCall {
    let args = if call.function.arguments.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&call.function.arguments).unwrap_or_else(|err| {
            tracing::debug!(
                tool = %call.function.name,
                error = %err,
                "tool arguments are not valid JSON; passing them through as text"
            );
            Value::String(call.function.arguments.clone())
        })
    };
    ToolCall {
        id: call.id,
        name: call.function.name,
        args,
    }
}

impl From<HttpFailure> for CardioError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Timeout(limit) => CardioError::Timeout(limit),
            other => CardioError::LlmProvider(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    connection: Connection,
    default_model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.connection.has_api_key() {
            "<redacted>"
        } else {
            "<none>"
        };

        f.debug_struct("OpenAiCompatibleClient")
            .field("base_url", &self.connection.base_url().as_str())
            .field("default_model", &self.default_model)
            .field("temperature", &self.temperature)
            .field("api_key", &api_key)
            .finish()
    }
}

impl OpenAiCompatibleClient {
    pub fn builder() -> OpenAiCompatibleBuilder {
        OpenAiCompatibleBuilder::default()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn set_default_model(&mut self, model: impl Into<String>) {
        self.default_model = model.into();
    }

    fn build_request(&self, request: LlmRequest) -> Result<ChatCompletionRequest, CardioError> {
        let LlmRequest {
            model,
            messages,
            tools,
        } = request;
        let model = if model.is_empty() {
            self.default_model.clone()
        } else {
            model
        };
        let messages = messages
            .into_iter()
            .map(to_wire_message)
            .collect::<Result<Vec<_>, _>>()?;
        let tools = if tools.is_empty() {
            None
        } else {
            Some(tools.into_iter().map(to_wire_tool).collect())
        };

        Ok(ChatCompletionRequest {
            model,
            messages,
            tools,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        })
    }
}

#[async_trait::async_trait]
impl ToolCallingLlm for OpenAiCompatibleClient {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, CardioError> {
        let body = self.build_request(request)?;
        tracing::debug!(
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map_or(0, Vec::len),
            "sending chat completion"
        );

        let response: ChatCompletionResponse = self
            .connection
            .post_json("v1/chat/completions", &body)
            .await?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "chat completion usage"
            );
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CardioError::LlmProvider("no choices returned".to_string()))?;

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(from_wire_tool_call)
                .collect(),
        })
    }
}

#[derive(Default, Clone)]
pub struct OpenAiCompatibleBuilder {
    base_url: Option<url::Url>,
    api_key: Option<String>,
    default_model: Option<String>,
    timeout: Option<Duration>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl fmt::Debug for OpenAiCompatibleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };

        f.debug_struct("OpenAiCompatibleBuilder")
            .field("base_url", &self.base_url.as_ref().map(url::Url::as_str))
            .field("default_model", &self.default_model)
            .field("api_key", &api_key)
            .finish()
    }
}

impl OpenAiCompatibleBuilder {
    /// Provider root without the `/v1` suffix, e.g. `https://api.openai.com`.
    pub fn base_url(mut self, value: impl AsRef<str>) -> Result<Self, CardioError> {
        self.base_url = Some(parse_base_url(value.as_ref()).map_err(CardioError::InvalidConfig)?);
        Ok(self)
    }

    pub fn api_key(mut self, value: impl Into<String>) -> Self {
        self.api_key = Some(value.into());
        self
    }

    pub fn default_model(mut self, value: impl Into<String>) -> Self {
        self.default_model = Some(value.into());
        self
    }

    pub fn timeout(mut self, value: Duration) -> Self {
        self.timeout = Some(value);
        self
    }

    pub fn temperature(mut self, value: f32) -> Self {
        self.temperature = Some(value);
        self
    }

    pub fn max_tokens(mut self, value: u32) -> Self {
        self.max_tokens = Some(value);
        self
    }

    pub fn build(self) -> Result<OpenAiCompatibleClient, CardioError> {
        let base_url = self
            .base_url
            .ok_or_else(|| CardioError::InvalidConfig("base_url is required".to_string()))?;
        let default_model = self
            .default_model
            .filter(|model| !model.trim().is_empty())
            .ok_or_else(|| CardioError::InvalidConfig("default_model is required".to_string()))?;
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(CardioError::InvalidConfig(format!(
                    "temperature {temperature} is outside 0.0..=2.0"
                )));
            }
        }

        let api_key = self.api_key.and_then(non_empty_secret);
        if api_key.is_none() && base_url.host_str() == Some("api.openai.com") {
            tracing::warn!(
                base_url = %base_url,
                "OpenAI endpoint configured without an API key; requests will be rejected"
            );
        }

        let connection = Connection::new(base_url, api_key, self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .map_err(CardioError::LlmProvider)?;

        Ok(OpenAiCompatibleClient {
            connection,
            default_model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}
