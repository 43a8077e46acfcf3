use std::collections::HashMap;

use async_trait::async_trait;
use cardiorag_core::{CardioError, Message, Runnable, Value};

use crate::PromptTemplate;

/// One slot of a chat prompt.
///
/// The agent prompt is `system`, `human`, then a `placeholder` for the
/// scratchpad of tool calls and observations gathered so far. The synthesizer
/// and answer prompts only use the first two.
#[derive(Debug, Clone)]
pub enum MessagePromptTemplate {
    System(PromptTemplate),
    Human(PromptTemplate),
    Placeholder { variable_name: String },
}

impl MessagePromptTemplate {
    pub fn system(template: &str) -> Self {
        Self::System(PromptTemplate::new(template))
    }

    pub fn human(template: &str) -> Self {
        Self::Human(PromptTemplate::new(template))
    }

    pub fn placeholder(variable_name: &str) -> Self {
        Self::Placeholder {
            variable_name: variable_name.to_string(),
        }
    }

    pub fn format(&self, vars: &HashMap<String, Value>) -> Result<Vec<Message>, CardioError> {
        match self {
            Self::System(template) => Ok(vec![Message::system(template.render(vars)?)]),
            Self::Human(template) => Ok(vec![Message::user(template.render(vars)?)]),
            Self::Placeholder { variable_name } => match vars.get(variable_name) {
                // first turn: nothing to replay yet
                None => Ok(Vec::new()),
                Some(value) => scratchpad(variable_name, value),
            },
        }
    }
}

/// A placeholder holds either a list of messages or a single message.
fn scratchpad(variable_name: &str, value: &Value) -> Result<Vec<Message>, CardioError> {
    let invalid = || {
        CardioError::InvalidInput(format!(
            "placeholder '{variable_name}' does not hold chat messages"
        ))
    };
    match value {
        Value::Array(_) => serde_json::from_value(value.clone()).map_err(|_| invalid()),
        Value::Object(_) => serde_json::from_value::<Message>(value.clone())
            .map(|message| vec![message])
            .map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

#[derive(Debug, Clone)]
pub struct ChatPromptTemplate {
    messages: Vec<MessagePromptTemplate>,
}

impl ChatPromptTemplate {
    pub fn new(messages: Vec<MessagePromptTemplate>) -> Self {
        Self { messages }
    }

    pub fn format_messages(
        &self,
        vars: &HashMap<String, Value>,
    ) -> Result<Vec<Message>, CardioError> {
        self.messages.iter().try_fold(Vec::new(), |mut out, slot| {
            out.extend(slot.format(vars)?);
            Ok(out)
        })
    }
}

#[async_trait]
impl Runnable<HashMap<String, Value>, Vec<Message>> for ChatPromptTemplate {
    async fn invoke(&self, input: HashMap<String, Value>) -> Result<Vec<Message>, CardioError> {
        self.format_messages(&input)
    }
}
