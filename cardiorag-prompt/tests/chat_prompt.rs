use serde_json::json;
use std::collections::HashMap;
use cardiorag_core::{CardioError, Role, Runnable};
use cardiorag_prompt::{ChatPromptTemplate, MessagePromptTemplate};

#[tokio::test]
async fn chat_prompt_formats_messages() {
    let template = ChatPromptTemplate::new(vec![
        MessagePromptTemplate::system("Use the context:\n{{context}}"),
        MessagePromptTemplate::human("{{question}}"),
    ]);

    let mut vars = HashMap::new();
    vars.insert("context".to_string(), json!("post about statins"));
    vars.insert("question".to_string(), json!("What do people say about statins?"));

    let messages = template.invoke(vars).await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[0].content, "Use the context:\npost about statins");
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].content, "What do people say about statins?");
}

#[test]
fn chat_prompt_handles_placeholders() {
    let template = ChatPromptTemplate::new(vec![
        MessagePromptTemplate::system("System"),
        MessagePromptTemplate::placeholder("history"),
        MessagePromptTemplate::human("User"),
    ]);

    let mut vars = HashMap::new();
    vars.insert(
        "history".to_string(),
        json!([
            { "role": "user", "content": "Hi" },
            { "role": "assistant", "content": "Hello" }
        ]),
    );

    let messages = template.format_messages(&vars).unwrap();

    assert_eq!(messages.len(), 4);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(messages[2].content, "Hello");
}

#[test]
fn placeholder_with_non_messages_is_rejected() {
    let template = ChatPromptTemplate::new(vec![MessagePromptTemplate::placeholder("history")]);
    let mut vars = HashMap::new();
    vars.insert("history".to_string(), json!(42));
    let err = template.format_messages(&vars).unwrap_err();
    assert!(matches!(err, CardioError::InvalidInput(_)));
}

#[test]
fn placeholder_accepts_a_single_message_or_nothing() {
    let template = ChatPromptTemplate::new(vec![
        MessagePromptTemplate::human("{{input}}"),
        MessagePromptTemplate::placeholder("agent_scratchpad"),
    ]);

    let mut vars = HashMap::new();
    vars.insert("input".to_string(), json!("Which entity has the most followers?"));
    assert_eq!(template.format_messages(&vars).unwrap().len(), 1);

    vars.insert(
        "agent_scratchpad".to_string(),
        json!({ "role": "assistant", "content": "Checking the graph." }),
    );
    let messages = template.format_messages(&vars).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Checking the graph.");
}
