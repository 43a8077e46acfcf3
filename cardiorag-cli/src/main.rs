//! `cardiorag-chat`: ask the CardioRAG service questions from a terminal.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde::Deserialize;
use serde_json::{json, Value};

const FAILURE_MESSAGE: &str = "An error occurred while processing your message. This usually \
means the chatbot failed at generating a query to answer your question. Please try again or \
rephrase your message.";

const EXAMPLES: [&str; 2] = [
    "Which is the Entity with the highest sum of earned metrics?",
    "What do people think about IL-6 inhibitors?",
];

#[derive(Debug, Parser)]
#[command(name = "cardiorag-chat", version, about = "Chat with the CardioRAG agent")]
struct Cli {
    /// Agent endpoint.
    #[arg(long, env = "CHATBOT_URL", default_value = "http://localhost:8000/cvd-rag-agent")]
    url: String,

    /// Ask a single question and exit.
    #[arg(short, long)]
    question: Option<String>,

    /// Client-side limit for one answer.
    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,

    /// Do not read or write the history file.
    #[arg(long)]
    no_history: bool,
}

#[derive(Debug, Deserialize)]
struct AgentResponse {
    output: String,
    #[serde(default)]
    intermediate_steps: Vec<Value>,
}

#[derive(Debug, PartialEq)]
enum Reply {
    Answer { output: String, explanation: String },
    Failure,
}

/// Steps arrive as strings; objects are pretty-printed so older or richer
/// servers still render.
fn explain(steps: &[Value]) -> String {
    steps
        .iter()
        .map(|step| match step {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render(reply: &Reply) -> String {
    let (output, explanation) = match reply {
        Reply::Answer {
            output,
            explanation,
        } => (output.as_str(), explanation.as_str()),
        Reply::Failure => (FAILURE_MESSAGE, FAILURE_MESSAGE),
    };
    let explanation = if explanation.is_empty() {
        "The answer came straight from the model; no tools were used."
    } else {
        explanation
    };
    format!("{output}\n\n--- How was this generated? ---\n{explanation}\n")
}

async fn ask(client: &reqwest::Client, url: &str, question: &str) -> anyhow::Result<Reply> {
    let response = client
        .post(url)
        .json(&json!({ "text": question }))
        .send()
        .await
        .with_context(|| format!("could not reach {url}"))?;

    if !response.status().is_success() {
        return Ok(Reply::Failure);
    }

    let body: AgentResponse = response
        .json()
        .await
        .context("service returned an unreadable answer")?;
    Ok(Reply::Answer {
        explanation: explain(&body.intermediate_steps),
        output: body.output,
    })
}

fn history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("cardiorag").join("history.txt"))
}

async fn repl(client: &reqwest::Client, cli: &Cli) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;
    let history = if cli.no_history { None } else { history_path() };
    if let Some(path) = &history {
        let _ = editor.load_history(path);
    }

    println!("CVD System Chatbot");
    println!("Ask about patients, social media posts or the entities in the graph database.");
    println!("For example:");
    for example in EXAMPLES {
        println!("  {example}");
    }
    println!("Type `exit` to quit.\n");

    loop {
        let line = match editor.readline("What do you want to know? > ") {
            Ok(line) => line,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }
        let _ = editor.add_history_entry(question);

        println!("Searching for an answer...");
        match ask(client, &cli.url, question).await {
            Ok(reply) => println!("\n{}", render(&reply)),
            Err(error) => eprintln!("error: {error:#}\n"),
        }
    }

    if let Some(path) = &history {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.save_history(path);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.timeout_secs))
        .build()
        .context("building HTTP client")?;

    match &cli.question {
        Some(question) => {
            let reply = ask(&client, &cli.url, question).await?;
            print!("{}", render(&reply));
            Ok(())
        }
        None => repl(&client, &cli).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_steps_are_joined_in_order() {
        let steps = vec![json!("first step"), json!("second step")];

        assert_eq!(explain(&steps), "first step\n\nsecond step");
    }

    #[test]
    fn object_steps_are_pretty_printed() {
        let rendered = explain(&[json!({"tool": "explore_graph_database"})]);

        assert_eq!(rendered, "{\n  \"tool\": \"explore_graph_database\"\n}");
    }

    #[test]
    fn failures_show_the_retry_message_in_both_panels() {
        let rendered = render(&Reply::Failure);

        assert_eq!(rendered.matches("Please try again or").count(), 2);
        assert!(rendered.contains("How was this generated?"));
    }

    #[test]
    fn answers_without_steps_say_no_tools_ran() {
        let rendered = render(&Reply::Answer {
            output: "Hello.".to_string(),
            explanation: String::new(),
        });

        assert!(rendered.starts_with("Hello.\n"));
        assert!(rendered.contains("no tools were used"));
    }

    #[test]
    fn response_body_tolerates_missing_steps() {
        let body: AgentResponse = serde_json::from_value(json!({"input": "q", "output": "a"})).unwrap();

        assert_eq!(body.output, "a");
        assert!(body.intermediate_steps.is_empty());
    }
}
