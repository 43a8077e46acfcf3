mod support;

use std::time::Duration;

use cardiorag_agent::{
    validate_single_terminal, validate_step_started_precedes_terminal,
    validate_tool_dispatch_cardinality, AgentConfig, AgentError, AgentEvent, CancellationToken,
    FailureReason, RunStatus, DEFAULT_STOPPED_ANSWER,
};
use cardiorag_core::{CardioError, RetryPolicy, Role, Runnable};
use support::*;

fn assert_event_invariants(events: &[AgentEvent]) {
    validate_step_started_precedes_terminal(events).unwrap();
    validate_tool_dispatch_cardinality(events).unwrap();
    validate_single_terminal(events).unwrap();
}

#[tokio::test]
async fn routes_to_graph_tool_and_answers_from_observation() {
    let llm = ScriptedLlm::new(vec![
        calls(vec![call("call-1", GRAPH, "Which entity has the most followers?")]),
        answer("The American Heart Association has the most followers."),
    ]);
    let posts = StubTool::replying("unused");
    let graph = StubTool::replying("American Heart Association, 12400 followers");
    let agent = executor(llm.clone(), posts.clone(), graph.clone(), AgentConfig::default());

    let output = agent
        .run("Which entity has the most followers?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(output.input, "Which entity has the most followers?");
    assert_eq!(output.output, "The American Heart Association has the most followers.");
    assert_eq!(output.status, RunStatus::Done);
    assert_eq!(graph.questions(), vec!["Which entity has the most followers?"]);
    assert_eq!(posts.runs(), 0);

    let steps = output.intermediate_steps();
    assert_eq!(steps.len(), 1);
    assert!(steps[0].contains(GRAPH));
    assert!(steps[0].contains("American Heart Association, 12400 followers"));
    assert_event_invariants(&output.events);
}

#[tokio::test]
async fn second_request_replays_the_call_and_its_observation() {
    let llm = ScriptedLlm::new(vec![
        calls(vec![call("call-1", POSTS, "What do people think about IL-6 inhibitors?")]),
        answer("Mostly hopeful."),
    ]);
    let agent = executor(
        llm.clone(),
        StubTool::replying("Posts describe cautious optimism."),
        StubTool::replying("unused"),
        AgentConfig::default().with_model("gpt-4o-mini"),
    );

    agent
        .run("What do people think about IL-6 inhibitors?", &CancellationToken::new())
        .await
        .unwrap();

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].model, "gpt-4o-mini");
    let tool_names: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tool_names, vec![GRAPH, POSTS]);
    assert_eq!(requests[0].messages.len(), 2);
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert_eq!(requests[0].messages[1].content, "What do people think about IL-6 inhibitors?");

    let replay = &requests[1].messages;
    assert_eq!(replay.len(), 4);
    assert_eq!(replay[2].role, Role::Assistant);
    assert_eq!(replay[2].tool_calls.len(), 1);
    assert_eq!(replay[2].tool_calls[0].id, "call-1");
    assert_eq!(replay[3].role, Role::Tool);
    assert_eq!(replay[3].tool_call_id.as_deref(), Some("call-1"));
    assert_eq!(replay[3].content, "Posts describe cautious optimism.");
}

#[tokio::test]
async fn intermediate_steps_follow_invocation_order() {
    let llm = ScriptedLlm::new(vec![
        calls(vec![call("c1", POSTS, "q")]),
        calls(vec![call("c2", GRAPH, "q")]),
        calls(vec![call("c3", POSTS, "q")]),
        answer("done"),
    ]);
    let agent = executor(
        llm,
        StubTool::replying("from posts"),
        StubTool::replying("from graph"),
        AgentConfig::default(),
    );

    let output = agent.run("q", &CancellationToken::new()).await.unwrap();

    let order: Vec<&str> = output.steps.iter().map(|s| s.action.call_id.as_str()).collect();
    assert_eq!(order, vec!["c1", "c2", "c3"]);
    let observations: Vec<&str> = output.steps.iter().map(|s| s.observation.as_str()).collect();
    assert_eq!(observations, vec!["from posts", "from graph", "from posts"]);
    assert_event_invariants(&output.events);
}

#[tokio::test]
async fn tool_failures_become_observations_and_the_run_still_completes() {
    let llm = ScriptedLlm::new(vec![
        calls(vec![call("c1", GRAPH, "q")]),
        calls(vec![call("c2", GRAPH, "q")]),
        answer("I could not reach the graph database."),
    ]);
    let graph = StubTool::failing("connection refused");
    let agent = executor(llm, StubTool::replying("unused"), graph.clone(), AgentConfig::default());

    let output = agent.run("q", &CancellationToken::new()).await.unwrap();

    assert_eq!(output.status, RunStatus::Done);
    assert_eq!(graph.runs(), 2);
    assert_eq!(
        output.steps[0].observation,
        "[TOOL ERROR] explore_graph_database: execution failed: connection refused"
    );
    assert!(output
        .events
        .iter()
        .any(|e| matches!(e, AgentEvent::ToolFailed { step_id: 1, .. })));
    assert_event_invariants(&output.events);
}

#[tokio::test]
async fn step_ceiling_ends_in_failed_with_stopped_answer() {
    let llm = ScriptedLlm::always(calls(vec![call("loop", POSTS, "q")]));
    let posts = StubTool::replying("more posts");
    let agent = executor(
        llm.clone(),
        posts.clone(),
        StubTool::replying("unused"),
        AgentConfig::default().with_max_iterations(3),
    );

    let output = agent.run("q", &CancellationToken::new()).await.unwrap();

    assert_eq!(output.status, RunStatus::Failed(FailureReason::IterationLimit));
    assert_eq!(output.output, DEFAULT_STOPPED_ANSWER);
    assert_eq!(llm.calls(), 3);
    assert_eq!(posts.runs(), 3);
    assert_eq!(output.steps.len(), 3);
    assert!(matches!(
        output.events.last(),
        Some(AgentEvent::Failed {
            step_id: 3,
            reason: FailureReason::IterationLimit
        })
    ));
    assert_event_invariants(&output.events);
}

#[tokio::test]
async fn failures_below_the_ceiling_still_allow_done() {
    let mut replies: Vec<_> = (0..4)
        .map(|i| calls(vec![call(&format!("c{i}"), GRAPH, "q")]))
        .collect();
    replies.push(answer("answered after retries"));
    let agent = executor(
        ScriptedLlm::new(replies),
        StubTool::replying("unused"),
        StubTool::failing("boom"),
        AgentConfig::default().with_max_iterations(5),
    );

    let output = agent.run("q", &CancellationToken::new()).await.unwrap();

    assert_eq!(output.status, RunStatus::Done);
    assert_eq!(output.output, "answered after retries");
    assert_eq!(output.steps.len(), 4);
}

#[tokio::test]
async fn unknown_tool_names_are_observed_not_fatal() {
    let llm = ScriptedLlm::new(vec![
        calls(vec![call("c1", "search_web", "q")]),
        answer("fallback answer"),
    ]);
    let agent = executor(
        llm,
        StubTool::replying("unused"),
        StubTool::replying("unused"),
        AgentConfig::default(),
    );

    let output = agent.run("q", &CancellationToken::new()).await.unwrap();

    assert_eq!(output.output, "fallback answer");
    assert!(output.steps[0]
        .observation
        .starts_with("[TOOL ERROR] search_web: invalid input: unknown tool"));
}

#[tokio::test]
async fn empty_model_reply_is_reprompted_and_consumes_a_step() {
    let llm = ScriptedLlm::new(vec![answer("   "), answer("Here is the answer.")]);
    let agent = executor(
        llm.clone(),
        StubTool::replying("unused"),
        StubTool::replying("unused"),
        AgentConfig::default(),
    );

    let output = agent.run("q", &CancellationToken::new()).await.unwrap();

    assert_eq!(output.output, "Here is the answer.");
    assert!(output.steps.is_empty());
    let second = &llm.requests()[1].messages;
    let reprompt = second.last().unwrap();
    assert_eq!(reprompt.role, Role::User);
    assert!(reprompt.content.contains("explore_graph_database"));
    assert!(output
        .events
        .iter()
        .any(|e| matches!(e, AgentEvent::Reprompted { step_id: 1, .. })));
    assert_event_invariants(&output.events);
}

#[tokio::test]
async fn empty_question_is_rejected_without_model_calls() {
    let llm = ScriptedLlm::new(vec![answer("unused")]);
    let agent = executor(
        llm.clone(),
        StubTool::replying("unused"),
        StubTool::replying("unused"),
        AgentConfig::default(),
    );

    let err = agent.run("  \n", &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AgentError::EmptyQuestion));
    assert_eq!(llm.calls(), 0);
    assert!(matches!(
        agent.invoke(String::new()).await,
        Err(CardioError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn cancelled_token_stops_before_the_first_call() {
    let llm = ScriptedLlm::new(vec![answer("unused")]);
    let agent = executor(
        llm.clone(),
        StubTool::replying("unused"),
        StubTool::replying("unused"),
        AgentConfig::default(),
    );
    let token = CancellationToken::new();
    token.cancel();

    let err = agent.run("q", &token).await.unwrap_err();

    assert!(matches!(err, AgentError::Cancelled { step_id: 0 }));
    assert_eq!(llm.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_a_tool_discards_its_result() {
    let llm = ScriptedLlm::new(vec![calls(vec![call("c1", GRAPH, "q")]), answer("unused")]);
    let agent = executor(
        llm.clone(),
        StubTool::replying("unused"),
        StubTool::sleeping(Duration::from_secs(30)),
        AgentConfig::default(),
    );
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let err = agent.run("q", &token).await.unwrap_err();

    assert!(matches!(err, AgentError::Cancelled { step_id: 1 }));
    assert_eq!(llm.calls(), 1);
    assert!(matches!(CardioError::from(err), CardioError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn time_ceiling_ends_in_failed() {
    let llm = ScriptedLlm::always(calls(vec![call("c", GRAPH, "q")]));
    let agent = executor(
        llm.clone(),
        StubTool::replying("unused"),
        StubTool::sleeping(Duration::from_secs(10)),
        AgentConfig::default().with_max_execution_time(Duration::from_secs(5)),
    );

    let output = agent.run("q", &CancellationToken::new()).await.unwrap();

    assert_eq!(output.status, RunStatus::Failed(FailureReason::TimeLimit));
    assert_eq!(output.output, DEFAULT_STOPPED_ANSWER);
    assert_eq!(llm.calls(), 1);
    assert_eq!(output.steps.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_tools_time_out_into_observations() {
    let llm = ScriptedLlm::new(vec![calls(vec![call("c1", GRAPH, "q")]), answer("gave up")]);
    let agent = executor(
        llm,
        StubTool::replying("unused"),
        StubTool::sleeping(Duration::from_secs(60)),
        AgentConfig::default().with_tool_timeout(Duration::from_secs(2)),
    );

    let output = agent.run("q", &CancellationToken::new()).await.unwrap();

    assert_eq!(output.output, "gave up");
    assert_eq!(
        output.steps[0].observation,
        "[TOOL ERROR] explore_graph_database: timed out after 2s"
    );
}

#[tokio::test]
async fn model_failures_abort_the_run_as_retryable_errors() {
    let llm = ScriptedLlm::always_failing("upstream 503");
    let agent = executor(
        llm,
        StubTool::replying("unused"),
        StubTool::replying("unused"),
        AgentConfig::default(),
    );

    let err = agent.run("q", &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AgentError::ModelTransport { step_id: 1, .. }));
    assert!(matches!(
        CardioError::from(err),
        CardioError::LlmProvider(message) if message == "upstream 503"
    ));
}

#[tokio::test]
async fn zero_iterations_is_an_invalid_config() {
    let result = cardiorag_agent::AgentExecutor::new(
        ScriptedLlm::new(vec![]),
        registry(StubTool::replying("a"), StubTool::replying("b")),
        AgentConfig::default().with_max_iterations(0),
    );

    assert!(matches!(result, Err(CardioError::InvalidConfig(_))));
}

#[tokio::test(start_paused = true)]
async fn retry_wrapper_makes_ten_attempts_by_default() {
    let llm = ScriptedLlm::always_failing("rate limited");
    let agent = executor(
        llm.clone(),
        StubTool::replying("unused"),
        StubTool::replying("unused"),
        AgentConfig::default(),
    );
    let started = tokio::time::Instant::now();

    let err = agent
        .run_with_retry("q", &RetryPolicy::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(llm.calls(), 10);
    assert!(matches!(err, CardioError::MaxRetriesExceeded { max: 10, .. }));
    assert_eq!(started.elapsed(), Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn retry_wrapper_recovers_after_a_transient_failure() {
    let llm = ScriptedLlm::with_results(vec![
        Err("connection reset".to_string()),
        Ok(answer("recovered")),
    ]);
    let agent = executor(
        llm.clone(),
        StubTool::replying("unused"),
        StubTool::replying("unused"),
        AgentConfig::default(),
    );

    let output = agent
        .run_with_retry("q", &RetryPolicy::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(output.output, "recovered");
    assert_eq!(llm.calls(), 2);
}

#[tokio::test]
async fn retry_wrapper_does_not_repeat_rejected_questions() {
    let llm = ScriptedLlm::new(vec![]);
    let agent = executor(
        llm.clone(),
        StubTool::replying("unused"),
        StubTool::replying("unused"),
        AgentConfig::default(),
    );

    let err = agent
        .run_with_retry("", &RetryPolicy::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CardioError::InvalidInput(_)));
    assert_eq!(llm.calls(), 0);
}
