use cardiorag_agent::phase::Acting;
use cardiorag_agent::{
    validate_single_terminal, validate_step_started_precedes_terminal,
    validate_tool_dispatch_cardinality, AgentEvent, AgentRuntime, FailureReason, LoopTransition,
    Signals, ToolInvocation,
};
use cardiorag_core::{LlmResponse, ToolCall, ToolError};
use serde_json::json;

const IDLE: Signals = Signals {
    cancelled: false,
    out_of_time: false,
};

fn tool_reply() -> LlmResponse {
    LlmResponse {
        content: String::new(),
        tool_calls: vec![ToolCall {
            id: "call-1".to_string(),
            name: "explore_graph_database".to_string(),
            args: json!({"question": "How many posts mention statins?"}),
        }],
    }
}

fn final_reply(text: &str) -> LlmResponse {
    LlmResponse {
        content: text.to_string(),
        tool_calls: vec![],
    }
}

fn expect_acting(transition: LoopTransition) -> (AgentRuntime<Acting>, ToolInvocation) {
    match transition {
        LoopTransition::Acting(runtime, invocation) => (runtime, invocation),
        other => panic!("expected Acting, got {other:?}"),
    }
}

#[test]
fn start_opens_step_one_and_spends_budget() {
    let (transition, events) = AgentRuntime::new(3).start(IDLE);

    let LoopTransition::Thinking(runtime) = transition else {
        panic!("expected Thinking");
    };
    assert_eq!(runtime.step_id(), 1);
    assert_eq!(runtime.remaining_budget(), 2);
    assert_eq!(events, vec![AgentEvent::StepStarted { step_id: 1 }]);
}

#[test]
fn a_full_tool_step_emits_a_well_formed_event_stream() {
    let mut log = Vec::new();

    let (transition, events) = AgentRuntime::new(2).start(IDLE);
    log.extend(events);
    let LoopTransition::Thinking(thinking) = transition else {
        panic!("expected Thinking");
    };

    let (transition, events) = thinking.on_model_response(IDLE, tool_reply()).unwrap();
    log.extend(events);
    let (acting, invocation) = expect_acting(transition);

    let (transition, events) =
        acting.on_tool_result(IDLE, &invocation, Ok("42 posts".to_string()));
    log.extend(events);
    let LoopTransition::Observing(observing, entry) = transition else {
        panic!("expected Observing");
    };
    assert_eq!(entry.observation, "42 posts");
    assert_eq!(entry.action.tool, "explore_graph_database");
    assert_eq!(entry.action.call_id, "call-1");

    let (transition, events) = observing.think(IDLE);
    log.extend(events);
    let LoopTransition::Thinking(thinking) = transition else {
        panic!("expected Thinking");
    };
    assert_eq!(thinking.step_id(), 2);

    let (transition, events) = thinking
        .on_model_response(IDLE, final_reply("  42 posts mention statins.  "))
        .unwrap();
    log.extend(events);
    let LoopTransition::Completed(_, answer) = transition else {
        panic!("expected Completed");
    };
    assert_eq!(answer, "42 posts mention statins.");

    assert_eq!(
        log,
        vec![
            AgentEvent::StepStarted { step_id: 1 },
            AgentEvent::ModelResponded { step_id: 1 },
            AgentEvent::ToolDispatched {
                step_id: 1,
                tool: "explore_graph_database".to_string()
            },
            AgentEvent::ToolCompleted { step_id: 1 },
            AgentEvent::StepStarted { step_id: 2 },
            AgentEvent::ModelResponded { step_id: 2 },
            AgentEvent::Completed { step_id: 2 },
        ]
    );
    validate_step_started_precedes_terminal(&log).unwrap();
    validate_tool_dispatch_cardinality(&log).unwrap();
    validate_single_terminal(&log).unwrap();
}

#[test]
fn tool_errors_are_rendered_into_the_observation() {
    let (transition, _) = AgentRuntime::new(1).start(IDLE);
    let LoopTransition::Thinking(thinking) = transition else {
        panic!("expected Thinking");
    };
    let (transition, _) = thinking.on_model_response(IDLE, tool_reply()).unwrap();
    let (acting, invocation) = expect_acting(transition);

    let (transition, events) = acting.on_tool_result(
        IDLE,
        &invocation,
        Err(ToolError::ExecutionFailed("neo4j unavailable".to_string())),
    );

    let LoopTransition::Observing(_, entry) = transition else {
        panic!("expected Observing");
    };
    assert_eq!(
        entry.observation,
        "[TOOL ERROR] explore_graph_database: execution failed: neo4j unavailable"
    );
    assert_eq!(
        events,
        vec![AgentEvent::ToolFailed {
            step_id: 1,
            reason: "execution failed: neo4j unavailable".to_string()
        }]
    );
}

#[test]
fn exhausted_budget_fails_at_the_next_step_boundary() {
    let (transition, _) = AgentRuntime::new(1).start(IDLE);
    let LoopTransition::Thinking(thinking) = transition else {
        panic!("expected Thinking");
    };
    let (transition, _) = thinking.on_model_response(IDLE, tool_reply()).unwrap();
    let (acting, invocation) = expect_acting(transition);
    let (transition, _) = acting.on_tool_result(IDLE, &invocation, Ok("obs".to_string()));
    let LoopTransition::Observing(observing, _) = transition else {
        panic!("expected Observing");
    };

    let (transition, events) = observing.think(IDLE);

    let LoopTransition::Failed(failed, reason) = transition else {
        panic!("expected Failed");
    };
    assert_eq!(reason, FailureReason::IterationLimit);
    assert_eq!(failed.max_iterations(), 1);
    assert_eq!(failed.step_id(), 1);
    assert_eq!(
        events,
        vec![AgentEvent::Failed {
            step_id: 1,
            reason: FailureReason::IterationLimit
        }]
    );
}

#[test]
fn cancellation_wins_over_time_and_budget() {
    let signals = Signals {
        cancelled: true,
        out_of_time: true,
    };

    let (transition, events) = AgentRuntime::new(0).start(signals);

    assert!(matches!(transition, LoopTransition::Interrupted(_)));
    assert_eq!(events, vec![AgentEvent::Interrupted { step_id: 0 }]);
}

#[test]
fn time_limit_is_reported_before_budget() {
    let signals = Signals {
        cancelled: false,
        out_of_time: true,
    };

    let (transition, _) = AgentRuntime::new(0).start(signals);

    assert!(matches!(
        transition,
        LoopTransition::Failed(_, FailureReason::TimeLimit)
    ));
}

#[test]
fn cancellation_during_a_tool_closes_the_step_then_interrupts() {
    let cancelled = Signals {
        cancelled: true,
        out_of_time: false,
    };
    let (transition, _) = AgentRuntime::new(4).start(IDLE);
    let LoopTransition::Thinking(thinking) = transition else {
        panic!("expected Thinking");
    };
    let (transition, _) = thinking.on_model_response(IDLE, tool_reply()).unwrap();
    let (acting, invocation) = expect_acting(transition);

    let (transition, events) =
        acting.on_tool_result(cancelled, &invocation, Ok("ignored".to_string()));

    assert!(matches!(transition, LoopTransition::Interrupted(_)));
    assert_eq!(
        events,
        vec![
            AgentEvent::ToolFailed {
                step_id: 1,
                reason: "run cancelled".to_string()
            },
            AgentEvent::Interrupted { step_id: 1 },
        ]
    );
}

#[test]
fn blank_replies_reprompt_instead_of_failing() {
    let (transition, _) = AgentRuntime::new(2).start(IDLE);
    let LoopTransition::Thinking(thinking) = transition else {
        panic!("expected Thinking");
    };

    let (transition, events) = thinking.on_model_response(IDLE, final_reply("")).unwrap();

    let LoopTransition::Reprompting(observing, reason) = transition else {
        panic!("expected Reprompting");
    };
    assert!(reason.contains("neither an answer nor a tool call"));
    assert!(matches!(events.last(), Some(AgentEvent::Reprompted { step_id: 1, .. })));

    let (transition, _) = observing.think(IDLE);
    let LoopTransition::Thinking(thinking) = transition else {
        panic!("expected Thinking");
    };
    assert_eq!(thinking.step_id(), 2);
    assert_eq!(thinking.remaining_budget(), 0);
}

#[test]
fn validators_reject_malformed_streams() {
    let double_dispatch = vec![
        AgentEvent::StepStarted { step_id: 1 },
        AgentEvent::ToolDispatched {
            step_id: 1,
            tool: "a".to_string(),
        },
        AgentEvent::ToolCompleted { step_id: 1 },
        AgentEvent::ToolDispatched {
            step_id: 1,
            tool: "b".to_string(),
        },
        AgentEvent::ToolCompleted { step_id: 1 },
    ];
    assert!(validate_tool_dispatch_cardinality(&double_dispatch).is_err());

    let dangling = vec![
        AgentEvent::StepStarted { step_id: 1 },
        AgentEvent::ToolDispatched {
            step_id: 1,
            tool: "a".to_string(),
        },
    ];
    assert!(validate_tool_dispatch_cardinality(&dangling).is_err());

    let unopened = vec![AgentEvent::Completed { step_id: 3 }];
    assert!(validate_step_started_precedes_terminal(&unopened).is_err());

    let trailing = vec![
        AgentEvent::StepStarted { step_id: 1 },
        AgentEvent::Completed { step_id: 1 },
        AgentEvent::StepStarted { step_id: 2 },
    ];
    assert!(validate_single_terminal(&trailing).is_err());
    assert!(validate_single_terminal(&[]).is_err());
}
