//! Orchestrator Integration Tests
//!
//! Tests for record bracketing, failure handling, history rebuilding and
//! context seeding.

mod common;

use std::sync::atomic::Ordering;

use futures::StreamExt;
use serde_json::{json, Value};

use common::*;
use lexllm::core::{keys, Orchestrator, RunContext};
use lexllm::domain::{
    ConversationMessage, ErrorData, EventKind, RunState, StepStatus, WorkflowRunRequest, WorkflowStepData,
};

fn request(user_input: &str) -> WorkflowRunRequest {
    WorkflowRunRequest::new("conv-1", user_input)
}

fn step_data(event: &lexllm::domain::StreamEvent) -> WorkflowStepData {
    serde_json::from_value(event.data.clone().unwrap()).unwrap()
}

#[tokio::test]
async fn test_successful_run_is_bracketed() {
    let steps = vec![ChunkStep::new("a", 2), ChunkStep::new("b", 0), ChunkStep::new("c", 3)];
    let mut orchestrator = Orchestrator::new(request("Hej"), steps);

    let events = run_events(&mut orchestrator).await;

    // 1 start + 2 per step + 5 passthrough + 1 end
    assert_eq!(events.len(), 1 + 2 * 3 + 5 + 1);
    assert_eq!(events.first().unwrap().event, EventKind::StreamStart);
    assert_eq!(events.last().unwrap().event, EventKind::StreamEnd);

    // Every record carries the same correlation ids
    assert!(events.iter().all(|e| e.conversation_id == "conv-1"));
    assert!(events.iter().all(|e| e.run_id == orchestrator.run_id()));

    // Each step's records sit between its own started/completed pair
    let mut i = 1;
    for (name, count) in [("a", 2), ("b", 0), ("c", 3)] {
        let started = step_data(&events[i]);
        assert_eq!(started.name, name);
        assert_eq!(started.status, StepStatus::Started);

        for j in 0..count {
            let chunk = &events[i + 1 + j];
            assert_eq!(chunk.event, EventKind::TextChunk);
            assert_eq!(chunk.data, Some(Value::from(format!("{}-{}", name, j))));
        }

        let completed = step_data(&events[i + 1 + count]);
        assert_eq!(completed.status, StepStatus::Completed);
        assert_eq!(completed.step_id, started.step_id);

        i += count + 2;
    }

    assert_eq!(orchestrator.state(), &RunState::Finished);
}

#[tokio::test]
async fn test_step_ids_are_fresh_per_step() {
    let steps = vec![ChunkStep::new("a", 0), ChunkStep::new("b", 0)];
    let mut orchestrator = Orchestrator::new(request("Hej"), steps);

    let events = run_events(&mut orchestrator).await;

    assert_ne!(step_data(&events[1]).step_id, step_data(&events[3]).step_id);
}

#[tokio::test]
async fn test_failing_step_ends_run_with_single_error() {
    let (after, after_runs) = CountingStep::new();
    let steps = vec![ChunkStep::new("search", 1), FailingStep::new("generate"), after];
    let mut orchestrator = Orchestrator::new(request("Hej"), steps);

    let events = run_events(&mut orchestrator).await;

    assert_eq!(
        kinds(&events),
        vec![
            EventKind::StreamStart,
            EventKind::WorkflowStep,
            EventKind::TextChunk,
            EventKind::WorkflowStep,
            EventKind::WorkflowStep,
            EventKind::TextChunk,
            EventKind::Error,
        ]
    );

    let failed_started = step_data(&events[4]);
    assert_eq!(failed_started.name, "generate");
    assert_eq!(failed_started.status, StepStatus::Started);

    let error: ErrorData = serde_json::from_value(events[6].data.clone().unwrap()).unwrap();
    assert!(error.message.contains("generate"));
    assert!(error.message.contains("search index unavailable"));
    assert_eq!(error.code.as_deref(), Some("step_failed"));

    assert_eq!(after_runs.load(Ordering::SeqCst), 0);
    assert!(matches!(orchestrator.state(), RunState::Failed { step, .. } if step == "generate"));
}

#[tokio::test]
async fn test_runs_are_identical_modulo_ids() {
    let structure = |events: Vec<lexllm::domain::StreamEvent>| -> Vec<Value> {
        events
            .into_iter()
            .map(|e| {
                let mut value = serde_json::to_value(&e).unwrap();
                value["run_id"] = Value::Null;
                if let Some(data) = value.get_mut("data").and_then(Value::as_object_mut) {
                    data.remove("step_id");
                }
                value
            })
            .collect()
    };

    let build = || {
        Orchestrator::new(
            request("Hej").with_history(vec![ConversationMessage::user("Hi!")]),
            vec![ChunkStep::new("a", 2), WriterStep::answer("Svar")],
        )
    };

    let mut first = build();
    let mut second = build();
    assert_ne!(first.run_id(), second.run_id());

    let first_events = structure(run_events(&mut first).await);
    let second_events = structure(run_events(&mut second).await);

    assert_eq!(first_events, second_events);
}

#[tokio::test]
async fn test_history_is_rebuilt_from_context() {
    let req = request("Hello?").with_history(vec![ConversationMessage::user("Hi!")]);
    let mut orchestrator = Orchestrator::new(req, vec![WriterStep::answer("Assistant reply")]);

    let events = run_events(&mut orchestrator).await;

    let start = events.first().unwrap().data.clone().unwrap();
    assert_eq!(start["conversation_history"], json!([{"role": "user", "content": "Hi!"}]));

    let history = final_history(&events);
    assert_eq!(
        history,
        vec![
            ConversationMessage::user("Hi!"),
            ConversationMessage::user("Hello?"),
            ConversationMessage::assistant("Assistant reply"),
        ]
    );
}

#[tokio::test]
async fn test_missing_final_response_defaults_to_empty() {
    let mut orchestrator = Orchestrator::new(request("Hej"), vec![ChunkStep::new("a", 0)]);

    let history = final_history(&run_events(&mut orchestrator).await);

    assert_eq!(
        history,
        vec![ConversationMessage::user("Hej"), ConversationMessage::assistant("")]
    );
}

#[tokio::test]
async fn test_system_prompt_and_user_echo_shape_history() {
    let writer = WriterStep::new(vec![
        (keys::FINAL_RESPONSE, json!("Svar")),
        (keys::SYSTEM_PROMPT, json!("Ny instruks")),
        (keys::USER_MESSAGE_WITH_SOURCES, json!("Kilder + spørgsmål")),
    ]);

    // First turn: the prompt is prepended
    let mut orchestrator = Orchestrator::new(request("Spørgsmål"), vec![writer.clone()]);
    let history = final_history(&run_events(&mut orchestrator).await);
    assert_eq!(
        history,
        vec![
            ConversationMessage::system("Ny instruks"),
            ConversationMessage::user("Kilder + spørgsmål"),
            ConversationMessage::assistant("Svar"),
        ]
    );

    // Follow-up: the head system message is replaced, not duplicated
    let prior = vec![
        ConversationMessage::system("Gammel instruks"),
        ConversationMessage::user("q1"),
        ConversationMessage::assistant("a1"),
    ];
    let mut orchestrator = Orchestrator::new(request("q2").with_history(prior), vec![writer]);
    let history = final_history(&run_events(&mut orchestrator).await);
    assert_eq!(history.len(), 5);
    assert_eq!(history[0], ConversationMessage::system("Ny instruks"));
    assert_eq!(history[1], ConversationMessage::user("q1"));
    assert_eq!(history.iter().filter(|m| m.role == lexllm::domain::Role::System).count(), 1);
}

#[tokio::test]
async fn test_request_fields_override_initial_context() {
    let initial: RunContext = [
        ("user_input".to_string(), json!("stale")),
        ("foo".to_string(), json!(42)),
    ]
    .into_iter()
    .collect();

    let mut orchestrator = Orchestrator::with_context(request("X"), vec![ChunkStep::new("a", 0)], initial);

    assert_eq!(orchestrator.context().get_str(keys::USER_INPUT), Some("X"));
    assert_eq!(orchestrator.context().get("foo"), Some(&json!(42)));
    assert_eq!(orchestrator.context().get(keys::CONVERSATION_HISTORY), Some(&json!([])));

    run_events(&mut orchestrator).await;
    assert_eq!(orchestrator.context().get_str(keys::USER_INPUT), Some("X"));
}

#[tokio::test]
async fn test_second_execute_reports_already_executed() {
    let (step, runs) = CountingStep::new();
    let mut orchestrator = Orchestrator::new(request("Hej"), vec![step]);

    run_events(&mut orchestrator).await;
    let again = run_events(&mut orchestrator).await;

    assert_eq!(kinds(&again), vec![EventKind::Error]);
    let error: ErrorData = serde_json::from_value(again[0].data.clone().unwrap()).unwrap();
    assert_eq!(error.code.as_deref(), Some("already_executed"));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_nothing_runs_until_polled() {
    let (step, runs) = CountingStep::new();
    let mut orchestrator = Orchestrator::new(request("Hej"), vec![step]);

    {
        let _records = orchestrator.execute();
        tokio::task::yield_now().await;
    }

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(orchestrator.state(), &RunState::NotStarted);
}

#[tokio::test]
async fn test_dropping_the_stream_abandons_the_run() {
    let (later, later_runs) = CountingStep::new();
    let steps = vec![ChunkStep::new("slow", 50), later];
    let mut orchestrator = Orchestrator::new(request("Hej"), steps);

    {
        let mut records = orchestrator.execute();
        let first = records.next().await.unwrap();
        assert!(first.contains("\"stream_start\""));
    }

    assert_eq!(later_runs.load(Ordering::SeqCst), 0);
    assert!(orchestrator.state().is_running());
}

#[tokio::test]
async fn test_into_stream_owns_the_run() {
    let orchestrator = Orchestrator::new(request("Hej"), vec![ChunkStep::new("a", 1)]);

    let handle = tokio::spawn(async move { orchestrator.into_stream().collect::<Vec<String>>().await });
    let records = handle.await.unwrap();

    assert_eq!(records.len(), 5);
    assert!(records[4].contains("\"stream_end\""));
}
