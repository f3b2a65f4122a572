// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! End-to-end scenarios through the orchestrator with scripted model
//! providers: no network, real filesystem tools in a temp workspace.
use std::sync::Arc;

use quasar_config::{AgentConfig, EnvCredentials, TaskType};
use quasar_core::{AgentEvent, AgentRequest, Orchestrator};
use quasar_model::{
    ChatModel, CredentialStore, MockScript, ModelRouter, ResponseEvent, ScriptedMockProvider,
};
use quasar_tools::WebToolSettings;
use tokio::sync::mpsc;

type Factory = Box<
    dyn Fn(
            &str,
            &quasar_config::ModelConfig,
            Option<&str>,
            Option<&str>,
        ) -> anyhow::Result<Arc<dyn ChatModel>>
        + Send
        + Sync,
>;

fn orchestrator_with_scripts(
    scripts: Vec<MockScript>,
) -> (tempfile::TempDir, Orchestrator) {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(AgentConfig::new());
    let store = Arc::new(CredentialStore::from_env(&EnvCredentials::default()));
    let factory: Factory = Box::new(move |provider, _cfg, _cred, _url| match provider {
        "ollama" => Ok(Arc::new(
            ScriptedMockProvider::new(scripts.clone()).for_provider("ollama"),
        ) as Arc<dyn ChatModel>),
        other => anyhow::bail!("unexpected provider in test: {other}"),
    });
    let router = Arc::new(ModelRouter::with_factory(config, store, factory));
    let orch = Orchestrator::new(
        router,
        dir.path().to_str().unwrap(),
        WebToolSettings::default(),
    );
    (dir, orch)
}

async fn run(orch: &mut Orchestrator, req: AgentRequest) -> Vec<AgentEvent> {
    let (tx, mut rx) = mpsc::channel(512);
    let collect = async move {
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        events
    };
    let ((), events) = tokio::join!(orch.process_stream(req, tx, None), collect);
    events
}

fn tool_call(name: &str, args: &str) -> MockScript {
    MockScript::Events(vec![
        ResponseEvent::ToolCall {
            index: 0,
            id: format!("c-{name}"),
            name: name.to_string(),
            arguments: args.to_string(),
        },
        ResponseEvent::Done,
    ])
}

fn final_text(text: &str) -> MockScript {
    MockScript::Events(vec![
        ResponseEvent::TextDelta(text.to_string()),
        ResponseEvent::Done,
    ])
}

/// A file over the 2000-line threshold is first refused with metadata; the
/// model then reads a chunk and answers from it.
#[tokio::test]
async fn large_file_is_read_in_chunks() {
    let (dir, mut orch) = orchestrator_with_scripts(vec![
        tool_call("read_file", r#"{"path": "big.py"}"#),
        tool_call("read_file_chunk", r#"{"path": "big.py", "start_line": 1, "end_line": 500}"#),
        final_text("big.py starts with a module docstring on line 1."),
    ]);

    let big: String = (1..=3000).map(|i| format!("# line {i}\n")).collect();
    std::fs::write(dir.path().join("big.py"), &big).unwrap();

    let events = run(&mut orch, AgentRequest::query("Explain big.py structure")).await;

    let results: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ToolComplete { result, .. } => Some(result.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(results.len(), 2);
    // First read refused with metadata only.
    assert!(results[0].contains("\"is_large_file\": true"));
    assert!(!results[0].contains("# line 1\n"));
    // Chunked read carries real content and range flags.
    assert!(results[1].contains("# line 500"));
    assert!(results[1].contains("\"has_more_after\": true"));

    match events.last() {
        Some(AgentEvent::Done { tool_calls_count, iterations, .. }) => {
            assert_eq!(*tool_calls_count, 2);
            assert_eq!(*iterations, 3);
        }
        other => panic!("expected done, got {other:?}"),
    }
}

/// Tool errors come back as tool messages and the loop keeps going: the
/// model can recover and finish.
#[tokio::test]
async fn sandbox_violation_fails_the_call_but_not_the_loop() {
    let (_dir, mut orch) = orchestrator_with_scripts(vec![
        tool_call("read_file", r#"{"path": "../outside.txt"}"#),
        final_text("That path is outside the workspace, so I cannot read it."),
    ]);

    let events = run(&mut orch, AgentRequest::query("Explain ../outside.txt please")).await;

    let tool_result = events
        .iter()
        .find_map(|e| match e {
            AgentEvent::ToolComplete { result, .. } => Some(result.clone()),
            _ => None,
        })
        .expect("tool must have completed");
    assert!(tool_result.contains("traversal"));

    match events.last() {
        Some(AgentEvent::Done { iterations, .. }) => assert_eq!(*iterations, 2),
        other => panic!("expected done, got {other:?}"),
    }
}

/// The full create-then-verify round trip: the file written by the tool is
/// exactly what a later read returns.
#[tokio::test]
async fn create_then_read_round_trip() {
    let content = "def greet():\n    print(\"hi\")\n";
    let (dir, mut orch) = orchestrator_with_scripts(vec![
        tool_call(
            "create_file",
            &format!(r#"{{"path": "greet.py", "content": {}}}"#, serde_json::json!(content)),
        ),
        tool_call("read_file", r#"{"path": "greet.py"}"#),
        final_text("greet.py is in place."),
    ]);

    let events = run(&mut orch, AgentRequest::query("Create greet.py with a greet function")).await;

    assert_eq!(std::fs::read_to_string(dir.path().join("greet.py")).unwrap(), content);
    let read_back = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ToolComplete { tool, result } if tool == "read_file" => {
                Some(result.clone())
            }
            _ => None,
        })
        .next()
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&read_back).unwrap();
    assert_eq!(parsed["content"], content);

    // Session memory picked up the created file.
    assert!(orch
        .context()
        .session()
        .files_created
        .contains(&"greet.py".to_string()));
}

/// Event-ordering invariant across a multi-tool run: classification first,
/// every tool_start paired with a following tool_complete, terminal done.
#[tokio::test]
async fn event_stream_obeys_causal_order() {
    let (_dir, mut orch) = orchestrator_with_scripts(vec![
        tool_call("list_files", r#"{"path": "."}"#),
        tool_call("create_file", r#"{"path": "notes.md", "content": "hello\n"}"#),
        final_text("All set."),
    ]);

    let events = run(&mut orch, AgentRequest::query("Create notes.md after checking the tree")).await;

    assert!(matches!(events.first(), Some(AgentEvent::Classification { .. })));
    assert!(matches!(events.last(), Some(AgentEvent::Done { .. })));

    let mut open_tools = 0i32;
    let mut starts = 0;
    let mut completes = 0;
    for ev in &events {
        match ev {
            AgentEvent::ToolStart { .. } => {
                open_tools += 1;
                starts += 1;
            }
            AgentEvent::ToolComplete { .. } => {
                open_tools -= 1;
                completes += 1;
                assert!(open_tools >= 0, "tool_complete before its tool_start");
            }
            _ => {}
        }
    }
    assert_eq!(starts, completes);
    assert_eq!(starts, 2);

    // The iteration counter never exceeds the configured maximum.
    let max = AgentConfig::new().settings.max_tool_iterations;
    for ev in &events {
        if let AgentEvent::Iteration { current, .. } = ev {
            assert!(*current <= max);
        }
    }
}

/// Classification is surfaced to the client before any loop activity, and a
/// bug-shaped query routes to bug_fixing even with no context at all.
#[tokio::test]
async fn bug_query_classifies_without_context() {
    let (_dir, mut orch) = orchestrator_with_scripts(vec![final_text(
        "The NameError means the variable is undefined.",
    )]);

    let events = run(&mut orch, AgentRequest::query("Fix the NameError on line 10")).await;

    match events.first() {
        Some(AgentEvent::Classification { task_type, .. }) => {
            assert_eq!(*task_type, TaskType::BugFixing);
        }
        other => panic!("expected classification first, got {other:?}"),
    }
}
