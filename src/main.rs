// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use quasar_config::{loader, AgentConfig};
use quasar_core::{AgentEvent, AgentRequest, Orchestrator};
use quasar_model::{CredentialStore, ModelRouter};
use quasar_server::AppState;
use quasar_tools::WebToolSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let env = loader::load_env();
    let mut config = AgentConfig::new();
    loader::apply_env(&mut config, &env);
    let config = Arc::new(config);
    let credentials = Arc::new(CredentialStore::from_env(&env));
    let router = Arc::new(ModelRouter::new(config.clone(), credentials.clone()));
    let web = WebToolSettings {
        tavily_api_key: env.tavily_api_key.clone(),
        searx_host: env.searx_host.clone(),
    };

    let workspace = match std::fs::canonicalize(&cli.workspace) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("error: workspace {:?} is not usable: {e}", cli.workspace);
            std::process::exit(1);
        }
    };

    let remote_providers: Vec<String> = router
        .available_providers(None)
        .into_iter()
        .filter(|p| p != "ollama")
        .collect();
    if remote_providers.is_empty() {
        eprintln!(
            "note: no cloud provider credentials found; only the local \
             Ollama endpoint will be used"
        );
    }

    let mut orchestrator =
        Orchestrator::new(router, workspace.to_string_lossy().as_ref(), web);

    match cli.command {
        Some(Commands::Serve { addr }) => {
            let state = AppState::new(orchestrator);
            quasar_server::serve(state, &addr).await
        }
        None if cli.interactive => run_repl(&mut orchestrator, cli.model).await,
        None => match cli.query {
            Some(query) => {
                let ok = run_turn(&mut orchestrator, query, cli.model.clone()).await;
                if !ok {
                    std::process::exit(1);
                }
                Ok(())
            }
            None => {
                eprintln!("error: provide a query, --interactive, or the serve subcommand");
                std::process::exit(1);
            }
        },
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "quasar=debug,info" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("QUASAR_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Run one turn, printing events as they stream.  Returns `false` when the
/// turn ended with a terminal error event.
async fn run_turn(
    orchestrator: &mut Orchestrator,
    query: String,
    selected_model: Option<String>,
) -> bool {
    let mut req = AgentRequest::query(query);
    req.selected_model = selected_model;

    let (tx, mut rx) = mpsc::channel(256);
    let printer = async move {
        let mut ok = true;
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::Classification { task_type, confidence } => {
                    eprintln!("[task: {task_type} ({confidence:.2})]");
                }
                AgentEvent::Message { content } => eprintln!("- {content}"),
                AgentEvent::ToolStart { tool, .. } => eprintln!("> {tool}"),
                AgentEvent::IterationWarning { message, .. } => eprintln!("! {message}"),
                AgentEvent::Token { content } => {
                    print!("{content}");
                    let _ = std::io::stdout().flush();
                }
                AgentEvent::Done { provider, model, iterations, tool_calls_count, .. } => {
                    println!();
                    eprintln!(
                        "[{provider}/{model}: {iterations} iteration(s), \
                         {tool_calls_count} tool call(s)]"
                    );
                }
                AgentEvent::Error { message } => {
                    eprintln!("error: {message}");
                    ok = false;
                }
                _ => {}
            }
        }
        ok
    };

    let ((), ok) = tokio::join!(orchestrator.process_stream(req, tx, None), printer);
    ok
}

async fn run_repl(
    orchestrator: &mut Orchestrator,
    selected_model: Option<String>,
) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    let history_path = dirs::home_dir().map(|h| h.join(".quasar_history"));
    if let Some(path) = &history_path {
        let _ = editor.load_history(path);
    }

    eprintln!("quasar interactive session. Type 'exit' to quit.");
    loop {
        match editor.readline("quasar> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    break;
                }
                let _ = editor.add_history_entry(line);
                run_turn(orchestrator, line.to_string(), selected_model.clone()).await;
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }
    Ok(())
}
