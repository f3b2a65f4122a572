// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "quasar",
    version,
    about = "Agentic code assistant: classify, route, and run tool-calling model loops"
)]
pub struct Cli {
    /// One-shot query; omit together with --interactive to see this help
    pub query: Option<String>,

    /// Workspace directory the agent operates in
    #[arg(long, default_value = ".")]
    pub workspace: String,

    /// Pin a model as provider/model_key (e.g. "groq/versatile"); disables
    /// cross-provider fallback
    #[arg(long)]
    pub model: Option<String>,

    /// Start an interactive REPL
    #[arg(long, short)]
    pub interactive: bool,

    /// Verbose logging to stderr
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP/SSE server
    Serve {
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: String,
    },
}
