// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod executor;
pub mod registry;
pub mod tool;
pub mod workspace;

pub use builtin::{build_registry, TerminalBuffer, WebToolSettings};
pub use executor::{ExecutionRecord, ExecutionSummary, ToolExecutor};
pub use registry::ToolRegistry;
pub use tool::{OutputCategory, Tool, ToolCall, ToolOutput};
pub use workspace::{detect_language, SandboxError, Workspace};
