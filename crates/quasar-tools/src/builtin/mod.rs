// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod fs_ops;
pub mod list_files;
pub mod patch_file;
pub mod read_file;
pub mod search;
pub mod terminal;
pub mod web;
pub mod write_file;

use std::ffi::OsStr;
use std::sync::Arc;

use quasar_config::AgentSettings;

use crate::registry::ToolRegistry;
use crate::workspace::Workspace;

pub use fs_ops::{DeleteFileTool, MoveFileTool};
pub use list_files::{ListFilesTool, TreeListTool};
pub use patch_file::PatchFileTool;
pub use read_file::{ReadFileChunkTool, ReadFileTool};
pub use search::{GrepSearchTool, SearchFilesTool};
pub use terminal::{
    CheckCommandAvailableTool, ClearTerminalBufferTool, GetTerminalBufferTool,
    RunPackageCommandTool, RunScriptFileTool, RunTerminalCommandTool, SuggestCommandTool,
    TerminalBuffer,
};
pub use web::{BrowseInteractiveTool, ReadUrlTool, WebSearchTool};

/// Directories skipped by every listing/search tool.
pub(crate) fn is_ignored_dir(name: &OsStr) -> bool {
    matches!(
        name.to_str(),
        Some(".git" | "__pycache__" | "node_modules" | ".venv" | "venv" | "target" | ".editor")
    )
}

/// Web-provider configuration for the search tools.
#[derive(Debug, Clone, Default)]
pub struct WebToolSettings {
    pub tavily_api_key: Option<String>,
    pub searx_host: Option<String>,
}

/// Register the full builtin tool set for a workspace.
pub fn build_registry(
    workspace: Arc<Workspace>,
    settings: &AgentSettings,
    web: WebToolSettings,
) -> ToolRegistry {
    let buffer = TerminalBuffer::new();
    let mut registry = ToolRegistry::new();

    // Read-only file tools
    registry.register(ReadFileTool { workspace: workspace.clone() });
    registry.register(ReadFileChunkTool { workspace: workspace.clone() });
    registry.register(ListFilesTool { workspace: workspace.clone() });
    registry.register(TreeListTool { workspace: workspace.clone() });
    registry.register(SearchFilesTool { workspace: workspace.clone() });
    registry.register(GrepSearchTool { workspace: workspace.clone() });

    // Write tools
    registry.register(write_file::CreateFileTool { workspace: workspace.clone() });
    registry.register(write_file::ModifyFileTool { workspace: workspace.clone() });
    registry.register(PatchFileTool { workspace: workspace.clone() });
    registry.register(DeleteFileTool { workspace: workspace.clone() });
    registry.register(MoveFileTool { workspace: workspace.clone() });

    // Terminal tools
    registry.register(SuggestCommandTool);
    registry.register(RunTerminalCommandTool {
        workspace: workspace.clone(),
        buffer: buffer.clone(),
        default_timeout_secs: settings.tool_timeout.as_secs(),
    });
    registry.register(RunScriptFileTool { workspace: workspace.clone(), buffer: buffer.clone() });
    registry.register(RunPackageCommandTool { workspace, buffer: buffer.clone() });
    registry.register(GetTerminalBufferTool { buffer: buffer.clone() });
    registry.register(ClearTerminalBufferTool { buffer });
    registry.register(CheckCommandAvailableTool);

    // Web tools
    registry.register(WebSearchTool {
        tavily_api_key: web.tavily_api_key,
        searx_host: web.searx_host,
    });
    registry.register(ReadUrlTool);
    registry.register(BrowseInteractiveTool::new());

    registry
}
