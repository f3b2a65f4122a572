// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! System prompt assembly: a task-agnostic preamble, per-task guidance, the
//! tool-usage block (for tool-enabled tasks) and the standing rules the
//! agent always follows.

use quasar_config::TaskType;

const BASE_PROMPT: &str = "You are an expert AI coding assistant in a code editor.\n\
     You help users write, understand, debug, and improve code.\n\
     Be concise, accurate, and helpful.";

const TOOL_INSTRUCTIONS: &str = "\n\nYou have access to tools to help complete the user's request.\n\
     Use tools when needed to read files, create or modify files, run \
     commands, or search for code patterns.\n\n\
     When using tools:\n\
     1. Think about what you need before calling tools\n\
     2. Use the appropriate tool for the task\n\
     3. Analyze tool results before responding\n\
     4. If a tool fails, try an alternative approach\n\
     5. Provide a clear final response after completing tool operations\n\n\
     IMPORTANT - TERMINAL COMMANDS:\n\
     - BY DEFAULT, use suggest_command so the user can run commands manually\n\
     - ONLY use run_terminal_command if the user EXPLICITLY asks you to run or execute something\n\
     - For package installs, ALWAYS use suggest_command unless the user says \"install for me\"\n\n\
     After completing all necessary tool operations, provide your final response to the user.";

const IMPLICIT_RULES: &str = "\n\nSTANDING RULES:\n\
     - Before any tool call, explain what you are about to do and why; after \
       it, share what you observed. The user should never wonder what is happening.\n\
     - Work on ONE sub-task at a time. After each sub-task, pause and report \
       instead of completing a whole project in one go.\n\
     - For existing files, prefer patch_file for targeted edits over \
       rewriting the whole file with create_file or modify_file.\n\
     - Suggest commands for the user to run rather than executing them, \
       unless execution was explicitly requested.\n\
     - Never run the same failing command more than twice; explain the error \
       and ask for guidance instead.\n\
     - For any multi-step or multi-file project, maintain a Tasks.md at the \
       workspace root: read it first, keep its checkboxes current with patch_file.\n\
     - If read_file reports is_large_file, read the sections you need with \
       read_file_chunk instead of the whole file.\n\
     - If a file is not found, look for likely alternatives with list_files \
       before giving up.";

fn task_guidance(task: TaskType) -> &'static str {
    match task {
        TaskType::Chat => {
            "\nAnswer the user's question clearly and concisely.\n\
             If it's about code, provide examples when helpful."
        }
        TaskType::CodeExplainSimple => {
            "\nExplain the provided code clearly.\n\
             Break down what each part does.\n\
             Highlight important patterns or potential issues."
        }
        TaskType::CodeExplainComplex => {
            "\nProvide a comprehensive explanation of the code and architecture.\n\
             Explain the overall design and how components interact.\n\
             Discuss trade-offs and design decisions."
        }
        TaskType::CodeGeneration => {
            "\nGenerate clean, well-documented code.\n\
             Follow best practices for the language.\n\
             Make sure the code is complete and runnable."
        }
        TaskType::CodeGenerationMulti => {
            "\nGenerate complete, production-ready code.\n\
             Create all necessary files with proper structure.\n\
             Ensure all imports and dependencies are correct.\n\
             Include proper error handling."
        }
        TaskType::BugFixing => {
            "\nAnalyze the error and identify the root cause.\n\
             Explain what's wrong and why.\n\
             Provide a corrected version of the code.\n\
             Suggest how to prevent similar issues."
        }
        TaskType::Refactor => {
            "\nImprove the code while preserving functionality.\n\
             Apply best practices and design patterns.\n\
             Explain each improvement you make."
        }
        TaskType::Architecture => {
            "\nProvide thoughtful architectural advice.\n\
             Consider scalability, maintainability, and best practices.\n\
             Explain trade-offs of different approaches.\n\
             Give concrete recommendations."
        }
        TaskType::TestGeneration => {
            "\nGenerate comprehensive tests for the code.\n\
             Cover edge cases and error conditions.\n\
             Use the appropriate testing framework."
        }
        TaskType::Documentation => {
            "\nWrite clear, helpful documentation.\n\
             Follow standard conventions for the format.\n\
             Be thorough but concise. Include examples where helpful."
        }
        TaskType::Research => {
            "\nResearch the question using the available information.\n\
             Cite the sources you relied on.\n\
             Distinguish facts from recommendations."
        }
    }
}

/// The system prompt demanding a structured progress summary, injected when
/// only one loop iteration remains.
pub const SUMMARY_DEMAND: &str = "[SYSTEM: CRITICAL RESOURCE LIMIT]\n\
     Only 1 tool iteration remaining!\n\
     You MUST include a \"PROGRESS SUMMARY\" block in your response:\n\
     - WHAT IS DONE: (list completed steps)\n\
     - WHAT IS PENDING: (list remaining steps)\n\
     - CONTINUATION DATA: (briefly describe current state for the next session)\n\
     Provide this summary NOW; this is your last chance to respond.";

/// Compose the full system prompt for a task.
pub fn build_system_prompt(task: TaskType, tools_enabled: bool) -> String {
    let mut prompt = String::from(BASE_PROMPT);
    prompt.push_str(task_guidance(task));
    if tools_enabled {
        prompt.push_str(TOOL_INSTRUCTIONS);
    }
    prompt.push_str(IMPLICIT_RULES);
    prompt
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_task_gets_guidance() {
        for t in TaskType::ALL {
            let p = build_system_prompt(t, false);
            assert!(p.len() > BASE_PROMPT.len(), "{t} has no guidance block");
        }
    }

    #[test]
    fn tool_block_only_for_tool_enabled() {
        let with = build_system_prompt(TaskType::BugFixing, true);
        let without = build_system_prompt(TaskType::Chat, false);
        assert!(with.contains("suggest_command"));
        assert!(!without.contains("run_terminal_command"));
    }

    #[test]
    fn standing_rules_are_always_present() {
        let p = build_system_prompt(TaskType::Chat, false);
        assert!(p.contains("STANDING RULES"));
        assert!(p.contains("patch_file"));
        assert!(p.contains("Tasks.md"));
        assert!(p.contains("read_file_chunk"));
    }

    #[test]
    fn summary_demand_asks_for_progress_block() {
        assert!(SUMMARY_DEMAND.contains("PROGRESS SUMMARY"));
        assert!(SUMMARY_DEMAND.contains("WHAT IS PENDING"));
    }
}
