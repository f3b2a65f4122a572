// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Task classification.
//!
//! The orchestrator asks a fast cloud model to classify the query and parses
//! the JSON it returns.  Models wrap their answers in reasoning blocks and
//! code fences often enough that the parser peels those off before falling
//! back to a brace-balanced extraction.  When no model is reachable or
//! nothing parses, a keyword classifier takes over.

use serde::{Deserialize, Serialize};

use quasar_config::TaskType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Default for Complexity {
    fn default() -> Self {
        Complexity::Low
    }
}

fn default_confidence() -> f32 {
    0.8
}

fn default_task_type() -> TaskType {
    TaskType::Chat
}

/// Result of classifying one user query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskClassification {
    /// Missing field defaults to chat; an *invalid* value fails the parse so
    /// the keyword fallback runs instead.
    #[serde(default = "default_task_type")]
    pub task_type: TaskType,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub requires_file_context: bool,
    #[serde(default)]
    pub requires_terminal: bool,
    #[serde(default)]
    pub estimated_complexity: Complexity,
    #[serde(default)]
    pub reasoning: String,
}

/// Build the classification prompt for the given query and context snapshot.
pub fn classification_prompt(
    query: &str,
    current_file: Option<&str>,
    has_selection: bool,
    has_error: bool,
) -> String {
    format!(
        r#"You are a task classifier for an AI code editor.
Classify the user's query into one of these task types:

1. chat - Simple Q&A, general questions, greetings
2. code_explain_simple - Explain a small piece of code (<100 lines)
3. code_explain_complex - Explain large code, architecture, design patterns
4. code_generation - Generate a single function, class, or small module
5. code_generation_multi - Generate multiple files / complete features
6. bug_fixing - Debug errors, fix bugs, resolve issues (KEYWORDS: error, bug, fix, debug, exception, NameError, TypeError, ...)
7. refactor - Improve code quality, apply best practices
8. architecture - System design, architecture decisions
9. test_generation - Write tests for code
10. documentation - Write docstrings, README, docs
11. research - Look up external information, libraries, documentation

IMPORTANT RULES:
- PRIORITIZE keywords in the user's query over context
- If the query contains "error", "bug", "fix", "debug" or ANY exception name, classify as bug_fixing
- If the query contains "create", "generate", "write", "build", classify as code_generation
- If the query contains "explain", "what does", "how does", classify as code_explain_*
- ONLY use the provided context; do NOT invent file names or code
- Be concise in reasoning

User query: {query}

Context (use only if relevant):
- Current file: {current_file}
- Has selection: {has_selection}
- Has error in terminal: {has_error}

Respond with JSON only:
{{
    "task_type": "<task type>",
    "confidence": <0.0-1.0>,
    "requires_file_context": <true/false>,
    "requires_terminal": <true/false>,
    "estimated_complexity": "<low/medium/high>",
    "reasoning": "<brief explanation based ONLY on query keywords>"
}}"#,
        query = query,
        current_file = current_file.unwrap_or("None"),
        has_selection = has_selection,
        has_error = has_error,
    )
}

/// Parse a model's classification response.
///
/// Accepts a bare JSON object, an object wrapped in a code fence, or an
/// object embedded in a reasoning prelude.  `<think>...</think>` blocks are
/// stripped first.  Fails (rather than guessing) on an unknown task type.
pub fn parse_classification(raw: &str) -> anyhow::Result<TaskClassification> {
    let mut content = raw;

    // Reasoning models put their chain of thought before the JSON.
    if let Some(pos) = content.rfind("</think>") {
        content = &content[pos + "</think>".len()..];
    }

    let fenced;
    if let Some(start) = content.find("```json") {
        let rest = &content[start + 7..];
        fenced = rest.split("```").next().unwrap_or(rest).to_string();
        content = &fenced;
    } else if let Some(start) = content.find("```") {
        let rest = &content[start + 3..];
        fenced = rest.split("```").next().unwrap_or(rest).to_string();
        content = &fenced;
    }

    let trimmed = content.trim();
    if let Ok(parsed) = serde_json::from_str::<TaskClassification>(trimmed) {
        return Ok(parsed);
    }

    // Last resort: find the first top-level `{...}` by balancing braces.
    let candidate = extract_balanced_object(trimmed)
        .ok_or_else(|| anyhow::anyhow!("no JSON object found in classification response"))?;
    Ok(serde_json::from_str::<TaskClassification>(&candidate)?)
}

/// Extract the first balanced `{...}` from `text`, ignoring braces inside
/// JSON strings.
fn extract_balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + c.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Keyword-rule classifier, used when no model is reachable or the JSON
/// cannot be parsed.  Precedence: bugs, then multi-file generation, then
/// generation, explanation, refactoring, testing, and finally chat.
pub fn keyword_classification(query: &str) -> TaskClassification {
    let q = query.to_lowercase();
    let contains_any = |kws: &[&str]| kws.iter().any(|kw| q.contains(kw));

    if contains_any(&["error", "bug", "fix", "debug", "traceback", "exception"]) {
        return TaskClassification {
            task_type: TaskType::BugFixing,
            confidence: 0.7,
            requires_file_context: true,
            requires_terminal: true,
            estimated_complexity: Complexity::Medium,
            reasoning: "Detected error/bug-related keywords".into(),
        };
    }

    if contains_any(&["create", "generate", "write", "make", "build"]) {
        if contains_any(&["complete", "full", "entire", "system", "application"]) {
            return TaskClassification {
                task_type: TaskType::CodeGenerationMulti,
                confidence: 0.7,
                requires_file_context: true,
                requires_terminal: true,
                estimated_complexity: Complexity::High,
                reasoning: "Detected multi-file generation keywords".into(),
            };
        }
        return TaskClassification {
            task_type: TaskType::CodeGeneration,
            confidence: 0.7,
            requires_file_context: true,
            requires_terminal: false,
            estimated_complexity: Complexity::Medium,
            reasoning: "Detected code generation keywords".into(),
        };
    }

    if contains_any(&["explain", "what does", "how does", "understand"]) {
        return TaskClassification {
            task_type: TaskType::CodeExplainSimple,
            confidence: 0.7,
            requires_file_context: true,
            requires_terminal: false,
            estimated_complexity: Complexity::Low,
            reasoning: "Detected explanation keywords".into(),
        };
    }

    if contains_any(&["refactor", "improve", "optimize", "clean"]) {
        return TaskClassification {
            task_type: TaskType::Refactor,
            confidence: 0.7,
            requires_file_context: true,
            requires_terminal: false,
            estimated_complexity: Complexity::Medium,
            reasoning: "Detected refactoring keywords".into(),
        };
    }

    if contains_any(&["test", "unittest", "pytest"]) {
        return TaskClassification {
            task_type: TaskType::TestGeneration,
            confidence: 0.7,
            requires_file_context: true,
            requires_terminal: false,
            estimated_complexity: Complexity::Medium,
            reasoning: "Detected testing keywords".into(),
        };
    }

    TaskClassification {
        task_type: TaskType::Chat,
        confidence: 0.5,
        requires_file_context: false,
        requires_terminal: false,
        estimated_complexity: Complexity::Low,
        reasoning: "No specific keywords detected, defaulting to chat".into(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let raw = r#"{"task_type": "bug_fixing", "confidence": 0.95, "estimated_complexity": "high"}"#;
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.task_type, TaskType::BugFixing);
        assert_eq!(c.estimated_complexity, Complexity::High);
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "Here you go:\n```json\n{\"task_type\": \"refactor\"}\n```\nthanks";
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.task_type, TaskType::Refactor);
        assert_eq!(c.confidence, 0.8, "missing confidence uses the default");
    }

    #[test]
    fn strips_think_block() {
        let raw = "<think>\nhmm, the user mentions a crash...\n</think>\n{\"task_type\": \"bug_fixing\"}";
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.task_type, TaskType::BugFixing);
    }

    #[test]
    fn extracts_object_from_prose_prelude() {
        let raw = "Sure! Based on the keywords I would say {\"task_type\": \"test_generation\", \"reasoning\": \"mentions pytest\"} — done.";
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.task_type, TaskType::TestGeneration);
    }

    #[test]
    fn balanced_extraction_ignores_braces_in_strings() {
        let raw = r#"note {"task_type": "chat", "reasoning": "user wrote {hello}"} trailing"#;
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.reasoning, "user wrote {hello}");
    }

    #[test]
    fn unknown_task_type_is_rejected() {
        let raw = r#"{"task_type": "world_domination"}"#;
        assert!(parse_classification(raw).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_classification("no json here at all").is_err());
    }

    #[test]
    fn missing_task_type_defaults_to_chat() {
        let c = parse_classification(r#"{"confidence": 0.4}"#).unwrap();
        assert_eq!(c.task_type, TaskType::Chat);
    }

    #[test]
    fn keyword_fallback_detects_bug_fixing() {
        let c = keyword_classification("Fix the NameError on line 10");
        assert_eq!(c.task_type, TaskType::BugFixing);
        assert!(c.requires_terminal);
    }

    #[test]
    fn keyword_fallback_detects_multi_file_generation() {
        let c = keyword_classification("Build a complete todo application");
        assert_eq!(c.task_type, TaskType::CodeGenerationMulti);
        assert_eq!(c.estimated_complexity, Complexity::High);
    }

    #[test]
    fn keyword_fallback_single_file_generation() {
        let c = keyword_classification("Write a function that sorts a list");
        assert_eq!(c.task_type, TaskType::CodeGeneration);
    }

    #[test]
    fn bug_keywords_take_precedence_over_generation() {
        let c = keyword_classification("Create a fix for this error");
        assert_eq!(c.task_type, TaskType::BugFixing);
    }

    #[test]
    fn keyword_fallback_defaults_to_chat() {
        let c = keyword_classification("What is a B-tree?");
        assert_eq!(c.task_type, TaskType::Chat);
        assert_eq!(c.confidence, 0.5);
    }

    #[test]
    fn prompt_embeds_query_and_context() {
        let p = classification_prompt("fix it", Some("a.py"), true, false);
        assert!(p.contains("User query: fix it"));
        assert!(p.contains("Current file: a.py"));
        assert!(p.contains("Has selection: true"));
    }
}
