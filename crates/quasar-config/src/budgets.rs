// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use crate::schema::TaskType;

/// Per-task character allowances for the assembled context layers.
///
/// `total` is the overall guideline; the layer values cap the individual
/// sections.  The permanent layer is never truncated below its rendered
/// size; its allowance exists so the totals add up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    pub permanent: usize,
    pub task: usize,
    pub summary: usize,
    pub total: usize,
}

/// Budget lookup.  Unknown tasks use the chat row.
pub fn budget_for(task: TaskType) -> TokenBudget {
    let (permanent, task_chars, summary, total) = match task {
        TaskType::Chat => (100, 200, 100, 400),
        TaskType::CodeExplainSimple => (100, 1000, 200, 1300),
        TaskType::CodeExplainComplex => (100, 2000, 400, 2500),
        TaskType::CodeGeneration => (100, 1500, 300, 1900),
        TaskType::CodeGenerationMulti => (100, 3000, 500, 3600),
        TaskType::BugFixing => (100, 1500, 300, 1900),
        TaskType::Refactor => (100, 2000, 400, 2500),
        TaskType::Architecture => (100, 2000, 400, 2500),
        TaskType::TestGeneration => (100, 1500, 300, 1900),
        TaskType::Documentation => (100, 1000, 200, 1300),
        TaskType::Research => (100, 2000, 400, 2500),
    };
    TokenBudget {
        permanent,
        task: task_chars,
        summary,
        total,
    }
}
