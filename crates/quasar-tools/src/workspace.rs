// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The workspace path sandbox.
//!
//! Every file tool resolves its path argument through [`Workspace::resolve`]
//! before touching the filesystem.  Arguments carrying `..` and resolved
//! paths that escape the workspace root are rejected up front, so no I/O
//! ever happens outside the sandbox.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("path traversal (..) not allowed")]
    Traversal,
    #[error("path must be within workspace: {workspace}")]
    OutsideWorkspace { workspace: PathBuf },
}

/// Handle on the sandbox root shared by all file tools.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        // Canonicalise so symlinked roots (/tmp on macOS) compare correctly.
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool path argument to an absolute path inside the
    /// workspace.  Relative paths are joined onto the root; absolute paths
    /// must already be descendants of it.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, SandboxError> {
        let candidate = Path::new(path);
        if candidate.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(SandboxError::Traversal);
        }

        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        // Lexical normalisation: the target may not exist yet (create_file),
        // so canonicalize() is not an option here.
        let mut normalized = PathBuf::new();
        for comp in joined.components() {
            match comp {
                Component::CurDir => {}
                other => normalized.push(other),
            }
        }

        if !normalized.starts_with(&self.root) {
            return Err(SandboxError::OutsideWorkspace { workspace: self.root.clone() });
        }
        Ok(normalized)
    }

    /// Workspace-relative display form of an absolute path.
    pub fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

/// Detect the programming language from a file extension.
pub fn detect_language(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "py" => "python",
        "js" => "javascript",
        "ts" => "typescript",
        "jsx" => "jsx",
        "tsx" => "tsx",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "md" => "markdown",
        "yaml" | "yml" => "yaml",
        "xml" => "xml",
        "sql" => "sql",
        "sh" => "bash",
        "java" => "java",
        "cpp" | "cc" => "cpp",
        "c" | "h" => "c",
        "go" => "go",
        "rs" => "rust",
        "rb" => "ruby",
        "php" => "php",
        "toml" => "toml",
        _ => "text",
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ws() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        (dir, ws)
    }

    #[test]
    fn relative_path_resolves_inside_root() {
        let (_dir, ws) = ws();
        let resolved = ws.resolve("src/main.py").unwrap();
        assert!(resolved.starts_with(ws.root()));
        assert!(resolved.ends_with("src/main.py"));
    }

    #[test]
    fn parent_dir_component_is_rejected() {
        let (_dir, ws) = ws();
        assert!(matches!(ws.resolve("../escape.txt"), Err(SandboxError::Traversal)));
        assert!(matches!(ws.resolve("a/../../b"), Err(SandboxError::Traversal)));
    }

    #[test]
    fn absolute_path_outside_root_is_rejected() {
        let (_dir, ws) = ws();
        assert!(matches!(
            ws.resolve("/etc/passwd"),
            Err(SandboxError::OutsideWorkspace { .. })
        ));
    }

    #[test]
    fn absolute_path_inside_root_is_accepted() {
        let (_dir, ws) = ws();
        let inside = ws.root().join("ok.txt");
        let resolved = ws.resolve(inside.to_str().unwrap()).unwrap();
        assert_eq!(resolved, inside);
    }

    #[test]
    fn curdir_components_are_dropped() {
        let (_dir, ws) = ws();
        let resolved = ws.resolve("./a/./b.txt").unwrap();
        assert!(resolved.ends_with("a/b.txt"));
    }

    #[test]
    fn rejection_happens_before_io() {
        // The target does not exist; rejection must come from path logic
        // alone, never from a filesystem probe.
        let (_dir, ws) = ws();
        let err = ws.resolve("../no/such/file").unwrap_err();
        assert!(matches!(err, SandboxError::Traversal));
    }

    #[test]
    fn display_strips_the_root() {
        let (_dir, ws) = ws();
        let abs = ws.resolve("nested/file.rs").unwrap();
        assert_eq!(ws.display(&abs), "nested/file.rs");
    }

    #[test]
    fn language_detection_covers_common_extensions() {
        assert_eq!(detect_language("main.py"), "python");
        assert_eq!(detect_language("lib.rs"), "rust");
        assert_eq!(detect_language("index.html"), "html");
        assert_eq!(detect_language("notes"), "text");
        assert_eq!(detect_language("config.YAML"), "yaml");
    }
}
