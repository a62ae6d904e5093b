//! `scan_pattern`: static-pattern scanner over the application's files.
//!
//! Walks files selected by a glob under an allowed root and reports every line
//! matching a regular expression as a finding.

use std::path::{Component, Path, PathBuf};

use regex::RegexBuilder;
use serde_json::{json, Map, Value};

use super::{optional_str, required_str};
use crate::error::ToolError;
use crate::mcp::envelope::{Envelope, Status};
use crate::mcp::Tool;

pub(super) const NAME: &str = "scan_pattern";

const DEFAULT_GLOB: &str = "**/*";
const DEFAULT_MAX_RESULTS: u64 = 100;
const MAX_RESULTS_LIMIT: u64 = 1000;
const MAX_SNIPPET_CHARS: usize = 200;

/// Restricts file access to a set of root directories.
#[derive(Debug, Clone)]
pub struct PathGuard {
    allowed_paths: Vec<PathBuf>,
}

impl PathGuard {
    /// Creates a guard over `allowed_paths`. An empty list allows everything.
    #[must_use]
    pub const fn new(allowed_paths: Vec<PathBuf>) -> Self {
        Self { allowed_paths }
    }

    /// The first allowed path, used when a caller names no root.
    #[must_use]
    pub fn default_root(&self) -> PathBuf {
        self.allowed_paths
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolves `path` and checks that it lies within an allowed path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArguments` if the path cannot be resolved or is outside
    /// every allowed path.
    pub fn check(&self, path: &Path) -> Result<PathBuf, ToolError> {
        let canonical = path.canonicalize().map_err(|e| {
            ToolError::InvalidArguments(format!("Failed to resolve path '{}': {e}", path.display()))
        })?;

        if self.allowed_paths.is_empty() {
            return Ok(canonical);
        }

        for allowed in &self.allowed_paths {
            let Ok(canonical_allowed) = allowed.canonicalize() else {
                continue; // Skip non-existent allowed paths
            };

            if canonical.starts_with(&canonical_allowed) {
                return Ok(canonical);
            }
        }

        // Path is not within any allowed path - return error without exposing internal paths
        Err(ToolError::InvalidArguments(
            "Access denied: path is outside the configured allowed directories".to_string(),
        ))
    }
}

/// Searches files for lines matching a regular expression.
#[derive(Debug, Clone)]
pub struct ScanPatternTool {
    guard: PathGuard,
}

impl ScanPatternTool {
    /// Creates the scanner restricted by `guard`.
    #[must_use]
    pub const fn new(guard: PathGuard) -> Self {
        Self { guard }
    }
}

impl Tool for ScanPatternTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Scan application files for lines matching a regular expression. Files are \
         selected with a glob relative to the root directory. Each matching line is \
         reported as a finding with its file, line number and text. Status is \
         'warning' when anything matched."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "glob": {
                    "type": "string",
                    "description": "Files to scan, relative to root (default: **/*)"
                },
                "root": {
                    "type": "string",
                    "description": "Directory to scan; must be inside an allowed path (default: first allowed path)"
                },
                "case_insensitive": {
                    "type": "boolean",
                    "description": "Match without regard to case (default: false)"
                },
                "max_results": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_RESULTS_LIMIT,
                    "description": "Maximum number of findings to return (default: 100)"
                }
            },
            "required": ["pattern"]
        })
    }

    fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let pattern = required_str(arguments, "pattern")?;
        let file_glob = optional_str(arguments, "glob")?.unwrap_or(DEFAULT_GLOB);
        let case_insensitive = arguments
            .get("case_insensitive")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let max_results = match arguments.get("max_results") {
            None | Some(Value::Null) => DEFAULT_MAX_RESULTS,
            Some(v) => v
                .as_u64()
                .filter(|n| (1..=MAX_RESULTS_LIMIT).contains(n))
                .ok_or_else(|| {
                    ToolError::InvalidArguments(format!(
                        "max_results must be an integer between 1 and {MAX_RESULTS_LIMIT}"
                    ))
                })?,
        };
        let max_results = usize::try_from(max_results).unwrap_or(usize::MAX);

        let root = optional_str(arguments, "root")?
            .map_or_else(|| self.guard.default_root(), PathBuf::from);
        let root = self.guard.check(&root)?;
        if !root.is_dir() {
            return Err(ToolError::InvalidArguments(format!(
                "Root is not a directory: {}",
                root.display()
            )));
        }

        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid pattern: {e}")))?;

        check_relative_glob(file_glob)?;
        let full_glob = format!(
            "{}/{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            file_glob
        );
        let entries = glob::glob(&full_glob)
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid glob: {e}")))?;

        let mut findings = Vec::new();
        let mut errors = Vec::new();
        let mut files_scanned = 0_usize;
        let mut files_matched = 0_usize;
        let mut truncated = false;

        'files: for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    errors.push(json!({
                        "path": relative(&root, e.path()),
                        "error": e.error().to_string(),
                    }));
                    continue;
                }
            };

            if !path.is_file() {
                continue;
            }

            // Symlinks may point anywhere; only read what resolves under root.
            match path.canonicalize() {
                Ok(resolved) if resolved.starts_with(&root) => {}
                Ok(_) => {
                    tracing::debug!(path = %path.display(), "Skipping file outside scan root");
                    continue;
                }
                Err(e) => {
                    errors.push(json!({
                        "path": relative(&root, &path),
                        "error": e.to_string(),
                    }));
                    continue;
                }
            }

            let contents = match std::fs::read_to_string(&path) {
                Ok(contents) => contents,
                // Binary or non-UTF-8 file
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => continue,
                Err(e) => {
                    errors.push(json!({
                        "path": relative(&root, &path),
                        "error": e.to_string(),
                    }));
                    continue;
                }
            };
            files_scanned += 1;

            let mut matched_here = false;
            for (index, line) in contents.lines().enumerate() {
                if !regex.is_match(line) {
                    continue;
                }
                if findings.len() >= max_results {
                    truncated = true;
                    break 'files;
                }
                if !matched_here {
                    matched_here = true;
                    files_matched += 1;
                }
                findings.push(json!({
                    "file": relative(&root, &path),
                    "line": index + 1,
                    "text": line.trim().chars().take(MAX_SNIPPET_CHARS).collect::<String>(),
                }));
            }
        }

        tracing::debug!(
            root = %root.display(),
            files_scanned,
            matches = findings.len(),
            truncated,
            "Pattern scan finished"
        );

        let status = if findings.is_empty() {
            Status::Ok
        } else {
            Status::Warning
        };
        let summary = format!(
            "{} match{} in {} of {} file{} scanned{}",
            findings.len(),
            if findings.len() == 1 { "" } else { "es" },
            files_matched,
            files_scanned,
            if files_scanned == 1 { "" } else { "s" },
            if truncated { " (truncated)" } else { "" }
        );

        let mut envelope = Envelope::new(NAME, status, summary)
            .with_data(json!({
                "root": root.display().to_string(),
                "pattern": pattern,
                "glob": file_glob,
                "files_scanned": files_scanned,
                "files_matched": files_matched,
                "matches": findings.len(),
                "truncated": truncated,
            }))
            .with_meta("version", json!(env!("CARGO_PKG_VERSION")))
            .with_meta("generated_at", json!(chrono::Utc::now().to_rfc3339()))
            .with_findings(findings);
        if !errors.is_empty() {
            envelope = envelope.with_errors(errors);
        }

        Ok(envelope.into_value())
    }
}

/// Rejects globs that could leave the scan root.
fn check_relative_glob(file_glob: &str) -> Result<(), ToolError> {
    let escapes = Path::new(file_glob).has_root()
        || Path::new(file_glob)
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        || file_glob.split(['/', '\\']).any(|part| part == "..");
    if escapes {
        return Err(ToolError::InvalidArguments(
            "glob must be relative to root and must not contain '..'".to_string(),
        ));
    }
    Ok(())
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/main.rs"),
            "fn main() {\n    // TODO: remove debug\n    dbg!(1);\n}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn ok() {}\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "todo: write docs\n").unwrap();
        dir
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn finds_matches_with_line_numbers() {
        let dir = fixture();
        let tool = ScanPatternTool::new(PathGuard::new(vec![dir.path().to_path_buf()]));

        let out = tool
            .execute(&args(json!({"pattern": "dbg!", "glob": "src/**/*.rs"})))
            .unwrap();

        assert_eq!(out["tool"], NAME);
        assert_eq!(out["status"], "warning");
        let findings = out["findings"].as_array().unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0]["file"], "src/main.rs");
        assert_eq!(findings[0]["line"], 3);
        assert_eq!(findings[0]["text"], "dbg!(1);");
        assert_eq!(out["data"]["files_scanned"], 2);
    }

    #[test]
    fn case_insensitive_matching() {
        let dir = fixture();
        let tool = ScanPatternTool::new(PathGuard::new(vec![dir.path().to_path_buf()]));

        let out = tool
            .execute(&args(json!({"pattern": "todo", "case_insensitive": true})))
            .unwrap();
        assert_eq!(out["data"]["matches"], 2);
    }

    #[test]
    fn no_matches_is_ok_status() {
        let dir = fixture();
        let tool = ScanPatternTool::new(PathGuard::new(vec![dir.path().to_path_buf()]));

        let out = tool.execute(&args(json!({"pattern": "unsafe"}))).unwrap();
        assert_eq!(out["status"], "ok");
        assert_eq!(out["findings"], json!([]));
    }

    #[test]
    fn results_are_truncated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("many.txt"), "x\nx\nx\nx\n").unwrap();
        let tool = ScanPatternTool::new(PathGuard::new(vec![dir.path().to_path_buf()]));

        let out = tool
            .execute(&args(json!({"pattern": "x", "max_results": 2})))
            .unwrap();
        assert_eq!(out["data"]["matches"], 2);
        assert_eq!(out["data"]["truncated"], true);
    }

    #[test]
    fn rejects_bad_arguments() {
        let dir = fixture();
        let tool = ScanPatternTool::new(PathGuard::new(vec![dir.path().to_path_buf()]));

        assert!(matches!(
            tool.execute(&Map::new()),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            tool.execute(&args(json!({"pattern": "("}))),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            tool.execute(&args(json!({"pattern": "x", "max_results": 0}))),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[test]
    fn root_outside_allowed_paths_is_denied() {
        let allowed = fixture();
        let other = tempfile::tempdir().unwrap();
        let tool = ScanPatternTool::new(PathGuard::new(vec![allowed.path().to_path_buf()]));

        let err = tool
            .execute(&args(json!({
                "pattern": "x",
                "root": other.path().to_string_lossy(),
            })))
            .unwrap_err();
        assert!(err.to_string().contains("Access denied"));
    }

    #[test]
    fn escaping_globs_are_rejected() {
        let dir = fixture();
        let tool = ScanPatternTool::new(PathGuard::new(vec![dir.path().join("src")]));

        for glob in ["../notes.txt", "src/../../*", "/etc/*", "..\\notes.txt"] {
            let err = tool
                .execute(&args(json!({"pattern": "todo", "glob": glob})))
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments(_)), "glob {glob}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_leaving_root_are_skipped() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("app");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(outer.path().join("secret.txt"), "API_KEY=hunter2\n").unwrap();
        std::fs::write(root.join("config.txt"), "API_KEY=placeholder\n").unwrap();
        std::os::unix::fs::symlink(outer.path().join("secret.txt"), root.join("link.txt"))
            .unwrap();

        let tool = ScanPatternTool::new(PathGuard::new(vec![root]));
        let out = tool.execute(&args(json!({"pattern": "API_KEY"}))).unwrap();

        let findings = out["findings"].as_array().unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0]["file"], "config.txt");
        assert_eq!(out["data"]["files_scanned"], 1);
    }

    #[test]
    fn guard_allows_nested_paths() {
        let dir = fixture();
        let guard = PathGuard::new(vec![dir.path().to_path_buf()]);
        assert!(guard.check(&dir.path().join("src")).is_ok());
        assert!(guard.check(&dir.path().join("missing")).is_err());
    }
}
