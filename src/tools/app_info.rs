//! `app_info`: facts about the hosted process.

use std::path::PathBuf;

use serde_json::{json, Map, Value};

use crate::error::ToolError;
use crate::mcp::envelope::{Envelope, Status};
use crate::mcp::Tool;

pub(super) const NAME: &str = "app_info";

/// Reports package, platform and working-directory facts.
#[derive(Debug, Clone)]
pub struct AppInfoTool {
    allowed_paths: Vec<PathBuf>,
    tool_count: usize,
}

impl AppInfoTool {
    /// Creates the tool. `tool_count` is the number of tools the server exposes.
    #[must_use]
    pub const fn new(allowed_paths: Vec<PathBuf>, tool_count: usize) -> Self {
        Self {
            allowed_paths,
            tool_count,
        }
    }
}

impl Tool for AppInfoTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Describe the running application: package name and version, operating \
         system, architecture, working directory, the directories tools may read, \
         and how many tools are available."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    fn execute(&self, _arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let cwd = std::env::current_dir()?;

        let allowed: Vec<String> = self
            .allowed_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect();

        let summary = format!(
            "{} {} on {}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        );

        Ok(Envelope::new(NAME, Status::Ok, summary)
            .with_data(json!({
                "package": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "os": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
                "family": std::env::consts::FAMILY,
                "working_directory": cwd.display().to_string(),
                "process_id": std::process::id(),
                "allowed_paths": allowed,
                "tool_count": self.tool_count,
            }))
            .with_meta("version", json!(env!("CARGO_PKG_VERSION")))
            .with_meta("generated_at", json!(chrono::Utc::now().to_rfc3339()))
            .into_value())
    }
}
