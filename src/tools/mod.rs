//! Built-in tools shipped with the server binary.
//!
//! Each tool implements [`crate::mcp::Tool`]. [`builtin_registry`] assembles
//! them in a fixed order, skipping any that the configuration disables.

mod app_info;
mod echo;
mod scan;

pub use app_info::AppInfoTool;
pub use echo::EchoTool;
pub use scan::{PathGuard, ScanPatternTool};

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::config::ToolsConfig;
use crate::error::ToolError;
use crate::mcp::ToolRegistry;

/// Names of all built-in tools.
pub const BUILTIN_TOOLS: [&str; 3] = [echo::NAME, scan::NAME, app_info::NAME];

/// Builds the registry of built-in tools.
#[must_use]
pub fn builtin_registry(allowed_paths: &[PathBuf], tools: &ToolsConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    if tools.is_enabled(echo::NAME) {
        registry.register(EchoTool);
    }
    if tools.is_enabled(scan::NAME) {
        registry.register(ScanPatternTool::new(PathGuard::new(allowed_paths.to_vec())));
    }
    // Registered last so it can report the final tool count.
    if tools.is_enabled(app_info::NAME) {
        let tool_count = registry.len() + 1;
        registry.register(AppInfoTool::new(allowed_paths.to_vec(), tool_count));
    }

    for name in &tools.disabled {
        if !BUILTIN_TOOLS.contains(&name.as_str()) {
            tracing::warn!(tool = %name, "Disabled tool is not a built-in tool");
        }
    }

    registry
}

/// Reads a required string argument.
fn required_str<'a>(arguments: &'a Map<String, Value>, key: &str) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing required parameter: {key}")))
}

/// Reads an optional string argument.
fn optional_str<'a>(
    arguments: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, ToolError> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ToolError::InvalidArguments(format!(
            "Parameter {key} must be a string"
        ))),
    }
}
