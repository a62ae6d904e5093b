//! `echo`: returns its arguments unchanged.
//!
//! Useful for checking connectivity. Its output is a plain object, so the
//! server wraps it in a synthesized envelope.

use serde_json::{json, Map, Value};

use crate::error::ToolError;
use crate::mcp::Tool;

pub(super) const NAME: &str = "echo";

/// Echoes the call arguments back to the client.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoTool;

impl Tool for EchoTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Return the supplied arguments unchanged. Use to check that the server \
         is reachable and that arguments arrive intact."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": true
        })
    }

    fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        Ok(Value::Object(arguments.clone()))
    }
}
