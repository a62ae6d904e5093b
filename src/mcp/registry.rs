//! Tool contract and the capability registry.
//!
//! Tools are registered once at startup and looked up by name for every
//! `tools/call`. The registry keeps registration order so `tools/list`
//! presents tools in the order they were added.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{RegistryError, ToolError};

/// A named capability the server can invoke on request.
pub trait Tool: Send + Sync {
    /// Unique tool name (the registry key).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input arguments.
    fn input_schema(&self) -> Value;

    /// Whether the tool only reads state. Advisory; not enforced.
    fn is_read_only(&self) -> bool {
        true
    }

    /// Runs the tool.
    ///
    /// The returned value is either a canonical envelope or any other JSON
    /// value; the server normalizes it before replying.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] describing why the tool could not run.
    fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError>;
}

/// A tool definition for the `tools/list` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Name-keyed collection of tools, in registration order.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its declared name.
    ///
    /// Registering a name twice replaces the earlier handler without error;
    /// the name keeps its original position in [`list`](Self::list).
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_shared(Arc::new(tool));
    }

    /// Registers an already shared tool.
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::debug!(tool = %name, "Replaced existing tool registration");
        } else {
            tracing::debug!(tool = %name, "Registered tool");
        }
    }

    /// Looks up a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no tool has that name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, RegistryError> {
        self.tools
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Returns `true` if a tool with that name is registered.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns the definitions of all registered tools, in registration order.
    ///
    /// A re-registered name stays at the slot of its first registration and
    /// reports the latest tool's definition.
    #[must_use]
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Returns the registered tool names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
