//! Error types for devtools-mcp.
//!
//! Protocol-level failures (malformed JSON-RPC, unknown methods) live in
//! [`crate::mcp::codec`]; this module holds the errors raised by configuration
//! loading, the tool registry and tool execution.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors raised by the tool registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No tool is registered under the requested name.
    #[error("tool not found: {0}")]
    NotFound(String),
}

/// Errors a tool may return from `execute`.
///
/// The dispatcher collapses these into JSON-RPC error codes: `NotFound` becomes
/// `MethodNotFound`, everything else becomes `InternalError`. `InvalidArguments`
/// is tagged with `data.kind = "invalid_arguments"`.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The tool (or a tool it delegates to) does not exist.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The supplied arguments are missing or malformed.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran but could not complete.
    #[error("{0}")]
    Execution(String),

    /// An I/O operation performed by the tool failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RegistryError> for ToolError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(name) => Self::NotFound(name),
        }
    }
}
