//! devtools-mcp: MCP server exposing developer tools for a hosted application
//!
//! This library provides the protocol and dispatch layer of an MCP server: a
//! JSON-RPC 2.0 codec, a registry of named tools, a session state machine and
//! a normalizer that gives every tool result the same envelope shape.
//!
//! # Architecture
//!
//! The server owns the protocol. Tools own the analysis:
//!
//! - **Protocol**: decode/encode newline-delimited JSON-RPC, route by method
//! - **Session**: `initialize` gates tool discovery and invocation
//! - **Envelope**: every tool result becomes `{tool, status, summary, meta, data, ..}`
//!
//! Tools implement [`mcp::Tool`] and are registered once at startup.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`mcp`]: MCP protocol implementation
//! - [`tools`]: Built-in tools

pub mod config;
pub mod error;
pub mod mcp;
pub mod tools;
