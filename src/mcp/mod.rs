//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the protocol and dispatch layer that exposes
//! developer tools to an MCP client. The server communicates over a
//! line-oriented transport (stdio in production) using JSON-RPC 2.0 messages.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         MCP Server                          │
//! │                                                             │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    │
//! │   │  Transport  │───▶│   Server    │───▶│  Registry   │    │
//! │   │   (lines)   │    │ (dispatch)  │    │   (tools)   │    │
//! │   └─────────────┘    └─────────────┘    └─────────────┘    │
//! │          │                  │                  │            │
//! │          ▼                  ▼                  ▼            │
//! │   ┌─────────────┐    ┌─────────────────────────────────┐   │
//! │   │    Codec    │    │   Result normalizer (envelope)  │   │
//! │   └─────────────┘    └─────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod codec;
pub mod envelope;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

pub use codec::{decode, encode, error_response, DecodeError};
pub use envelope::{Envelope, ResultNormalizer, Status};
pub use protocol::{
    ErrorCode, ErrorObject, Message, RequestId, JSONRPC_VERSION, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
pub use registry::{Tool, ToolDefinition, ToolRegistry};
pub use server::{McpServer, ServerInfo, ServerState};
pub use transport::{LineTransport, StdioTransport, Transport};
