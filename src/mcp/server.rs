//! MCP session dispatcher.
//!
//! The server reads one line at a time from its [`Transport`], decodes it,
//! routes it by method, and writes back exactly one response for every
//! request (none for notifications). Its lifecycle is a two-state machine:
//!
//! 1. **Uninitialized**: only `initialize` and `ping` succeed; `tools/list`
//!    and `tools/call` are rejected
//! 2. **Initialized**: entered on `initialize`; all methods are available
//!
//! Failures are confined to the message that caused them. Decoding errors,
//! tool errors and even panics inside a tool become JSON-RPC error responses;
//! the loop only stops when the transport reaches end-of-stream.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::ToolError;
use crate::mcp::codec::{self, error_response};
use crate::mcp::envelope::{elapsed_ms, render, ResultNormalizer, Status};
use crate::mcp::protocol::{ErrorCode, ErrorObject, Message, MCP_PROTOCOL_VERSION, SERVER_NAME};
use crate::mcp::registry::ToolRegistry;
use crate::mcp::transport::Transport;

/// Server state in the MCP session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for an initialize request.
    Uninitialized,
    /// Initialize received; tools are available.
    Initialized,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapabilities>,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: Some(ToolCapabilities::default()),
        }
    }
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires a predicate fn(&T) -> bool, so we must take &bool here
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Server identity reported in the initialize response.
///
/// Injected at construction; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl ServerInfo {
    /// Creates server identity from a name and version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self::new(SERVER_NAME, env!("CARGO_PKG_VERSION"))
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool reported an error status.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a single text content result.
    #[must_use]
    pub fn text(text: impl Into<String>, is_error: bool) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error,
        }
    }
}

/// The MCP session dispatcher.
pub struct McpServer<T> {
    /// Current session state.
    state: ServerState,
    /// The transport layer.
    transport: T,
    /// Registered tools, shared read-only.
    registry: Arc<ToolRegistry>,
    /// Identity reported to clients.
    info: ServerInfo,
    /// Wraps tool output into envelopes.
    normalizer: ResultNormalizer,
}

impl<T> McpServer<T> {
    /// Creates a server over `transport` serving the tools in `registry`.
    #[must_use]
    pub fn new(transport: T, registry: Arc<ToolRegistry>, info: ServerInfo) -> Self {
        let normalizer = ResultNormalizer::new(info.version.clone());
        Self {
            state: ServerState::Uninitialized,
            transport,
            registry,
            info,
            normalizer,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Returns the tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Consumes the server, returning its transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Handles one line of input, returning the encoded response to send.
    ///
    /// Returns `None` when nothing must be written (notifications, stray
    /// responses). A panic while handling the message is caught and reported
    /// as an internal error for that message.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        let message = match codec::decode(line) {
            Ok(message) => message,
            Err(err) => {
                warn!(code = err.code.code(), error = %err, "Rejected malformed message");
                return Some(codec::encode(&err.into_response()));
            }
        };

        let id = message.id().cloned();
        let is_notification = message.is_notification();

        let response =
            match panic::catch_unwind(AssertUnwindSafe(|| self.handle_message(message))) {
                Ok(response) => response,
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(id = ?id, reason = %reason, "Panic while handling message");
                    if is_notification {
                        None
                    } else {
                        Some(error_response(
                            id,
                            ErrorCode::InternalError,
                            format!("Internal error: {reason}"),
                            None,
                        ))
                    }
                }
            };

        response.map(|msg| codec::encode(&msg))
    }

    /// Routes a decoded message and returns the response, if any.
    pub fn handle_message(&mut self, message: Message) -> Option<Message> {
        if !message.is_well_formed() {
            warn!(id = ?message.id(), "Message is neither a request nor a response");
            return Some(error_response(
                message.id().cloned(),
                ErrorCode::InvalidRequest,
                "Message must be either a request or a response",
                None,
            ));
        }

        if message.is_response() {
            debug!(id = ?message.id(), "Ignoring response from client");
            return None;
        }

        let method = message.method().unwrap_or_default();

        let Some(id) = message.id().cloned() else {
            self.handle_notification(method);
            return None;
        };

        debug!(%id, method, "Handling request");

        Some(match self.handle_request(method, message.params()) {
            Ok(result) => Message::success(id, result),
            Err(error) => {
                debug!(%id, method, code = error.code, message = %error.message, "Request failed");
                Message::failure(Some(id), error)
            }
        })
    }

    /// Routes a request by method name.
    fn handle_request(
        &mut self,
        method: &str,
        params: &Map<String, Value>,
    ) -> Result<Value, ErrorObject> {
        match method {
            "initialize" => Ok(self.handle_initialize(params)),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(params),
            "ping" => Ok(json!({})),
            _ => Err(ErrorObject::with_message(
                ErrorCode::MethodNotFound,
                format!("Method not found: {method}"),
            )),
        }
    }

    /// Handles an incoming notification. Notifications never change state.
    #[allow(clippy::unused_self)]
    fn handle_notification(&self, method: &str) {
        debug!(method, "Received notification");
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, params: &Map<String, Value>) -> Value {
        match serde_json::from_value::<InitializeParams>(Value::Object(params.clone())) {
            Ok(params) => {
                let client = params.client_info.as_ref().map(|c| c.name.as_str());
                info!(
                    client = client.unwrap_or("unknown"),
                    requested_version = params.protocol_version.as_deref().unwrap_or("none"),
                    "Client initialising"
                );
            }
            Err(e) => warn!(error = %e, "Ignoring malformed initialize params"),
        }

        if self.state == ServerState::Initialized {
            debug!("Repeated initialize; session stays initialized");
        }
        self.state = ServerState::Initialized;

        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": self.info,
        })
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self) -> Result<Value, ErrorObject> {
        self.require_initialized()?;

        Ok(json!({
            "tools": self.registry.list(),
        }))
    }

    /// Handles the tools/call request.
    fn handle_tools_call(&self, params: &Map<String, Value>) -> Result<Value, ErrorObject> {
        self.require_initialized()?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                ErrorObject::with_message(ErrorCode::InvalidParams, "Missing tool name")
            })?;

        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(arguments)) => arguments.clone(),
            Some(_) => {
                return Err(ErrorObject::with_message(
                    ErrorCode::InvalidParams,
                    "Tool arguments must be an object",
                ));
            }
        };

        let tool = self.registry.get(name).map_err(|_| {
            ErrorObject::with_message(ErrorCode::MethodNotFound, format!("Tool not found: {name}"))
        })?;

        let start = Instant::now();
        let raw = tool
            .execute(&arguments)
            .map_err(|e| tool_error_to_rpc(name, e))?;
        let duration_ms = elapsed_ms(start);

        debug!(tool = name, duration_ms, "Tool call completed");

        let envelope = self.normalizer.normalize(name, raw, duration_ms);
        let result = ToolCallResult::text(render(&envelope), envelope.status == Status::Error);

        serde_json::to_value(&result).map_err(|e| {
            error!(error = %e, "Failed to serialise tool call result");
            ErrorObject::with_message(
                ErrorCode::InternalError,
                "Internal error: failed to serialise result",
            )
        })
    }

    /// Ensures the session has been initialized.
    fn require_initialized(&self) -> Result<(), ErrorObject> {
        if self.state != ServerState::Initialized {
            return Err(ErrorObject::with_message(
                ErrorCode::InternalError,
                "Server not initialized",
            ));
        }
        Ok(())
    }
}

impl<T: Transport> McpServer<T> {
    /// Runs the server until end-of-stream or a shutdown signal.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    #[cfg(unix)]
    pub async fn run(&mut self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let result = tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, initiating graceful shutdown");
                Ok(())
            }

            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
                Ok(())
            }

            result = self.serve_until_eof() => result,
        };

        self.finish(result).await
    }

    /// Runs the server until end-of-stream or Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    #[cfg(windows)]
    pub async fn run(&mut self) -> std::io::Result<()> {
        let result = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, initiating graceful shutdown");
                Ok(())
            }

            result = self.serve_until_eof() => result,
        };

        self.finish(result).await
    }

    /// Runs the server until the transport reaches end-of-stream.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn serve(&mut self) -> std::io::Result<()> {
        let result = self.serve_until_eof().await;
        self.finish(result).await
    }

    async fn serve_until_eof(&mut self) -> std::io::Result<()> {
        while let Some(line) = self.transport.read_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line) {
                self.transport.write_line(&response).await?;
            }
        }

        info!("Input closed, shutting down");
        Ok(())
    }

    async fn finish(&mut self, result: std::io::Result<()>) -> std::io::Result<()> {
        let closed = self.transport.close().await;
        result.and(closed)
    }
}

/// Collapses a tool failure into a JSON-RPC error.
fn tool_error_to_rpc(tool: &str, err: ToolError) -> ErrorObject {
    match err {
        ToolError::NotFound(name) => {
            warn!(tool, missing = %name, "Tool reported a missing tool");
            ErrorObject::with_message(ErrorCode::MethodNotFound, format!("Tool not found: {name}"))
        }
        ToolError::InvalidArguments(message) => {
            warn!(tool, error = %message, "Tool rejected its arguments");
            ErrorObject::with_message(ErrorCode::InternalError, message)
                .with_data(json!({ "tool": tool, "kind": "invalid_arguments" }))
        }
        other => {
            error!(tool, error = %other, "Tool execution failed");
            ErrorObject::with_message(ErrorCode::InternalError, other.to_string())
                .with_data(json!({ "tool": tool }))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::registry::Tool;

    struct Echo;

    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes arguments"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
            Ok(Value::Object(arguments.clone()))
        }
    }

    struct Explodes;

    impl Tool for Explodes {
        fn name(&self) -> &str {
            "explodes"
        }

        fn description(&self) -> &str {
            "Panics"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        fn execute(&self, _arguments: &Map<String, Value>) -> Result<Value, ToolError> {
            panic!("boom");
        }
    }

    fn server() -> McpServer<()> {
        let mut registry = ToolRegistry::new();
        registry.register(Echo);
        registry.register(Explodes);
        McpServer::new((), Arc::new(registry), ServerInfo::new("test-server", "0.0.1"))
    }

    fn call(server: &mut McpServer<()>, line: &str) -> Value {
        let response = server.handle_line(line).expect("expected a response");
        serde_json::from_str(&response).unwrap()
    }

    const INIT: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;

    #[test]
    fn server_initial_state() {
        let server = server();
        assert_eq!(server.state(), ServerState::Uninitialized);
    }

    #[test]
    fn initialize_reports_identity_and_transitions() {
        let mut server = server();
        let resp = call(&mut server, INIT);
        assert_eq!(resp["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(resp["result"]["serverInfo"]["name"], "test-server");
        assert_eq!(resp["result"]["capabilities"]["tools"], json!({}));
        assert_eq!(server.state(), ServerState::Initialized);

        let again = call(&mut server, INIT);
        assert!(again.get("result").is_some());
        assert_eq!(server.state(), ServerState::Initialized);
    }

    #[test]
    fn tools_rejected_before_initialize() {
        let mut server = server();
        let resp = call(&mut server, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#);
        assert_eq!(resp["error"]["code"], -32603);
        assert_eq!(resp["id"], 2);
        assert_eq!(server.state(), ServerState::Uninitialized);
    }

    #[test]
    fn ping_works_in_any_state() {
        let mut server = server();
        let resp = call(&mut server, r#"{"jsonrpc":"2.0","id":"p","method":"ping"}"#);
        assert_eq!(resp["result"], json!({}));
        assert_eq!(resp["id"], "p");
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let mut server = server();
        let resp = call(&mut server, r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#);
        assert_eq!(resp["error"]["code"], -32601);
        assert!(resp["error"]["message"]
            .as_str()
            .unwrap()
            .contains("resources/list"));
    }

    #[test]
    fn notifications_get_no_reply() {
        let mut server = server();
        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","method":"initialize"}"#)
            .is_none());
        assert_eq!(server.state(), ServerState::Uninitialized);
    }

    #[test]
    fn client_responses_get_no_reply() {
        let mut server = server();
        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","id":8,"result":{}}"#)
            .is_none());
    }

    #[test]
    fn shapeless_message_is_invalid_request() {
        let mut server = server();
        let resp = call(&mut server, r#"{"jsonrpc":"2.0","id":4}"#);
        assert_eq!(resp["error"]["code"], -32600);
        assert_eq!(resp["id"], 4);
    }

    #[test]
    fn parse_error_has_null_id() {
        let mut server = server();
        let resp = call(&mut server, "{not json");
        assert_eq!(resp["error"]["code"], -32700);
        assert!(resp["id"].is_null());
    }

    #[test]
    fn tools_call_requires_name() {
        let mut server = server();
        call(&mut server, INIT);
        let resp = call(
            &mut server,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"arguments":{}}}"#,
        );
        assert_eq!(resp["error"]["code"], -32602);
    }

    #[test]
    fn tools_call_rejects_non_object_arguments() {
        let mut server = server();
        call(&mut server, INIT);
        let resp = call(
            &mut server,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"echo","arguments":[1]}}"#,
        );
        assert_eq!(resp["error"]["code"], -32602);
    }

    #[test]
    fn tool_panic_becomes_internal_error() {
        let mut server = server();
        call(&mut server, INIT);
        let resp = call(
            &mut server,
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"explodes"}}"#,
        );
        assert_eq!(resp["error"]["code"], -32603);
        assert_eq!(resp["id"], 6);
        assert!(resp["error"]["message"].as_str().unwrap().contains("boom"));

        // The session survives.
        let resp = call(&mut server, r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#);
        assert_eq!(resp["result"], json!({}));
        assert_eq!(server.state(), ServerState::Initialized);
    }

    #[test]
    fn tool_errors_map_to_codes() {
        let not_found = tool_error_to_rpc("t", ToolError::NotFound("other".to_string()));
        assert_eq!(not_found.code, -32601);

        let invalid = tool_error_to_rpc("t", ToolError::InvalidArguments("bad".to_string()));
        assert_eq!(invalid.code, -32603);
        assert_eq!(invalid.message, "bad");
        assert_eq!(
            invalid.data,
            Some(json!({"tool": "t", "kind": "invalid_arguments"}))
        );

        let failed = tool_error_to_rpc("t", ToolError::Execution("nope".to_string()));
        assert_eq!(failed.code, -32603);
        assert_eq!(failed.message, "nope");
        assert_eq!(failed.data, Some(json!({"tool": "t"})));
    }

    #[test]
    fn tool_call_result_text() {
        let result = ToolCallResult::text("Hello, world!", false);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "Hello, world!");
        assert!(json.get("isError").is_none());
    }

    #[test]
    fn panic_message_extracts_strings() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(3_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
