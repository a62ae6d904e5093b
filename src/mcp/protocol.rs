//! JSON-RPC 2.0 message model for the MCP protocol.
//!
//! A single [`Message`] type represents every kind of JSON-RPC message:
//!
//! - **Request**: has a `method` and an `id`, expects a response
//! - **Notification**: has a `method` but no `id`, never answered
//! - **Response**: has either a `result` or an `error`, never both
//!
//! Messages convert to and from a key-ordered [`Map`] so the codec can
//! validate structure before building one, and so encoding is stable.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The JSON-RPC version tag carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// The MCP protocol version this implementation supports.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name for capability negotiation.
pub const SERVER_NAME: &str = "devtools-mcp";

/// A JSON-RPC 2.0 request ID.
///
/// IDs are opaque correlation tokens: strings or integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(i64),
    /// String request ID.
    String(String),
}

impl RequestId {
    /// Interprets a JSON value as a request ID.
    ///
    /// Returns `None` for `null` and for values that are not strings or
    /// integers.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) => n.as_i64().map(Self::Number),
            _ => None,
        }
    }

    /// Converts this ID back into a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::from(*n),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// Standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid Request object.
    InvalidRequest,
    /// The method (or tool) does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
}

impl ErrorCode {
    /// Returns the numeric code for this error.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
        }
    }

    /// Returns the default message for this error code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// The error code.
    pub code: i64,

    /// A short description of the error.
    pub message: String,

    /// Additional information about the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Creates a new error from an error code.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self::with_message(code, code.default_message())
    }

    /// Creates a new error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Adds additional data to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A JSON-RPC 2.0 message: request, notification or response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    id: Option<RequestId>,
    method: Option<String>,
    params: Map<String, Value>,
    result: Option<Value>,
    error: Option<ErrorObject>,
}

impl Message {
    /// Creates a request expecting a response.
    #[must_use]
    pub fn request(id: RequestId, method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            id: Some(id),
            method: Some(method.into()),
            params,
            ..Self::default()
        }
    }

    /// Creates a notification (no ID, never answered).
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            method: Some(method.into()),
            params,
            ..Self::default()
        }
    }

    /// Creates a successful response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            ..Self::default()
        }
    }

    /// Creates an error response.
    ///
    /// `id` is `None` when the request ID could not be determined.
    #[must_use]
    pub fn failure(id: Option<RequestId>, error: ErrorObject) -> Self {
        Self {
            id,
            error: Some(error),
            ..Self::default()
        }
    }

    /// Builds a message from a JSON object.
    ///
    /// Missing fields default to empty/absent; this never fails. A `null` or
    /// non-scalar `id` is treated as absent, non-object `params` as empty, and
    /// a malformed `error` object as absent.
    #[must_use]
    pub fn from_structured(data: &Map<String, Value>) -> Self {
        let error = data
            .get("error")
            .and_then(|e| serde_json::from_value::<ErrorObject>(e.clone()).ok());

        Self {
            id: data.get("id").and_then(RequestId::from_value),
            method: data.get("method").and_then(Value::as_str).map(str::to_string),
            params: data
                .get("params")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            result: data.get("result").cloned(),
            error,
        }
    }

    /// Converts this message into a JSON object.
    ///
    /// Only fields that are set are emitted, in a fixed order: `jsonrpc`, `id`,
    /// `method`, `params`, `result`, `error`. An error response without a known
    /// ID carries `"id": null`.
    #[must_use]
    pub fn to_structured(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("jsonrpc".to_string(), Value::from(JSONRPC_VERSION));

        match (&self.id, &self.error) {
            (Some(id), _) => {
                map.insert("id".to_string(), id.to_value());
            }
            (None, Some(_)) => {
                map.insert("id".to_string(), Value::Null);
            }
            (None, None) => {}
        }

        if let Some(method) = &self.method {
            map.insert("method".to_string(), Value::from(method.as_str()));
        }
        if !self.params.is_empty() {
            map.insert("params".to_string(), Value::Object(self.params.clone()));
        }
        if let Some(result) = &self.result {
            map.insert("result".to_string(), result.clone());
        }
        if let Some(error) = &self.error {
            let error = serde_json::to_value(error).unwrap_or_else(|_| {
                serde_json::json!({ "code": error.code, "message": error.message })
            });
            map.insert("error".to_string(), error);
        }

        map
    }

    /// Returns the request ID, if any.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        self.id.as_ref()
    }

    /// Returns the method name, if any.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Returns the parameters (empty when none were sent).
    #[must_use]
    pub const fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Returns the success payload, if any.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Returns the error object, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&ErrorObject> {
        self.error.as_ref()
    }

    /// Returns `true` if a method is set.
    #[must_use]
    pub const fn is_request(&self) -> bool {
        self.method.is_some()
    }

    /// Returns `true` if a result or an error is set.
    #[must_use]
    pub const fn is_response(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }

    /// Returns `true` if a method is set and no ID is present.
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.method.is_some() && self.id.is_none()
    }

    /// Returns `true` if this is exactly one of request or response.
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        self.is_request() != self.is_response()
    }
}
