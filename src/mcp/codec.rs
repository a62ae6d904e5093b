//! Wire codec for newline-delimited JSON-RPC 2.0.
//!
//! [`decode`] validates a line of text and turns it into a [`Message`];
//! [`encode`] turns a message back into a single line of JSON. Encoded text
//! never contains a raw newline or control character: `serde_json` escapes
//! them inside strings, which matters because tool output routinely carries
//! file paths and source snippets.

use serde_json::Value;
use thiserror::Error;

use crate::mcp::protocol::{ErrorCode, ErrorObject, Message, RequestId, JSONRPC_VERSION};

/// A failure to decode an incoming line.
///
/// Carries the request ID whenever it could be recovered so the resulting
/// error response can still be correlated by the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DecodeError {
    /// The JSON-RPC error code to report.
    pub code: ErrorCode,
    /// A human-readable description.
    pub message: String,
    /// The request ID, if it could be determined.
    pub id: Option<RequestId>,
}

impl DecodeError {
    fn parse(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ParseError,
            message: message.into(),
            id: None,
        }
    }

    fn invalid(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidRequest,
            message: message.into(),
            id,
        }
    }

    /// Converts this failure into an error response message.
    #[must_use]
    pub fn into_response(self) -> Message {
        error_response(self.id, self.code, self.message, None)
    }
}

/// Decodes a line of text into a message.
///
/// # Errors
///
/// Returns a [`DecodeError`] with:
/// - `ParseError` if the text is not valid JSON
/// - `InvalidRequest` if the JSON is not an object, the `jsonrpc` tag is
///   missing or not `"2.0"`, the `id` is not a string/integer/null, or the
///   `method` is not a string
pub fn decode(text: &str) -> Result<Message, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::parse(format!("Parse error: {e}")))?;

    let obj = match value {
        Value::Object(obj) => obj,
        Value::Array(_) => {
            return Err(DecodeError::invalid(None, "Batch requests are not supported"));
        }
        _ => return Err(DecodeError::invalid(None, "Message must be a JSON object")),
    };

    let id = obj.get("id").and_then(RequestId::from_value);

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        Some(_) => return Err(DecodeError::invalid(id, "jsonrpc field must be \"2.0\"")),
        None => return Err(DecodeError::invalid(id, "Missing jsonrpc field")),
    }

    if let Some(raw_id) = obj.get("id") {
        if !raw_id.is_null() && id.is_none() {
            return Err(DecodeError::invalid(
                None,
                "id must be a string, an integer or null",
            ));
        }
    }

    if obj.get("method").is_some_and(|m| !m.is_string()) {
        return Err(DecodeError::invalid(id, "method field must be a string"));
    }

    Ok(Message::from_structured(&obj))
}

/// Encodes a message as a single line of JSON (no trailing newline).
#[must_use]
pub fn encode(message: &Message) -> String {
    Value::Object(message.to_structured()).to_string()
}

/// Builds an error response without failing.
#[must_use]
pub fn error_response(
    id: Option<RequestId>,
    code: ErrorCode,
    message: impl Into<String>,
    data: Option<Value>,
) -> Message {
    let mut error = ErrorObject::with_message(code, message);
    error.data = data;
    Message::failure(id, error)
}
