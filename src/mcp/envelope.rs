//! Canonical result envelope and the normalizer that produces it.
//!
//! Every successful `tools/call` is reported to the client in one shape:
//!
//! ```text
//! { tool, status, summary, meta: { version, generated_at, duration_ms, tool, .. },
//!   data, findings?, errors? }
//! ```
//!
//! Tools may build that envelope themselves (see [`Envelope::new`]) or return
//! any other JSON value. [`ResultNormalizer::normalize`] first tries to read the
//! raw value as a canonical envelope; if that fails it wraps the value. This is
//! the one place where the server branches on the shape of a tool's output.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

/// Outcome classification carried by every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The tool completed and found nothing to report.
    Ok,
    /// The tool completed and reports something worth attention.
    Warning,
    /// The tool completed but its own checks failed.
    Error,
}

/// The canonical tool result envelope.
///
/// Only `tool`, `status` and `meta` are typed. The remaining well-known keys
/// hold whatever JSON the tool emitted so a canonical result passes through
/// untouched; a key that is present with `null` stays present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Name of the tool that produced the result.
    pub tool: String,

    /// Outcome classification.
    pub status: Status,

    /// One-line human-readable summary.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub summary: Option<Value>,

    /// Metadata: version, timestamp, duration and tool name, plus any
    /// tool-specific keys.
    pub meta: Map<String, Value>,

    /// Structured payload.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Value>,

    /// Individual findings (scanner hits, lint results, ...).
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub findings: Option<Value>,

    /// Non-fatal errors encountered while producing the result.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub errors: Option<Value>,

    /// Any further top-level keys a tool chose to emit.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    /// Creates an envelope with empty metadata and no payload.
    ///
    /// Tools use this to return a native envelope; the server stamps the
    /// timing metadata afterwards.
    #[must_use]
    pub fn new(tool: impl Into<String>, status: Status, summary: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            status,
            summary: Some(Value::String(summary.into())),
            meta: Map::new(),
            data: None,
            findings: None,
            errors: None,
            extra: Map::new(),
        }
    }

    /// Sets the structured payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the findings list.
    #[must_use]
    pub fn with_findings(mut self, findings: Vec<Value>) -> Self {
        self.findings = Some(Value::Array(findings));
        self
    }

    /// Sets the errors list.
    #[must_use]
    pub fn with_errors(mut self, errors: Vec<Value>) -> Self {
        self.errors = Some(Value::Array(errors));
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Converts the envelope into the JSON value a tool returns.
    #[must_use]
    pub fn into_value(self) -> Value {
        serde_json::to_value(&self).unwrap_or_else(|e| diagnostic(&self.tool, &e.to_string()))
    }

    /// Returns the summary when it is a string.
    #[must_use]
    pub fn summary_text(&self) -> Option<&str> {
        self.summary.as_ref().and_then(Value::as_str)
    }
}

/// Keeps a key that is present with `null` as `Some(Value::Null)`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// A raw tool result, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    /// The tool already produced a canonical envelope.
    Canonical(Box<Envelope>),
    /// A plain text result.
    Text(String),
    /// Any other JSON value.
    Value(Value),
}

impl RawResult {
    /// Classifies a raw value, preferring the canonical envelope reading.
    ///
    /// A value is canonical when it is an object with a string `tool`, a
    /// `status` of `ok`, `warning` or `error`, and an object `meta`.
    #[must_use]
    pub fn classify(raw: Value) -> Self {
        if raw.as_object().is_some_and(looks_canonical) {
            if let Ok(envelope) = serde_json::from_value::<Envelope>(raw.clone()) {
                return Self::Canonical(Box::new(envelope));
            }
        }

        match raw {
            Value::String(text) => Self::Text(text),
            other => Self::Value(other),
        }
    }
}

fn looks_canonical(obj: &Map<String, Value>) -> bool {
    obj.get("tool").is_some_and(Value::is_string)
        && obj.get("status").is_some_and(Value::is_string)
        && obj.get("meta").is_some_and(Value::is_object)
}

/// Wraps raw tool output into [`Envelope`]s.
#[derive(Debug, Clone)]
pub struct ResultNormalizer {
    version: String,
}

impl ResultNormalizer {
    /// Creates a normalizer that stamps `version` into synthesized metadata.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    /// Normalizes a raw tool result.
    ///
    /// Canonical envelopes pass through with `meta.duration_ms` and `meta.tool`
    /// overwritten. Anything else is wrapped: text becomes the summary, objects
    /// become `data`, other values are boxed under `data.value`, and `meta` is
    /// synthesized with `normalized: true`.
    #[must_use]
    pub fn normalize(&self, tool_name: &str, raw: Value, duration_ms: f64) -> Envelope {
        match RawResult::classify(raw) {
            RawResult::Canonical(envelope) => {
                let mut envelope = *envelope;
                envelope
                    .meta
                    .insert("duration_ms".to_string(), json!(duration_ms));
                envelope
                    .meta
                    .insert("tool".to_string(), Value::from(tool_name));
                envelope
            }
            RawResult::Text(text) => {
                self.wrap(tool_name, text, Value::Object(Map::new()), duration_ms)
            }
            RawResult::Value(value) => {
                let data = match value {
                    Value::Object(_) => value,
                    Value::Null => Value::Object(Map::new()),
                    other => json!({ "value": other }),
                };
                self.wrap(tool_name, String::new(), data, duration_ms)
            }
        }
    }

    fn wrap(&self, tool_name: &str, summary: String, data: Value, duration_ms: f64) -> Envelope {
        let mut meta = Map::new();
        meta.insert("version".to_string(), Value::from(self.version.as_str()));
        meta.insert(
            "generated_at".to_string(),
            Value::from(chrono::Utc::now().to_rfc3339()),
        );
        meta.insert("duration_ms".to_string(), json!(duration_ms));
        meta.insert("tool".to_string(), Value::from(tool_name));
        meta.insert("normalized".to_string(), Value::Bool(true));

        Envelope {
            tool: tool_name.to_string(),
            status: Status::Ok,
            summary: Some(Value::String(summary)),
            meta,
            data: Some(data),
            findings: None,
            errors: None,
            extra: Map::new(),
        }
    }
}

/// Renders an envelope as pretty-printed JSON.
///
/// If the envelope cannot be serialised, a minimal diagnostic envelope is
/// rendered instead so the client still receives a response.
#[must_use]
pub fn render(envelope: &Envelope) -> String {
    serde_json::to_string_pretty(envelope).unwrap_or_else(|e| {
        tracing::error!(tool = %envelope.tool, error = %e, "Failed to encode tool output");
        let fallback = diagnostic(&envelope.tool, &e.to_string());
        serde_json::to_string_pretty(&fallback).unwrap_or_else(|_| fallback.to_string())
    })
}

fn diagnostic(tool: &str, reason: &str) -> Value {
    json!({
        "tool": tool,
        "status": "error",
        "summary": format!("Failed to encode tool output: {reason}"),
        "meta": { "tool": tool },
    })
}

/// Milliseconds elapsed since `start`, rounded to two decimals.
#[must_use]
pub fn elapsed_ms(start: std::time::Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> ResultNormalizer {
        ResultNormalizer::new("1.2.3")
    }

    #[test]
    fn text_result_becomes_summary() {
        let env = normalizer().normalize("X", json!("Done"), 4.5);
        assert_eq!(env.status, Status::Ok);
        assert_eq!(env.summary_text(), Some("Done"));
        assert_eq!(env.data, Some(json!({})));
        assert_eq!(env.meta["tool"], "X");
        assert_eq!(env.meta["version"], "1.2.3");
        assert_eq!(env.meta["normalized"], true);
        assert_eq!(env.meta["duration_ms"], json!(4.5));
        assert!(env.meta["generated_at"].is_string());
    }

    #[test]
    fn object_result_becomes_data() {
        let env = normalizer().normalize("routes", json!({"count": 3}), 1.0);
        assert_eq!(env.data, Some(json!({"count": 3})));
        assert_eq!(env.summary_text(), Some(""));
    }

    #[test]
    fn scalar_and_array_results_are_boxed() {
        let env = normalizer().normalize("n", json!(42), 0.0);
        assert_eq!(env.data, Some(json!({"value": 42})));

        let env = normalizer().normalize("list", json!([1, 2]), 0.0);
        assert_eq!(env.data, Some(json!({"value": [1, 2]})));
    }

    #[test]
    fn null_result_yields_empty_data() {
        let env = normalizer().normalize("noop", Value::Null, 0.0);
        assert_eq!(env.data, Some(json!({})));
    }

    #[test]
    fn canonical_envelope_passes_through() {
        let raw = json!({
            "tool": "inner-name",
            "status": "warning",
            "summary": "2 issues",
            "meta": {"version": "9", "duration_ms": 999, "tool": "stale", "rules": 14},
            "data": {"files": 10},
            "findings": [{"line": 1}, {"line": 7}],
            "errors": ["unreadable.txt"],
        });

        let env = normalizer().normalize("scanner", raw, 12.25);
        assert_eq!(env.tool, "inner-name");
        assert_eq!(env.status, Status::Warning);
        assert_eq!(env.data, Some(json!({"files": 10})));
        assert_eq!(env.findings, Some(json!([{"line": 1}, {"line": 7}])));
        assert_eq!(env.errors, Some(json!(["unreadable.txt"])));
        assert_eq!(env.meta["duration_ms"], json!(12.25));
        assert_eq!(env.meta["tool"], "scanner");
        assert_eq!(env.meta["version"], "9");
        assert_eq!(env.meta["rules"], 14);
        assert!(env.meta.get("normalized").is_none());
    }

    #[test]
    fn canonical_envelope_with_unusual_field_shapes_passes_through() {
        let raw = json!({
            "tool": "t",
            "status": "error",
            "summary": {"short": "bad"},
            "meta": {},
            "findings": {"count": 2},
        });

        let env = normalizer().normalize("t", raw, 3.0);
        assert_eq!(env.status, Status::Error);
        assert_eq!(env.summary, Some(json!({"short": "bad"})));
        assert_eq!(env.findings, Some(json!({"count": 2})));
        assert!(env.data.is_none());
        assert!(env.meta.get("normalized").is_none());
    }

    #[test]
    fn canonical_null_data_stays_present() {
        let raw = json!({"tool": "t", "status": "ok", "meta": {}, "data": null});
        let env = normalizer().normalize("t", raw, 0.0);
        assert_eq!(env.data, Some(Value::Null));

        let rendered: Value = serde_json::from_str(&render(&env)).unwrap();
        let object = rendered.as_object().unwrap();
        assert!(object.contains_key("data"));
        assert!(object["data"].is_null());
        assert_eq!(rendered["meta"]["duration_ms"], json!(0.0));
    }

    #[test]
    fn unknown_status_is_wrapped_not_passed_through() {
        let raw = json!({"tool": "t", "status": "maybe", "meta": {}});
        let env = normalizer().normalize("t", raw.clone(), 0.0);
        assert_eq!(env.status, Status::Ok);
        assert_eq!(env.data, Some(raw));
    }

    #[test]
    fn missing_meta_is_wrapped() {
        let raw = json!({"tool": "t", "status": "ok"});
        assert!(matches!(RawResult::classify(raw), RawResult::Value(_)));
    }

    #[test]
    fn extra_top_level_keys_survive() {
        let raw = json!({"tool": "t", "status": "ok", "meta": {}, "hints": ["a"]});
        let env = normalizer().normalize("t", raw, 0.0);
        let rendered: Value = serde_json::from_str(&render(&env)).unwrap();
        assert_eq!(rendered["hints"], json!(["a"]));
    }

    #[test]
    fn native_envelope_builder_round_trips() {
        let value = Envelope::new("facts", Status::Ok, "ready")
            .with_data(json!({"os": "linux"}))
            .with_meta("source", json!("process"))
            .into_value();
        let env = normalizer().normalize("facts", value, 1.5);
        assert_eq!(env.summary_text(), Some("ready"));
        assert_eq!(env.meta["source"], "process");
        assert_eq!(env.meta["duration_ms"], json!(1.5));
    }

    #[test]
    fn render_is_pretty_json() {
        let env = normalizer().normalize("X", json!("Done"), 0.0);
        let text = render(&env);
        assert!(text.contains('\n'));
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["tool"], "X");
        assert_eq!(parsed["status"], "ok");
        assert!(parsed.get("findings").is_none());
    }
}
