//! Protocol message types and the single raw-JSON parse point.
//!
//! The engine answers every request with an array of JSON strings, each of
//! which holds either one envelope object or an array of them. Everything
//! downstream works against the tagged [`Envelope`] union produced by
//! [`parse_batch`]; nothing else in the crate touches raw engine JSON.

use serde::{Deserialize, Serialize};

use crate::error::DebugError;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// An outgoing protocol request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Client-assigned sequence number.
    pub seq: i64,
    /// Always "request".
    #[serde(rename = "type")]
    pub message_type: String,
    /// The command to execute.
    pub command: String,
    /// Command arguments (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

impl Request {
    /// Build a request with the given sequence number.
    pub fn new(seq: i64, command: &str, arguments: Option<serde_json::Value>) -> Self {
        Self {
            seq,
            message_type: "request".into(),
            command: command.into(),
            arguments,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// A response to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Sequence number of the corresponding request.
    #[serde(default)]
    pub request_seq: i64,
    /// Whether the request was successful.
    #[serde(default)]
    pub success: bool,
    /// The command this response is for.
    #[serde(default)]
    pub command: String,
    /// Short message — error text, or a transient run marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response body (command-specific).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

/// An event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The event name.
    pub event: String,
    /// Event body (event-specific).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl Event {
    /// Typed body of a `stopped` event.
    pub fn stopped_body(&self) -> Option<StoppedEventBody> {
        if self.event != "stopped" {
            return None;
        }
        self.body
            .clone()
            .and_then(|b| serde_json::from_value(b).ok())
    }

    /// Text of an `output` event.
    pub fn output_text(&self) -> Option<&str> {
        if self.event != "output" {
            return None;
        }
        self.body.as_ref()?.get("output")?.as_str()
    }
}

/// One envelope of an engine reply: a response or an event.
///
/// The engine discriminates the two shapes only by which fields are
/// present; [`Envelope::from_value`] is the one place that distinction is
/// made.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// A response to a request.
    Response(Response),
    /// An engine-emitted event.
    Event(Event),
}

impl Envelope {
    /// Classify a raw JSON object as a response or an event.
    pub fn from_value(value: serde_json::Value) -> Result<Self, DebugError> {
        let obj = value
            .as_object()
            .ok_or_else(|| DebugError::Protocol("envelope is not an object".into()))?;

        if obj.get("event").map_or(false, |e| e.is_string()) {
            let event = serde_json::from_value(value.clone())
                .map_err(|e| DebugError::Protocol(format!("bad event envelope: {e}")))?;
            return Ok(Self::Event(event));
        }

        let looks_like_response = obj.contains_key("request_seq")
            || obj.contains_key("command")
            || obj.get("type").and_then(|t| t.as_str()) == Some("response");
        if looks_like_response {
            let response = serde_json::from_value(value.clone())
                .map_err(|e| DebugError::Protocol(format!("bad response envelope: {e}")))?;
            return Ok(Self::Response(response));
        }

        Err(DebugError::Protocol(format!(
            "envelope is neither response nor event: {value}"
        )))
    }

    /// The response, if this envelope is one.
    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Self::Response(response) => Some(response),
            Self::Event(_) => None,
        }
    }

    /// The event, if this envelope is one.
    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Self::Event(event) => Some(event),
            Self::Response(_) => None,
        }
    }
}

/// Parse the engine's raw array-of-JSON-strings into envelopes.
///
/// Blank entries are skipped; an entry holding a JSON array is flattened.
/// Any unparseable entry fails the whole batch.
pub fn parse_batch(raw: &[String]) -> Result<Vec<Envelope>, DebugError> {
    let mut envelopes = Vec::new();
    for entry in raw {
        if entry.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(entry)
            .map_err(|e| DebugError::Protocol(format!("unparseable engine reply: {e}")))?;
        match value {
            serde_json::Value::Array(items) => {
                for item in items {
                    envelopes.push(Envelope::from_value(item)?);
                }
            }
            other => envelopes.push(Envelope::from_value(other)?),
        }
    }
    Ok(envelopes)
}

/// First event named `name` in a batch.
pub fn find_event<'a>(envelopes: &'a [Envelope], name: &str) -> Option<&'a Event> {
    envelopes
        .iter()
        .filter_map(Envelope::as_event)
        .find(|e| e.event == name)
}

/// First response to `command` in a batch.
pub fn find_response<'a>(envelopes: &'a [Envelope], command: &str) -> Option<&'a Response> {
    envelopes
        .iter()
        .filter_map(Envelope::as_response)
        .find(|r| r.command == command)
}

/// First response message starting with `prefix` — the engine's transient
/// "run ..." acknowledgement markers.
pub fn find_marker<'a>(envelopes: &'a [Envelope], prefix: &str) -> Option<&'a str> {
    envelopes
        .iter()
        .filter_map(Envelope::as_response)
        .filter_map(|r| r.message.as_deref())
        .find(|m| m.starts_with(prefix))
}

// ---------------------------------------------------------------------------
// Event bodies and runtime types
// ---------------------------------------------------------------------------

/// Why the debuggee paused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The entry point was reached.
    Entry,
    /// A step request completed.
    Step,
    /// A breakpoint was hit.
    Breakpoint,
    /// Any other engine-supplied reason, verbatim.
    Other(String),
}

impl StopReason {
    /// Parse an engine-supplied reason string.
    pub fn parse(reason: &str) -> Self {
        match reason {
            "entry" => Self::Entry,
            "step" => Self::Step,
            "breakpoint" => Self::Breakpoint,
            other => Self::Other(other.to_string()),
        }
    }

    /// The wire spelling of the reason.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Entry => "entry",
            Self::Step => "step",
            Self::Breakpoint => "breakpoint",
            Self::Other(reason) => reason,
        }
    }
}

impl Serialize for StopReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StopReason {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let reason = String::deserialize(deserializer)?;
        Ok(Self::parse(&reason))
    }
}

/// Body of the `stopped` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    /// The reason for the stop.
    pub reason: StopReason,
    /// Thread that stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    /// Additional text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A stack frame; innermost first in a `stackTrace` body.
///
/// `name` is a composite `<file>(<line>):<column>` string when the engine
/// has a precise location, or a bare filename when it does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Frame identifier, used for `scopes` requests.
    pub id: i64,
    /// Composite location string or bare filename.
    pub name: String,
    /// Engine-reported line, when the name carries none.
    #[serde(default)]
    pub line: u32,
    /// Engine-reported column, when the name carries none.
    #[serde(default)]
    pub column: u32,
}

/// Body of a `stackTrace` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceBody {
    /// Frames, innermost first.
    pub stack_frames: Vec<StackFrame>,
}

/// A variable container within a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Scope name (e.g. "Locals").
    pub name: String,
    /// Reference for a `variables` request; 0 means empty.
    pub variables_reference: i64,
}

/// Body of a `scopes` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopesBody {
    /// The frame's scopes.
    pub scopes: Vec<Scope>,
}

/// A variable as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Variable name.
    pub name: String,
    /// Rendered value.
    pub value: String,
    /// If > 0, the variable has children behind this reference.
    #[serde(default)]
    pub variables_reference: i64,
}

/// Body of a `variables` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariablesBody {
    /// The variables in the requested container.
    pub variables: Vec<Variable>,
}

/// One confirmed breakpoint in a `setBreakpoints` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakpointConfirmation {
    /// Whether the engine accepted the breakpoint.
    #[serde(default)]
    pub verified: bool,
    /// The line the engine placed it on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Body of a `setBreakpoints` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetBreakpointsBody {
    /// Confirmations, one per requested breakpoint.
    pub breakpoints: Vec<BreakpointConfirmation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_request_wire_shape() {
        let req = Request::new(3, "stepIn", Some(serde_json::json!({"threadId": 1})));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["seq"], 3);
        assert_eq!(json["type"], "request");
        assert_eq!(json["command"], "stepIn");
        assert_eq!(json["arguments"]["threadId"], 1);
    }

    #[test]
    fn protocol_request_without_arguments_omits_field() {
        let req = Request::new(1, "threads", None);
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("arguments"));
    }

    #[test]
    fn protocol_envelope_discriminates_event() {
        let value = serde_json::json!({"type": "event", "event": "stopped", "body": {"reason": "step"}});
        let envelope = Envelope::from_value(value).unwrap();
        let event = envelope.as_event().unwrap();
        assert_eq!(event.event, "stopped");
        assert_eq!(event.stopped_body().unwrap().reason, StopReason::Step);
    }

    #[test]
    fn protocol_envelope_discriminates_response() {
        let value = serde_json::json!({
            "type": "response", "request_seq": 2, "success": true,
            "command": "setBreakpoints", "body": {"breakpoints": []}
        });
        let envelope = Envelope::from_value(value).unwrap();
        let response = envelope.as_response().unwrap();
        assert!(response.success);
        assert_eq!(response.command, "setBreakpoints");
    }

    #[test]
    fn protocol_envelope_rejects_unknown_shape() {
        let err = Envelope::from_value(serde_json::json!({"what": "is this"})).unwrap_err();
        assert!(matches!(err, DebugError::Protocol(_)));
        let err = Envelope::from_value(serde_json::json!(42)).unwrap_err();
        assert!(matches!(err, DebugError::Protocol(_)));
    }

    #[test]
    fn protocol_parse_batch_flattens_arrays() {
        let raw = vec![serde_json::json!([
            {"type": "response", "request_seq": 1, "success": true, "command": "launch"},
            {"type": "event", "event": "stopped", "body": {"reason": "entry"}}
        ])
        .to_string()];
        let envelopes = parse_batch(&raw).unwrap();
        assert_eq!(envelopes.len(), 2);
        assert!(envelopes[0].as_response().is_some());
        assert!(envelopes[1].as_event().is_some());
    }

    #[test]
    fn protocol_parse_batch_skips_blank_entries() {
        let raw = vec![
            String::new(),
            "   ".to_string(),
            serde_json::json!({"type": "event", "event": "terminated"}).to_string(),
        ];
        let envelopes = parse_batch(&raw).unwrap();
        assert_eq!(envelopes.len(), 1);
    }

    #[test]
    fn protocol_parse_batch_empty_input() {
        assert!(parse_batch(&[]).unwrap().is_empty());
        assert!(parse_batch(&[String::new()]).unwrap().is_empty());
    }

    #[test]
    fn protocol_parse_batch_rejects_garbage() {
        let err = parse_batch(&["not json".to_string()]).unwrap_err();
        assert!(matches!(err, DebugError::Protocol(_)));
    }

    #[test]
    fn protocol_find_helpers() {
        let raw = vec![serde_json::json!([
            {"type": "response", "request_seq": 1, "success": true, "command": "next",
             "message": "run next to line 12"},
            {"type": "event", "event": "output", "body": {"output": "hello"}}
        ])
        .to_string()];
        let envelopes = parse_batch(&raw).unwrap();

        assert!(find_response(&envelopes, "next").is_some());
        assert!(find_response(&envelopes, "stepIn").is_none());
        assert_eq!(
            find_event(&envelopes, "output").unwrap().output_text(),
            Some("hello")
        );
        assert_eq!(
            find_marker(&envelopes, "run next"),
            Some("run next to line 12")
        );
        assert!(find_marker(&envelopes, "run step out").is_none());
    }

    #[test]
    fn protocol_stop_reason_round_trip() {
        for (reason, wire) in [
            (StopReason::Entry, "\"entry\""),
            (StopReason::Step, "\"step\""),
            (StopReason::Breakpoint, "\"breakpoint\""),
            (StopReason::Other("pause".into()), "\"pause\""),
        ] {
            assert_eq!(serde_json::to_string(&reason).unwrap(), wire);
            let decoded: StopReason = serde_json::from_str(wire).unwrap();
            assert_eq!(decoded, reason);
        }
    }

    #[test]
    fn protocol_stack_frame_defaults_position() {
        let frame: StackFrame =
            serde_json::from_value(serde_json::json!({"id": 0, "name": "main.clsp"})).unwrap();
        assert_eq!(frame.line, 0);
        assert_eq!(frame.column, 0);
    }

    #[test]
    fn protocol_stack_trace_body_camel_case() {
        let body: StackTraceBody = serde_json::from_value(serde_json::json!({
            "stackFrames": [{"id": 1, "name": "main.clsp(3):1", "line": 3, "column": 1}]
        }))
        .unwrap();
        assert_eq!(body.stack_frames.len(), 1);
        assert_eq!(body.stack_frames[0].name, "main.clsp(3):1");
    }

    #[test]
    fn protocol_output_text_only_for_output_events() {
        let event = Event {
            event: "stopped".into(),
            body: Some(serde_json::json!({"output": "x"})),
        };
        assert_eq!(event.output_text(), None);
    }
}
