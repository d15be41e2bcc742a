//! Scripted engine for tests.
//!
//! [`ScriptedEngine`] implements [`DebugEngine`] over canned reply batches:
//! tests enqueue the raw JSON strings a command should return, and the
//! engine records every request it receives so sequencing and ordering
//! properties can be asserted afterwards. When a command's queue runs dry
//! the engine replies with an empty batch, which the client treats as
//! silent termination — a runaway probing loop in a test ends instead of
//! spinning.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::engine::{CompileOutput, CurryOutput, DebugEngine, RunOutput, SessionHandle};
use crate::error::EngineError;
use crate::resolver::FileResolver;

/// One request observed by the scripted engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// Client-assigned sequence number.
    pub seq: i64,
    /// Protocol command name.
    pub command: String,
    /// Request arguments, verbatim.
    pub arguments: serde_json::Value,
}

/// A [`DebugEngine`] driven entirely by scripted replies.
pub struct ScriptedEngine {
    ready: AtomicBool,
    next_handle: AtomicU64,
    live: Mutex<HashSet<u64>>,
    scripts: Mutex<HashMap<String, VecDeque<Vec<String>>>>,
    log: Mutex<Vec<RecordedRequest>>,
    touch_on_launch: Mutex<Vec<String>>,
    resolver: Mutex<Option<Arc<dyn FileResolver>>>,
    compile_error: Mutex<Option<String>>,
    run_error: Mutex<Option<String>>,
    curry_error: Mutex<Option<String>>,
}

impl ScriptedEngine {
    /// Create a ready engine with no scripted replies.
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            next_handle: AtomicU64::new(1),
            live: Mutex::new(HashSet::new()),
            scripts: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            touch_on_launch: Mutex::new(Vec::new()),
            resolver: Mutex::new(None),
            compile_error: Mutex::new(None),
            run_error: Mutex::new(None),
            curry_error: Mutex::new(None),
        }
    }

    /// Control the readiness flag.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Enqueue the reply batch for the next occurrence of `command`.
    pub fn enqueue(&self, command: &str, batch: Vec<String>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(command.to_string())
            .or_default()
            .push_back(batch);
    }

    /// Resolve these paths through the session resolver when `launch`
    /// arrives, imitating the compiler pulling in include files.
    pub fn touch_on_launch(&self, paths: &[&str]) {
        *self.touch_on_launch.lock().unwrap() =
            paths.iter().map(|p| p.to_string()).collect();
    }

    /// Make the next `compile` call fail with this message.
    pub fn fail_compile(&self, message: &str) {
        *self.compile_error.lock().unwrap() = Some(message.to_string());
    }

    /// Make the next `run` call fail with this message.
    pub fn fail_run(&self, message: &str) {
        *self.run_error.lock().unwrap() = Some(message.to_string());
    }

    /// Make the next `curry` call fail with this message.
    pub fn fail_curry(&self, message: &str) {
        *self.curry_error.lock().unwrap() = Some(message.to_string());
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log.lock().unwrap().clone()
    }

    /// The sequence numbers of all received requests named `command`.
    pub fn seqs_for(&self, command: &str) -> Vec<i64> {
        self.requests()
            .into_iter()
            .filter(|r| r.command == command)
            .map(|r| r.seq)
            .collect()
    }

    /// Number of sessions currently alive.
    pub fn live_sessions(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugEngine for ScriptedEngine {
    fn ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn create_session(
        &self,
        resolver: Arc<dyn FileResolver>,
    ) -> Result<SessionHandle, EngineError> {
        if !self.ready() {
            return Err(EngineError::Unavailable);
        }
        let raw = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.live.lock().unwrap().insert(raw);
        *self.resolver.lock().unwrap() = Some(resolver);
        Ok(SessionHandle::new(raw))
    }

    fn destroy_session(&self, handle: SessionHandle) {
        self.live.lock().unwrap().remove(&handle.raw());
    }

    fn send_message(
        &self,
        handle: SessionHandle,
        request: &str,
    ) -> Result<Vec<String>, EngineError> {
        if !self.live.lock().unwrap().contains(&handle.raw()) {
            return Err(EngineError::Session("unknown session handle".into()));
        }

        let parsed: serde_json::Value = serde_json::from_str(request)
            .map_err(|e| EngineError::Session(format!("unparseable request: {e}")))?;
        let command = parsed["command"].as_str().unwrap_or_default().to_string();
        self.log.lock().unwrap().push(RecordedRequest {
            seq: parsed["seq"].as_i64().unwrap_or(-1),
            command: command.clone(),
            arguments: parsed["arguments"].clone(),
        });

        if command == "launch" {
            let resolver = self.resolver.lock().unwrap().clone();
            if let Some(resolver) = resolver {
                for path in self.touch_on_launch.lock().unwrap().iter() {
                    let _ = resolver.resolve(path);
                }
            }
        }

        let batch = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&command)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();
        Ok(batch)
    }

    fn compile(
        &self,
        _source: &str,
        _filename: &str,
        _include_paths: &[String],
        _resolver: Arc<dyn FileResolver>,
    ) -> Result<CompileOutput, EngineError> {
        if let Some(message) = self.compile_error.lock().unwrap().take() {
            return Err(EngineError::Compile(message));
        }
        Ok(CompileOutput {
            hex: "ff0180".into(),
            symbols: serde_json::json!({}),
            compiler: Some("modern".into()),
            hash: Some("0bad5eed".into()),
        })
    }

    fn run(&self, hex: &str, _solution: &str) -> Result<RunOutput, EngineError> {
        if let Some(message) = self.run_error.lock().unwrap().take() {
            return Err(EngineError::Runtime(message));
        }
        let _ = hex;
        Ok(RunOutput {
            result_hex: "2a".into(),
            result_parsed: Some("42".into()),
            cost: Some(1471),
            kind: Some("clvm_execution".into()),
        })
    }

    fn curry(&self, hex: &str, _args: &str) -> Result<CurryOutput, EngineError> {
        if let Some(message) = self.curry_error.lock().unwrap().take() {
            return Err(EngineError::Curry(message));
        }
        Ok(CurryOutput {
            hex: format!("{hex}ff"),
            readable: Some("(a (q . 1) ...)".into()),
            hash: Some("c0ffee00".into()),
        })
    }
}

impl std::fmt::Debug for ScriptedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEngine")
            .field("ready", &self.ready())
            .field("live_sessions", &self.live_sessions())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Raw envelope builders
// ---------------------------------------------------------------------------

/// A `response` envelope as a raw JSON string.
pub fn response_json(
    request_seq: i64,
    command: &str,
    success: bool,
    body: serde_json::Value,
) -> String {
    serde_json::json!({
        "type": "response",
        "request_seq": request_seq,
        "success": success,
        "command": command,
        "body": body,
    })
    .to_string()
}

/// A `response` envelope carrying a transient marker `message`.
pub fn marker_response_json(request_seq: i64, command: &str, message: &str) -> String {
    serde_json::json!({
        "type": "response",
        "request_seq": request_seq,
        "success": true,
        "command": command,
        "message": message,
    })
    .to_string()
}

/// A `stopped` event with the given reason.
pub fn stopped_event_json(reason: &str) -> String {
    serde_json::json!({
        "type": "event",
        "event": "stopped",
        "body": { "reason": reason, "threadId": 1 },
    })
    .to_string()
}

/// A `terminated` event.
pub fn terminated_event_json() -> String {
    serde_json::json!({ "type": "event", "event": "terminated" }).to_string()
}

/// An `output` event with the given text.
pub fn output_event_json(output: &str) -> String {
    serde_json::json!({
        "type": "event",
        "event": "output",
        "body": { "category": "console", "output": output },
    })
    .to_string()
}

/// A `stackTrace` response whose frames are `(id, name, line, column)`.
pub fn stack_trace_response_json(request_seq: i64, frames: &[(i64, &str, u32, u32)]) -> String {
    let frames: Vec<serde_json::Value> = frames
        .iter()
        .map(|(id, name, line, column)| {
            serde_json::json!({ "id": id, "name": name, "line": line, "column": column })
        })
        .collect();
    response_json(
        request_seq,
        "stackTrace",
        true,
        serde_json::json!({ "stackFrames": frames }),
    )
}

/// A `scopes` response with one `(name, variables_reference)` per scope.
pub fn scopes_response_json(request_seq: i64, scopes: &[(&str, i64)]) -> String {
    let scopes: Vec<serde_json::Value> = scopes
        .iter()
        .map(|(name, reference)| {
            serde_json::json!({ "name": name, "variablesReference": reference })
        })
        .collect();
    response_json(
        request_seq,
        "scopes",
        true,
        serde_json::json!({ "scopes": scopes }),
    )
}

/// A `variables` response with one `(name, value)` per variable.
pub fn variables_response_json(request_seq: i64, variables: &[(&str, &str)]) -> String {
    let variables: Vec<serde_json::Value> = variables
        .iter()
        .map(|(name, value)| {
            serde_json::json!({ "name": name, "value": value, "variablesReference": 0 })
        })
        .collect();
    response_json(
        request_seq,
        "variables",
        true,
        serde_json::json!({ "variables": variables }),
    )
}

/// A `setBreakpoints` response confirming the given lines.
pub fn set_breakpoints_response_json(request_seq: i64, lines: &[u32]) -> String {
    let breakpoints: Vec<serde_json::Value> = lines
        .iter()
        .map(|line| serde_json::json!({ "verified": true, "line": line }))
        .collect();
    response_json(
        request_seq,
        "setBreakpoints",
        true,
        serde_json::json!({ "breakpoints": breakpoints }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;

    fn resolver() -> Arc<dyn FileResolver> {
        Arc::new(StaticResolver::new([("main.clsp", "(mod () 1)")]))
    }

    #[test]
    fn scripted_session_lifecycle() {
        let engine = ScriptedEngine::new();
        let handle = engine.create_session(resolver()).unwrap();
        assert_eq!(engine.live_sessions(), 1);
        engine.destroy_session(handle);
        assert_eq!(engine.live_sessions(), 0);
    }

    #[test]
    fn scripted_unready_refuses_sessions() {
        let engine = ScriptedEngine::new();
        engine.set_ready(false);
        assert!(matches!(
            engine.create_session(resolver()),
            Err(EngineError::Unavailable)
        ));
    }

    #[test]
    fn scripted_dead_handle_is_an_error() {
        let engine = ScriptedEngine::new();
        let handle = engine.create_session(resolver()).unwrap();
        engine.destroy_session(handle);
        let err = engine
            .send_message(handle, r#"{"seq":1,"type":"request","command":"stepIn"}"#)
            .unwrap_err();
        assert!(matches!(err, EngineError::Session(_)));
    }

    #[test]
    fn scripted_replays_batches_in_order() {
        let engine = ScriptedEngine::new();
        let handle = engine.create_session(resolver()).unwrap();
        engine.enqueue("stepIn", vec![stopped_event_json("step")]);
        engine.enqueue("stepIn", vec![terminated_event_json()]);

        let first = engine
            .send_message(handle, r#"{"seq":1,"type":"request","command":"stepIn"}"#)
            .unwrap();
        assert!(first[0].contains("stopped"));

        let second = engine
            .send_message(handle, r#"{"seq":2,"type":"request","command":"stepIn"}"#)
            .unwrap();
        assert!(second[0].contains("terminated"));

        // Queue exhausted: empty batch.
        let third = engine
            .send_message(handle, r#"{"seq":3,"type":"request","command":"stepIn"}"#)
            .unwrap();
        assert!(third.is_empty());
    }

    #[test]
    fn scripted_records_requests() {
        let engine = ScriptedEngine::new();
        let handle = engine.create_session(resolver()).unwrap();
        engine
            .send_message(handle, r#"{"seq":5,"type":"request","command":"next"}"#)
            .unwrap();
        let log = engine.requests();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].seq, 5);
        assert_eq!(log[0].command, "next");
    }

    #[test]
    fn scripted_touches_includes_on_launch() {
        let engine = ScriptedEngine::new();
        let tracked = Arc::new(crate::resolver::IncludeTracker::new(
            "main.clsp",
            Arc::new(StaticResolver::new([
                ("main.clsp", "x"),
                ("util.clib", "y"),
            ])),
        ));
        engine.touch_on_launch(&["util.clib"]);
        let handle = engine.create_session(tracked.clone()).unwrap();
        engine
            .send_message(handle, r#"{"seq":1,"type":"request","command":"launch"}"#)
            .unwrap();
        assert_eq!(tracked.includes(), vec!["util.clib".to_string()]);
    }
}
