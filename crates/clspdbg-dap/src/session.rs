//! Debug session lifecycle and observable state.
//!
//! One [`DebugSession`] owns the protocol client, the breakpoint store, and
//! the last settled view of the debuggee. It is created idle, activated by
//! [`launch`](DebugSession::launch), and invalidated by
//! [`stop`](DebugSession::stop) or by reaching a terminal state — there are
//! no ambient globals, and at most one engine session exists at a time.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use clspdbg_engine::{DebugEngine, FileResolver, IncludeTracker};

use crate::breakpoint::BreakpointStore;
use crate::client::{ProtocolClient, THREAD_ID};
use crate::error::DebugError;
use crate::location::{
    location_from_frame, navigation_target, strip_synthetic_prefix, Location, NavigationTarget,
};
use crate::protocol::{
    find_response, Envelope, Scope, ScopesBody, SetBreakpointsBody, StackFrame, StackTraceBody,
    VariablesBody,
};
use crate::variables::{decorate_all, DisplayVariable};

/// Marker prefixing the engine's compile-time metadata output event.
const COMPILATION_INFO_PREFIX: &str = "COMPILATION_INFO:";

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session.
    Idle,
    /// Session active; the engine is executing or at a stop.
    Running,
    /// Terminal. Only a fresh launch is valid.
    Finished,
}

/// Cancellation flag shared with in-flight stepping operations.
///
/// Cloneable so the embedder can trip it from outside while a stepping
/// future is suspended; the probing loop checks it once per iteration.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Compile-time metadata reported by the engine at launch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileInfo {
    /// Compiled program, hex-encoded.
    pub hex: String,
    /// Symbol table (hash → name).
    pub symbols: serde_json::Value,
    /// Puzzle hash of the compiled program.
    pub hash: Option<String>,
}

impl CompileInfo {
    /// Number of entries in the symbol table.
    pub fn symbol_count(&self) -> usize {
        self.symbols.as_object().map_or(0, |o| o.len())
    }
}

/// The externally observed snapshot after every settled operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugState {
    /// Current stop location, absent once finished.
    pub location: Option<Location>,
    /// Call stack, innermost first.
    pub stack_frames: Vec<StackFrame>,
    /// Decorated variables per scope name.
    pub variables: BTreeMap<String, Vec<DisplayVariable>>,
    /// Whether a session is active.
    pub is_debugging: bool,
    /// Whether the session reached a terminal state.
    pub finished: bool,
    /// Whether the last stop was a breakpoint hit.
    pub stopped_at_breakpoint: bool,
    /// The program's result, extracted on termination.
    pub final_result: Option<String>,
}

/// Result of toggling a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// Whether the line was added (`false` means removed).
    pub added: bool,
    /// The file's full breakpoint set after the toggle, ascending.
    pub lines: Vec<u32>,
    /// Whether the set reached the engine (always `false` when idle).
    pub pushed: bool,
}

/// A single debug session over an opaque engine.
pub struct DebugSession {
    pub(crate) client: ProtocolClient,
    breakpoints: BreakpointStore,
    tracker: Option<Arc<IncludeTracker>>,
    compile_info: Option<CompileInfo>,
    pub(crate) phase: SessionPhase,
    stop_token: StopToken,
    pub(crate) location: Option<Location>,
    pub(crate) stack_frames: Vec<StackFrame>,
    pub(crate) variables: BTreeMap<String, Vec<DisplayVariable>>,
    pub(crate) stopped_at_breakpoint: bool,
    pub(crate) final_result: Option<String>,
}

impl DebugSession {
    /// Create an idle session over `engine`.
    pub fn new(engine: Arc<dyn DebugEngine>) -> Self {
        Self {
            client: ProtocolClient::new(engine),
            breakpoints: BreakpointStore::new(),
            tracker: None,
            compile_info: None,
            phase: SessionPhase::Idle,
            stop_token: StopToken::default(),
            location: None,
            stack_frames: Vec::new(),
            variables: BTreeMap::new(),
            stopped_at_breakpoint: false,
            final_result: None,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether a session is active.
    pub fn is_debugging(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    /// The cancellation token for the current session.
    pub fn stop_token(&self) -> StopToken {
        self.stop_token.clone()
    }

    /// Compile-time metadata captured at launch, when the engine emitted it.
    pub fn compile_info(&self) -> Option<&CompileInfo> {
        self.compile_info.as_ref()
    }

    /// Include files discovered during the launch compilation.
    pub fn includes(&self) -> Vec<String> {
        self.tracker
            .as_ref()
            .map(|t| t.includes())
            .unwrap_or_default()
    }

    /// Read access to the breakpoint store.
    pub fn breakpoints(&self) -> &BreakpointStore {
        &self.breakpoints
    }

    /// Launch a debug session on `entry_file`, stopping on entry.
    ///
    /// Creates the engine session, performs the initialize/launch handshake,
    /// captures compile metadata, computes the initial stop location, and
    /// pushes breakpoints for the entry file and every discovered include.
    pub fn launch(
        &mut self,
        entry_file: &str,
        args: &[String],
        resolver: Arc<dyn FileResolver>,
    ) -> Result<DebugState, DebugError> {
        // At most one session: tear down whatever is left of the last one.
        self.stop();

        let tracker = Arc::new(IncludeTracker::new(entry_file, resolver));
        self.client.open(tracker.clone())?;
        self.tracker = Some(tracker);
        self.stop_token = StopToken::default();
        self.compile_info = None;
        self.final_result = None;

        if let Err(err) = self.handshake(entry_file, args) {
            self.stop();
            return Err(err);
        }
        self.phase = SessionPhase::Running;

        if let Err(err) = self.refresh_state() {
            tracing::warn!("initial state refresh failed: {}", err);
        }

        let entry_lines = self.breakpoints.lines(entry_file);
        if !entry_lines.is_empty() {
            if let Err(err) = self.push_breakpoints(entry_file) {
                tracing::warn!("breakpoint push for {} failed: {}", entry_file, err);
            }
        }
        self.sync_includes();

        tracing::debug!(entry_file, "debug session launched");
        Ok(self.snapshot())
    }

    fn handshake(&mut self, entry_file: &str, args: &[String]) -> Result<(), DebugError> {
        self.client.send(
            "initialize",
            Some(serde_json::json!({
                "clientID": "clspdbg",
                "clientName": "Chialisp Debugger",
                "adapterID": "chialisp",
            })),
        )?;

        let envelopes = self.client.send(
            "launch",
            Some(serde_json::json!({
                "name": entry_file,
                "program": entry_file,
                "stopOnEntry": true,
                "args": args,
                "symbols": "{}",
            })),
        )?;
        self.compile_info = extract_compile_info(&envelopes);
        Ok(())
    }

    /// End the session unconditionally. No protocol message is sent; the
    /// handle is released and all in-memory state reset. Idempotent.
    pub fn stop(&mut self) {
        self.stop_token.cancel();
        self.client.close();
        self.tracker = None;
        self.phase = SessionPhase::Idle;
        self.location = None;
        self.stack_frames.clear();
        self.variables.clear();
        self.stopped_at_breakpoint = false;
    }

    /// Transition to the terminal state, extracting the final result from
    /// the last refreshed variables and releasing the engine session.
    pub(crate) fn finish(&mut self) {
        self.final_result = extract_final_result(&self.variables);
        self.client.close();
        self.phase = SessionPhase::Finished;
        self.location = None;
        self.stack_frames.clear();
        self.variables.clear();
        self.stopped_at_breakpoint = false;
        tracing::debug!("debug session finished");
    }

    /// Flip a breakpoint and, when a session is active, immediately re-push
    /// the file's full set to the engine.
    pub fn toggle_breakpoint(&mut self, file: &str, line: u32) -> ToggleOutcome {
        let added = self.breakpoints.toggle(file, line);
        let lines = self.breakpoints.lines(file);

        let pushed = if self.is_debugging() {
            match self.push_breakpoints(file) {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!("breakpoint push for {} failed: {}", file, err);
                    false
                }
            }
        } else {
            false
        };

        ToggleOutcome {
            added,
            lines,
            pushed,
        }
    }

    /// Restore a file's breakpoint set wholesale (e.g. from saved state),
    /// re-pushing it when a session is active.
    pub fn restore_breakpoints(&mut self, file: &str, lines: &[u32]) {
        self.breakpoints.set_lines(file, lines.iter().copied());
        if self.is_debugging() {
            if let Err(err) = self.push_breakpoints(file) {
                tracing::warn!("breakpoint push for {} failed: {}", file, err);
            }
        }
    }

    /// Push the file's current breakpoint set to the engine.
    ///
    /// Returns `Ok(true)` when the engine confirmed the set, `Ok(false)`
    /// when it answered but rejected it (client-side state is kept either
    /// way). An empty set clears the file's breakpoints engine-side.
    pub fn push_breakpoints(&mut self, file: &str) -> Result<bool, DebugError> {
        if !self.client.is_active() {
            return Err(DebugError::NotDebugging);
        }

        let wire_file = strip_synthetic_prefix(file);
        let breakpoints: Vec<serde_json::Value> = self
            .breakpoints
            .lines(file)
            .into_iter()
            .map(|line| serde_json::json!({ "line": line, "column": 1 }))
            .collect();

        let envelopes = self.client.send(
            "setBreakpoints",
            Some(serde_json::json!({
                "source": { "name": wire_file, "path": wire_file },
                "breakpoints": breakpoints,
            })),
        )?;

        let confirmed = find_response(&envelopes, "setBreakpoints").is_some_and(|response| {
            response.success
                && response
                    .body
                    .clone()
                    .and_then(|b| serde_json::from_value::<SetBreakpointsBody>(b).ok())
                    .is_some()
        });
        if !confirmed {
            tracing::warn!("engine did not confirm breakpoints for {}", wire_file);
        }
        Ok(confirmed)
    }

    /// Push stored breakpoint sets for every include file discovered during
    /// compilation, even for files never opened in the editor.
    pub fn sync_includes(&mut self) {
        for file in self.includes() {
            if self.breakpoints.lines(&file).is_empty() {
                continue;
            }
            match self.push_breakpoints(&file) {
                Ok(true) => tracing::debug!("breakpoints synced for include {}", file),
                Ok(false) => tracing::warn!("engine rejected breakpoints for include {}", file),
                Err(err) => tracing::warn!("breakpoint sync for {} failed: {}", file, err),
            }
        }
    }

    /// Load the scopes of a stack frame.
    pub fn load_scopes(&mut self, frame_id: i64) -> Result<Vec<Scope>, DebugError> {
        let envelopes = self.client.send(
            "scopes",
            Some(serde_json::json!({ "frameId": frame_id })),
        )?;
        Ok(parse_body::<ScopesBody>(&envelopes, "scopes")
            .map(|body| body.scopes)
            .unwrap_or_default())
    }

    /// Load and decorate the variables behind a reference.
    pub fn load_variables(
        &mut self,
        variables_reference: i64,
    ) -> Result<Vec<DisplayVariable>, DebugError> {
        let envelopes = self.client.send(
            "variables",
            Some(serde_json::json!({ "variablesReference": variables_reference })),
        )?;
        Ok(parse_body::<VariablesBody>(&envelopes, "variables")
            .map(|body| decorate_all(body.variables))
            .unwrap_or_default())
    }

    /// Re-query the stack and the top frame's variables.
    pub(crate) fn refresh_state(&mut self) -> Result<(), DebugError> {
        let envelopes = self.client.send(
            "stackTrace",
            Some(serde_json::json!({ "threadId": THREAD_ID })),
        )?;
        let Some(body) = parse_body::<StackTraceBody>(&envelopes, "stackTrace") else {
            return Ok(());
        };

        self.stack_frames = body.stack_frames;
        self.location = self.stack_frames.first().map(location_from_frame);

        if let Some(frame_id) = self.stack_frames.first().map(|f| f.id) {
            let scopes = self.load_scopes(frame_id)?;
            let mut variables = BTreeMap::new();
            for scope in scopes {
                if scope.variables_reference > 0 {
                    let vars = self.load_variables(scope.variables_reference)?;
                    variables.insert(scope.name, vars);
                }
            }
            self.variables = variables;
        }
        Ok(())
    }

    /// The externally observed snapshot of the session.
    pub fn snapshot(&self) -> DebugState {
        DebugState {
            location: self.location.clone(),
            stack_frames: self.stack_frames.clone(),
            variables: self.variables.clone(),
            is_debugging: self.is_debugging(),
            finished: self.phase == SessionPhase::Finished,
            stopped_at_breakpoint: self.stopped_at_breakpoint,
            final_result: self.final_result.clone(),
        }
    }

    /// How the editor should navigate to the current stop, given its open
    /// files. `None` when there is no current location.
    pub fn navigation(&self, open_files: &[String]) -> Option<NavigationTarget> {
        self.location
            .as_ref()
            .map(|location| navigation_target(location, open_files))
    }
}

impl std::fmt::Debug for DebugSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSession")
            .field("phase", &self.phase)
            .field("location", &self.location)
            .field("breakpoints", &self.breakpoints.len())
            .finish()
    }
}

/// Parse the typed body of the first response to `command`.
fn parse_body<T: serde::de::DeserializeOwned>(
    envelopes: &[Envelope],
    command: &str,
) -> Option<T> {
    let response = find_response(envelopes, command)?;
    if !response.success {
        return None;
    }
    let body = response.body.clone()?;
    match serde_json::from_value(body) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!("malformed {} body: {}", command, err);
            None
        }
    }
}

/// Pull compile metadata out of the launch envelopes.
fn extract_compile_info(envelopes: &[Envelope]) -> Option<CompileInfo> {
    for envelope in envelopes {
        let Some(event) = envelope.as_event() else {
            continue;
        };
        let Some(text) = event.output_text() else {
            continue;
        };
        let Some(payload) = text.strip_prefix(COMPILATION_INFO_PREFIX) else {
            continue;
        };
        match serde_json::from_str(payload) {
            Ok(info) => return Some(info),
            Err(err) => {
                tracing::warn!("unparseable compilation info: {}", err);
                return None;
            }
        }
    }
    None
}

/// Names that mark a variable as the program's result.
const RESULT_NAME_HINTS: [&str; 4] = ["result", "value", "output", "return"];

/// Pick the program's final result out of the last refreshed variables.
///
/// Prefers variables whose name hints at a result, then falls back to the
/// last variable of the first non-empty scope. Truncated display values
/// fall back to their retained originals.
fn extract_final_result(
    variables: &BTreeMap<String, Vec<DisplayVariable>>,
) -> Option<String> {
    let full_value = |var: &DisplayVariable| -> String {
        match (&var.original_value, var.value.contains("...")) {
            (Some(original), true) => original.clone(),
            _ => var.value.clone(),
        }
    };

    for vars in variables.values() {
        for var in vars {
            let lowered = var.name.to_lowercase();
            if RESULT_NAME_HINTS.iter().any(|hint| lowered.contains(hint)) {
                return Some(full_value(var));
            }
        }
    }

    variables
        .values()
        .find(|vars| !vars.is_empty())
        .and_then(|vars| vars.last())
        .map(full_value)
}
