//! The `DebugEngine` trait — the full surface of the external engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::resolver::FileResolver;

/// Opaque handle to engine-side session state.
///
/// Issued by [`DebugEngine::create_session`] and meaningless to the client
/// beyond identity; the engine owns whatever the handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(u64);

impl SessionHandle {
    /// Wrap a raw engine-assigned id.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id, for engines that key sessions numerically.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Result of a successful compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileOutput {
    /// Serialized CLVM bytecode, hex-encoded.
    pub hex: String,
    /// Symbol table emitted by the compiler (hash → name).
    pub symbols: serde_json::Value,
    /// Which compiler frontend produced the output.
    pub compiler: Option<String>,
    /// Puzzle hash of the compiled program.
    pub hash: Option<String>,
}

/// Result of running a compiled program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// The raw result, hex-encoded.
    pub result_hex: String,
    /// Human-readable rendering of the result.
    pub result_parsed: Option<String>,
    /// Execution cost reported by the engine.
    pub cost: Option<u64>,
    /// Execution kind tag (e.g. `clvm_execution`).
    pub kind: Option<String>,
}

/// Result of currying fixed arguments into a compiled program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurryOutput {
    /// The curried program, hex-encoded.
    pub hex: String,
    /// Human-readable rendering of the curried program.
    pub readable: Option<String>,
    /// Puzzle hash of the curried program.
    pub hash: Option<String>,
}

/// The opaque execution engine.
///
/// Everything session-shaped goes through three calls: create a session from
/// a file resolver, send one JSON request and receive an ordered array of
/// JSON strings back, destroy the session. The three stateless calls
/// (compile, run, curry) sit outside any session. All calls are synchronous
/// from the caller's point of view; the engine never calls back except
/// through the supplied [`FileResolver`].
pub trait DebugEngine: Send + Sync {
    /// Whether the engine has completed initialization and can serve calls.
    fn ready(&self) -> bool;

    /// Create a debug session. The resolver is retained by the engine for
    /// include lookups during compilation inside `launch`.
    fn create_session(&self, resolver: Arc<dyn FileResolver>)
        -> Result<SessionHandle, EngineError>;

    /// Destroy a session. Unknown or already-destroyed handles are ignored.
    fn destroy_session(&self, handle: SessionHandle);

    /// Send one serialized protocol request, receiving the engine's raw
    /// array-of-JSON-strings reply (possibly empty).
    fn send_message(
        &self,
        handle: SessionHandle,
        request: &str,
    ) -> Result<Vec<String>, EngineError>;

    /// Compile source text to CLVM, resolving includes through `resolver`.
    fn compile(
        &self,
        source: &str,
        filename: &str,
        include_paths: &[String],
        resolver: Arc<dyn FileResolver>,
    ) -> Result<CompileOutput, EngineError>;

    /// Run a compiled program against a solution argument list.
    fn run(&self, hex: &str, solution: &str) -> Result<RunOutput, EngineError>;

    /// Curry fixed arguments into a compiled program.
    fn curry(&self, hex: &str, args: &str) -> Result<CurryOutput, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_session_handle_identity() {
        let a = SessionHandle::new(7);
        let b = SessionHandle::new(7);
        let c = SessionHandle::new(8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.raw(), 7);
    }

    #[test]
    fn engine_compile_output_serde() {
        let out = CompileOutput {
            hex: "ff01ff02".into(),
            symbols: serde_json::json!({"abc123": "main"}),
            compiler: Some("modern".into()),
            hash: Some("deadbeef".into()),
        };
        let json = serde_json::to_string(&out).unwrap();
        let decoded: CompileOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(out, decoded);
    }

    #[test]
    fn engine_run_output_serde() {
        let out = RunOutput {
            result_hex: "80".into(),
            result_parsed: Some("()".into()),
            cost: Some(1234),
            kind: Some("clvm_execution".into()),
        };
        let json = serde_json::to_string(&out).unwrap();
        let decoded: RunOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(out, decoded);
    }
}
