//! Sequence-numbered request dispatch over one engine session.

use std::sync::Arc;

use clspdbg_engine::{DebugEngine, FileResolver, SessionHandle};

use crate::error::DebugError;
use crate::protocol::{parse_batch, Envelope, Request};

/// Reserved sequence number for internal auto-step probes.
///
/// Session-scoped requests carry strictly increasing sequence numbers; the
/// probing loop is the single documented exception and reuses this sentinel
/// for every atomic step it issues. Tests asserting monotonicity must
/// exclude requests with this value.
pub const PROBE_SEQ: i64 = 0;

/// The engine runs exactly one thread of execution.
pub const THREAD_ID: i64 = 1;

/// Issues requests to the engine and parses replies into envelopes.
///
/// Owns the session handle and the sequence counter; knows nothing about
/// step semantics or session state beyond "open or not".
pub struct ProtocolClient {
    engine: Arc<dyn DebugEngine>,
    handle: Option<SessionHandle>,
    next_seq: i64,
}

impl ProtocolClient {
    /// Create a client over `engine` with no open session.
    pub fn new(engine: Arc<dyn DebugEngine>) -> Self {
        Self {
            engine,
            handle: None,
            next_seq: 1,
        }
    }

    /// The engine this client talks to.
    pub fn engine(&self) -> Arc<dyn DebugEngine> {
        self.engine.clone()
    }

    /// Whether a session handle is currently held.
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Create an engine session, resetting the sequence counter.
    pub fn open(&mut self, resolver: Arc<dyn FileResolver>) -> Result<(), DebugError> {
        if !self.engine.ready() {
            return Err(DebugError::EngineUnavailable);
        }
        let handle = self.engine.create_session(resolver)?;
        self.handle = Some(handle);
        self.next_seq = 1;
        Ok(())
    }

    /// Destroy the session handle, if any. Idempotent.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.engine.destroy_session(handle);
        }
        self.next_seq = 1;
    }

    fn next_seq(&mut self) -> i64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Issue one request with the next sequence number.
    pub fn send(
        &mut self,
        command: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<Vec<Envelope>, DebugError> {
        let seq = self.next_seq();
        self.dispatch(seq, command, arguments)
    }

    /// Issue one request with the reserved probe sequence ([`PROBE_SEQ`]).
    pub fn send_probe(
        &mut self,
        command: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<Vec<Envelope>, DebugError> {
        self.dispatch(PROBE_SEQ, command, arguments)
    }

    fn dispatch(
        &mut self,
        seq: i64,
        command: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<Vec<Envelope>, DebugError> {
        let handle = self.handle.ok_or(DebugError::NotDebugging)?;
        let request = Request::new(seq, command, arguments);
        let payload = serde_json::to_string(&request)
            .map_err(|e| DebugError::Protocol(format!("request serialization: {e}")))?;
        tracing::trace!(seq, command, "sending request");
        let raw = self.engine.send_message(handle, &payload)?;
        parse_batch(&raw)
    }
}

impl std::fmt::Debug for ProtocolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolClient")
            .field("active", &self.is_active())
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clspdbg_engine::testing::{stopped_event_json, ScriptedEngine};
    use clspdbg_engine::StaticResolver;

    fn open_client(engine: Arc<ScriptedEngine>) -> ProtocolClient {
        let mut client = ProtocolClient::new(engine);
        client
            .open(Arc::new(StaticResolver::new([("main.clsp", "x")])))
            .unwrap();
        client
    }

    #[test]
    fn client_requires_open_session() {
        let mut client = ProtocolClient::new(Arc::new(ScriptedEngine::new()));
        let err = client.send("stepIn", None).unwrap_err();
        assert!(matches!(err, DebugError::NotDebugging));
    }

    #[test]
    fn client_open_fails_when_engine_unready() {
        let engine = Arc::new(ScriptedEngine::new());
        engine.set_ready(false);
        let mut client = ProtocolClient::new(engine);
        let err = client
            .open(Arc::new(StaticResolver::default()))
            .unwrap_err();
        assert!(matches!(err, DebugError::EngineUnavailable));
    }

    #[test]
    fn client_sequence_numbers_increment_from_one() {
        let engine = Arc::new(ScriptedEngine::new());
        let mut client = open_client(engine.clone());
        client.send("initialize", None).unwrap();
        client.send("launch", None).unwrap();
        client.send("stackTrace", None).unwrap();
        let seqs: Vec<i64> = engine.requests().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn client_probe_uses_sentinel_without_advancing() {
        let engine = Arc::new(ScriptedEngine::new());
        let mut client = open_client(engine.clone());
        client.send("next", None).unwrap();
        client.send_probe("stepIn", None).unwrap();
        client.send_probe("stepIn", None).unwrap();
        client.send("stackTrace", None).unwrap();
        let seqs: Vec<i64> = engine.requests().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![1, PROBE_SEQ, PROBE_SEQ, 2]);
    }

    #[test]
    fn client_parses_scripted_envelopes() {
        let engine = Arc::new(ScriptedEngine::new());
        engine.enqueue("stepIn", vec![stopped_event_json("step")]);
        let mut client = open_client(engine);
        let envelopes = client.send("stepIn", None).unwrap();
        assert_eq!(envelopes.len(), 1);
        assert!(envelopes[0].as_event().is_some());
    }

    #[test]
    fn client_parse_failure_keeps_session() {
        let engine = Arc::new(ScriptedEngine::new());
        engine.enqueue("stepIn", vec!["{{nonsense".to_string()]);
        let mut client = open_client(engine);
        let err = client.send("stepIn", None).unwrap_err();
        assert!(matches!(err, DebugError::Protocol(_)));
        assert!(client.is_active());
    }

    #[test]
    fn client_close_is_idempotent() {
        let engine = Arc::new(ScriptedEngine::new());
        let mut client = open_client(engine.clone());
        assert_eq!(engine.live_sessions(), 1);
        client.close();
        client.close();
        assert_eq!(engine.live_sessions(), 0);
        assert!(!client.is_active());
    }
}
