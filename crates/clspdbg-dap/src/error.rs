//! Debug client error types.

use clspdbg_engine::EngineError;
use thiserror::Error;

/// Errors from debug client operations.
#[derive(Debug, Error)]
pub enum DebugError {
    /// The engine has not completed initialization.
    #[error("engine not initialized")]
    EngineUnavailable,

    /// A session-scoped operation was attempted without an active session.
    #[error("no active debug session")]
    NotDebugging,

    /// The engine returned a malformed or unparseable payload.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The engine boundary itself failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_engine_unavailable_display() {
        assert_eq!(
            DebugError::EngineUnavailable.to_string(),
            "engine not initialized"
        );
    }

    #[test]
    fn error_not_debugging_display() {
        assert_eq!(DebugError::NotDebugging.to_string(), "no active debug session");
    }

    #[test]
    fn error_protocol_display() {
        let err = DebugError::Protocol("expected array".into());
        assert_eq!(err.to_string(), "protocol error: expected array");
    }

    #[test]
    fn error_engine_passthrough() {
        let err = DebugError::from(EngineError::Runtime("raise".into()));
        assert_eq!(err.to_string(), "runtime error: raise");
        assert!(matches!(err, DebugError::Engine(_)));
    }
}
