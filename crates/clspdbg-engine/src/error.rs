//! Engine error types.

use thiserror::Error;

/// Errors surfaced by the engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine has not completed initialization.
    #[error("engine not initialized")]
    Unavailable,

    /// The engine reported a compilation failure.
    #[error("compilation failed: {0}")]
    Compile(String),

    /// The engine reported a runtime failure.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Currying a compiled program failed.
    #[error("curry failed: {0}")]
    Curry(String),

    /// A session-level call failed (dead handle, engine-internal fault).
    #[error("session error: {0}")]
    Session(String),
}
