//! clspdbg-engine — boundary to the opaque Chialisp execution engine.
//!
//! The engine compiles, runs, curries, and single-steps CLVM programs and is
//! reached only through a narrow synchronous surface: create a session from a
//! file resolver, send one JSON request, receive an array of JSON strings,
//! destroy the session. This crate defines that boundary as the
//! [`DebugEngine`] trait, the [`FileResolver`] callback the engine uses for
//! include lookups, and the stateless compile/run/curry toolchain built on
//! top of it.

pub mod config;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod testing;
pub mod toolchain;

// Re-export key types for convenience.
pub use config::{IncludeConfig, SourceKind};
pub use engine::{CompileOutput, CurryOutput, DebugEngine, RunOutput, SessionHandle};
pub use error::EngineError;
pub use resolver::{is_source_path, FileResolver, IncludeTracker, StaticResolver};
pub use toolchain::{BuildArtifact, ExecutionReport, Toolchain};
