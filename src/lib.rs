//! clspdbg — a debug client for the Chialisp execution engine.
//!
//! Facade over the workspace crates:
//!
//! * [`engine`] — the boundary to the opaque engine: the [`DebugEngine`]
//!   trait, file resolution with include tracking, and the stateless
//!   compile / curry / run toolchain.
//! * [`dap`] — the debug-adapter-style protocol client: session lifecycle,
//!   stepping (including the auto-step probing loop), breakpoint
//!   synchronization, and location reconciliation.

pub use clspdbg_dap as dap;
pub use clspdbg_engine as engine;

pub use clspdbg_dap::{DebugError, DebugSession, DebugState, StopToken};
pub use clspdbg_engine::{DebugEngine, EngineError, FileResolver, Toolchain};
