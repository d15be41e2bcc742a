//! clspdbg-dap — debug session protocol client for the Chialisp engine.
//!
//! The engine can only create a session, answer one JSON request with an
//! array of JSON strings, and destroy the session. Everything else — the
//! session lifecycle, step semantics, the auto-step probing loop,
//! breakpoint propagation across discovered include files, and location
//! reconciliation between engine frames and editor files — is built in
//! this crate on top of that primitive.

pub mod breakpoint;
pub mod client;
pub mod error;
pub mod location;
pub mod protocol;
pub mod session;
pub mod stepping;
pub mod variables;

// Re-export key types for convenience.
pub use breakpoint::BreakpointStore;
pub use client::{ProtocolClient, PROBE_SEQ, THREAD_ID};
pub use error::DebugError;
pub use location::{
    parse_frame_name, reconcile_filename, Location, NavigationTarget,
};
pub use protocol::{Envelope, StopReason};
pub use session::{
    CompileInfo, DebugSession, DebugState, SessionPhase, StopToken, ToggleOutcome,
};
pub use variables::DisplayVariable;
