//! Stateless compile / curry / run operations on top of the engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{CurryOutput, DebugEngine};
use crate::error::EngineError;
use crate::resolver::FileResolver;

/// Outcome of a build: compiled (and possibly curried) program plus hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildArtifact {
    /// The executable program — curried when curry arguments were applied.
    pub hex: String,
    /// Puzzle hash of [`hex`](Self::hex).
    pub hash: Option<String>,
    /// The uncurried compiler output.
    pub original_hex: String,
    /// Puzzle hash of the uncurried program.
    pub original_hash: Option<String>,
    /// Puzzle hash of the curried program, when currying was applied.
    pub curried_hash: Option<String>,
    /// Symbol table emitted by the compiler.
    pub symbols: serde_json::Value,
}

/// Outcome of compiling and running a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Human-readable result (falls back to the raw hex result).
    pub result: String,
    /// Execution cost reported by the engine.
    pub cost: Option<u64>,
    /// The program that was executed.
    pub hex: String,
    /// Puzzle hash of the executed program.
    pub hash: Option<String>,
    /// The build that produced the executed program.
    pub build: BuildArtifact,
}

/// Compile, curry, and run programs through a shared engine.
#[derive(Clone)]
pub struct Toolchain {
    engine: Arc<dyn DebugEngine>,
}

/// Curry arguments are skipped when empty or the empty list literal.
fn wants_curry(args: Option<&str>) -> bool {
    matches!(args.map(str::trim), Some(a) if !a.is_empty() && a != "()")
}

impl Toolchain {
    /// Create a toolchain over `engine`.
    pub fn new(engine: Arc<dyn DebugEngine>) -> Self {
        Self { engine }
    }

    /// Compile `source`, optionally currying `curry_args` into the result.
    ///
    /// A curry failure is downgraded to a warning and the uncurried program
    /// is returned; a compile failure is fatal.
    pub fn compile(
        &self,
        source: &str,
        filename: &str,
        include_paths: &[String],
        resolver: Arc<dyn FileResolver>,
        curry_args: Option<&str>,
    ) -> Result<BuildArtifact, EngineError> {
        if source.trim().is_empty() {
            return Err(EngineError::Compile("no source to compile".into()));
        }
        if !self.engine.ready() {
            return Err(EngineError::Unavailable);
        }

        let out = self
            .engine
            .compile(source, filename, include_paths, resolver)?;

        let mut artifact = BuildArtifact {
            hex: out.hex.clone(),
            hash: out.hash.clone(),
            original_hex: out.hex,
            original_hash: out.hash,
            curried_hash: None,
            symbols: out.symbols,
        };

        if wants_curry(curry_args) {
            let args = curry_args.unwrap_or_default();
            match self.engine.curry(&artifact.original_hex, args) {
                Ok(curried) => {
                    artifact.hex = curried.hex;
                    artifact.hash = curried.hash.clone();
                    artifact.curried_hash = curried.hash;
                }
                Err(err) => {
                    tracing::warn!("curry failed, keeping uncurried program: {}", err);
                }
            }
        }

        Ok(artifact)
    }

    /// Compile and run `source` against a solution argument list.
    pub fn execute(
        &self,
        source: &str,
        filename: &str,
        include_paths: &[String],
        resolver: Arc<dyn FileResolver>,
        curry_args: Option<&str>,
        solution: &str,
    ) -> Result<ExecutionReport, EngineError> {
        let build = self.compile(source, filename, include_paths, resolver, curry_args)?;
        let run = self.engine.run(&build.hex, solution)?;

        Ok(ExecutionReport {
            result: run.result_parsed.unwrap_or_else(|| run.result_hex.clone()),
            cost: run.cost,
            hex: build.hex.clone(),
            hash: build.hash.clone(),
            build,
        })
    }

    /// Curry fixed arguments into an already-compiled program.
    pub fn curry(&self, hex: &str, args: &str) -> Result<CurryOutput, EngineError> {
        if !self.engine.ready() {
            return Err(EngineError::Unavailable);
        }
        self.engine.curry(hex, args)
    }
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain").finish_non_exhaustive()
    }
}
