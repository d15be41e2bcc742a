//! Step and continue decision procedures.
//!
//! The engine cannot perform step-over, step-out, or continue as single
//! atomic calls: it acknowledges the request with a transient "run ..."
//! marker and expects the client to drive execution forward with atomic
//! `stepIn` probes until something worth stopping for happens. That probing
//! loop — and the classification of each probe's envelopes into
//! stop/terminate signals — lives here.

use tokio::task::yield_now;

use crate::client::THREAD_ID;
use crate::error::DebugError;
use crate::protocol::{find_event, find_marker, Envelope, StopReason};
use crate::session::{DebugSession, DebugState, SessionPhase};

/// Output-event texts the engine emits when it ends a program without a
/// formal `terminated` event.
const TERMINATION_MARKERS: [&str; 2] = ["Step returned None", "program ended"];

/// Fallback terminus detection for engines that omit the `terminated`
/// event. Kept behind one predicate so it can be revisited if the engine's
/// contract is tightened.
fn output_signals_termination(text: &str) -> bool {
    TERMINATION_MARKERS.iter().any(|marker| text.contains(marker))
}

/// What one batch of step envelopes means.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StepSignal {
    /// A formal `terminated` event.
    Terminated,
    /// A `stopped` event with its reason.
    Stopped(StopReason),
    /// No envelopes at all, or a termination text marker: the program is
    /// over even though the engine never said so formally.
    ImpliedEnd,
    /// Nothing decisive; execution is still in flight.
    Quiet,
}

/// Classify one exchange. Exactly one signal is acted upon per batch; any
/// further stop/terminate envelopes in the same batch are ignored.
fn classify(envelopes: &[Envelope]) -> StepSignal {
    if find_event(envelopes, "terminated").is_some() {
        return StepSignal::Terminated;
    }
    if let Some(stopped) = find_event(envelopes, "stopped") {
        let reason = stopped
            .stopped_body()
            .map(|body| body.reason)
            .unwrap_or_else(|| StopReason::Other("unknown".into()));
        return StepSignal::Stopped(reason);
    }
    if envelopes.is_empty() {
        return StepSignal::ImpliedEnd;
    }
    let implied = envelopes
        .iter()
        .filter_map(Envelope::as_event)
        .filter_map(|event| event.output_text())
        .any(output_signals_termination);
    if implied {
        StepSignal::ImpliedEnd
    } else {
        StepSignal::Quiet
    }
}

/// How the probing loop reacts to a plain `step` stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeMode {
    /// Step-over / step-out: the first `step` stop is the target.
    UntilStep,
    /// Continue: `step` stops are passed through; only a breakpoint or a
    /// terminus ends the run.
    FreeRun,
}

fn thread_args() -> serde_json::Value {
    serde_json::json!({ "threadId": THREAD_ID })
}

impl DebugSession {
    fn require_running(&self) -> Result<(), DebugError> {
        if self.phase == SessionPhase::Running {
            Ok(())
        } else {
            Err(DebugError::NotDebugging)
        }
    }

    /// Act on one classified signal.
    ///
    /// State refresh is skipped for `entry` stops, which arrive before the
    /// program has begun executing.
    fn apply_signal(&mut self, signal: StepSignal) -> Result<(), DebugError> {
        match signal {
            StepSignal::Terminated | StepSignal::ImpliedEnd => self.finish(),
            StepSignal::Stopped(reason) => {
                if reason != StopReason::Entry {
                    self.refresh_state()?;
                }
                self.stopped_at_breakpoint = reason == StopReason::Breakpoint;
                tracing::debug!(reason = reason.as_str(), "stopped");
            }
            StepSignal::Quiet => {}
        }
        Ok(())
    }

    /// Execute one atomic step.
    pub async fn step_into(&mut self) -> Result<DebugState, DebugError> {
        self.require_running()?;
        let envelopes = self.client.send("stepIn", Some(thread_args()))?;
        self.apply_signal(classify(&envelopes))?;
        Ok(self.snapshot())
    }

    /// Advance to the next line without entering calls.
    pub async fn step_over(&mut self) -> Result<DebugState, DebugError> {
        self.composite_step("next", "run next").await
    }

    /// Run until the current call returns.
    pub async fn step_out(&mut self) -> Result<DebugState, DebugError> {
        self.composite_step("stepOut", "run step out").await
    }

    /// Issue a named step request, entering the auto-step loop when the
    /// engine answers with its transient run marker instead of stopping.
    async fn composite_step(
        &mut self,
        command: &str,
        marker: &str,
    ) -> Result<DebugState, DebugError> {
        self.require_running()?;
        let envelopes = self.client.send(command, Some(thread_args()))?;

        if find_marker(&envelopes, marker).is_some() {
            tracing::debug!(command, "engine deferred; entering auto-step loop");
            self.auto_step_loop(ProbeMode::UntilStep).await?;
        } else {
            self.apply_signal(classify(&envelopes))?;
        }
        Ok(self.snapshot())
    }

    /// Run until a breakpoint or termination.
    pub async fn continue_execution(&mut self) -> Result<DebugState, DebugError> {
        self.require_running()?;
        let envelopes = self.client.send("continue", Some(thread_args()))?;

        if find_marker(&envelopes, "run").is_none() {
            return Err(DebugError::Protocol(
                "continue was not acknowledged with a run marker".into(),
            ));
        }
        self.auto_step_loop(ProbeMode::FreeRun).await?;
        Ok(self.snapshot())
    }

    /// Probe with atomic steps until a decisive signal.
    ///
    /// There is deliberately no iteration cap: an engine that never reports
    /// a stop stalls the loop, and the stop token is the only way out. Each
    /// iteration yields to the surrounding runtime and reuses the reserved
    /// probe sequence number.
    async fn auto_step_loop(&mut self, mode: ProbeMode) -> Result<(), DebugError> {
        loop {
            if self.stop_token().is_cancelled() {
                tracing::debug!("auto-step cancelled");
                self.stop();
                return Ok(());
            }

            let envelopes = self.client.send_probe("stepIn", Some(thread_args()))?;
            match classify(&envelopes) {
                StepSignal::Stopped(StopReason::Step) if mode == ProbeMode::FreeRun => {
                    yield_now().await;
                }
                StepSignal::Quiet => {
                    yield_now().await;
                }
                decisive => return self.apply_signal(decisive),
            }
        }
    }
}
