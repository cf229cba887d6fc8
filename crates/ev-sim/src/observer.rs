//! Simulation observer trait and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ev_core::Tick;

use crate::outcome::Termination;
use crate::state::{AgentState, SimulationState, TickSummary};

/// Callbacks invoked by [`Sim::run`][crate::Sim::run] at tick boundaries.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example — progress printer
///
/// ```rust,ignore
/// struct ProgressPrinter { interval: u64 }
///
/// impl SimObserver for ProgressPrinter {
///     fn on_tick_end(&mut self, s: &TickSummary, _: &SimulationState, _: &[AgentState]) {
///         if s.tick.0 % self.interval == 0 {
///             println!("{}: {} evacuated, {} queued", s.tick, s.evacuated, s.queued);
///         }
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called at the very start of each tick, before any processing.
    fn on_tick_start(&mut self, _tick: Tick) {}

    /// Called once every agent update of the tick is committed.
    fn on_tick_end(
        &mut self,
        _summary: &TickSummary,
        _state:   &SimulationState,
        _agents:  &[AgentState],
    ) {}

    /// Called once after the loop stops.
    fn on_sim_end(&mut self, _final_tick: Tick, _termination: Termination) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}

// ── CancelToken ───────────────────────────────────────────────────────────────

/// Shared cancellation flag.  The stepper checks it once per tick, before
/// the tick starts, so a cancelled run always ends on a tick boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
