//! Simulation time model.
//!
//! # Design
//!
//! Time is a monotonically increasing integer `Tick`.  The mapping to
//! elapsed scenario time is held in `SimClock`:
//!
//!   elapsed_minutes = tick * tick_minutes
//!
//! Using an integer tick as the canonical unit keeps evacuation times exact
//! and comparable across platforms.  The default granularity is one minute
//! per tick.

use std::fmt;

/// Default tick length in minutes.
pub const DEFAULT_TICK_MINUTES: u32 = 1;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Tracks the current tick and converts ticks to scenario minutes.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// Minutes of scenario time represented by one tick.
    pub tick_minutes: u32,
    /// The current tick — advanced by `SimClock::advance()` each iteration.
    pub current_tick: Tick,
}

impl SimClock {
    pub fn new(tick_minutes: u32) -> Self {
        Self {
            tick_minutes,
            current_tick: Tick::ZERO,
        }
    }

    #[inline]
    pub fn advance(&mut self) {
        self.current_tick = Tick(self.current_tick.0 + 1);
    }

    /// Seconds represented by one tick.
    #[inline]
    pub fn tick_secs(&self) -> f64 {
        self.tick_minutes as f64 * 60.0
    }

    /// Elapsed scenario minutes since tick 0.
    #[inline]
    pub fn elapsed_minutes(&self) -> u64 {
        self.minutes_at(self.current_tick)
    }

    /// Scenario minutes at an arbitrary tick.
    #[inline]
    pub fn minutes_at(&self, tick: Tick) -> u64 {
        tick.0 * self.tick_minutes as u64
    }

    /// How many ticks span `minutes`? (rounds up)
    #[inline]
    pub fn ticks_for_minutes(&self, minutes: u64) -> u64 {
        minutes.div_ceil(self.tick_minutes.max(1) as u64)
    }

    /// Tick during which something delayed by `minutes` from tick 0 happens
    /// (rounds down: a 4.9-minute delay at 1-minute ticks starts at T4).
    #[inline]
    pub fn tick_at_minutes(&self, minutes: f64) -> Tick {
        if !minutes.is_finite() || minutes <= 0.0 {
            return Tick::ZERO;
        }
        Tick((minutes / self.tick_minutes.max(1) as f64).floor() as u64)
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.elapsed_minutes();
        write!(f, "{} (+{}h{:02}m)", self.current_tick, minutes / 60, minutes % 60)
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Stepper configuration derived from a validated
/// [`ScenarioVariant`](crate::ScenarioVariant).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimConfig {
    /// Minutes per tick.
    pub tick_minutes: u32,

    /// Hard iteration ceiling.  Ticks `0..horizon_ticks` are simulated.
    pub horizon_ticks: u64,

    /// Master RNG seed of the run.
    pub seed: u64,
}

impl SimConfig {
    /// The tick at which the simulation stops (exclusive upper bound).
    #[inline]
    pub fn end_tick(&self) -> Tick {
        Tick(self.horizon_ticks)
    }

    pub fn make_clock(&self) -> SimClock {
        SimClock::new(self.tick_minutes)
    }
}
