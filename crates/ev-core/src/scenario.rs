//! Scenario variants: one parameterised instance of an evacuation run.
//!
//! Variants arrive from the external scenario-specification service as a
//! list of named multiplier presets.  They are immutable inputs; every
//! check happens in [`ScenarioVariant::validate`] before any agent is
//! generated.

use crate::time::{DEFAULT_TICK_MINUTES, SimConfig};
use crate::{Coord, EvError, EvResult};

/// Where the evacuating population starts.
///
/// Node overrides name nodes by their payload id, the only id the scenario
/// service knows; the network resolves them to dense `NodeId`s.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OriginSpec {
    /// A network node by payload id.
    Node(u64),
    /// The network node nearest to a projected coordinate.
    Near(Coord),
}

/// Named configuration of one simulation run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScenarioVariant {
    pub name: String,

    /// Scales the base population.  `0.0` is allowed (empty run).
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    pub population_multiplier: f64,

    /// Scales every sampled walking speed before clamping.
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    pub speed_multiplier: f64,

    /// Time horizon of the run.
    pub duration_minutes: u32,

    #[cfg_attr(feature = "serde", serde(default = "default_tick_minutes"))]
    pub tick_minutes: u32,

    #[cfg_attr(feature = "serde", serde(default))]
    pub seed: u64,

    /// Overrides the centrality-based origin.
    #[cfg_attr(feature = "serde", serde(default))]
    pub origin: Option<OriginSpec>,

    /// Overrides the distance-quantile destination set.  Payload node ids.
    #[cfg_attr(feature = "serde", serde(default))]
    pub destinations: Option<Vec<u64>>,
}

#[cfg(feature = "serde")]
fn one() -> f64 {
    1.0
}

#[cfg(feature = "serde")]
fn default_tick_minutes() -> u32 {
    DEFAULT_TICK_MINUTES
}

impl ScenarioVariant {
    /// A baseline variant: multipliers 1.0, one-minute ticks, seed 0.
    pub fn new(name: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            name: name.into(),
            population_multiplier: 1.0,
            speed_multiplier: 1.0,
            duration_minutes,
            tick_minutes: DEFAULT_TICK_MINUTES,
            seed: 0,
            origin: None,
            destinations: None,
        }
    }

    pub fn with_multipliers(mut self, population: f64, speed: f64) -> Self {
        self.population_multiplier = population;
        self.speed_multiplier = speed;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_tick_minutes(mut self, tick_minutes: u32) -> Self {
        self.tick_minutes = tick_minutes;
        self
    }

    pub fn with_origin(mut self, origin: OriginSpec) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_destinations(mut self, destinations: Vec<u64>) -> Self {
        self.destinations = Some(destinations);
        self
    }

    /// Reject malformed variants before simulation starts.
    pub fn validate(&self) -> EvResult<()> {
        let fail = |reason: String| {
            Err(EvError::InvalidScenario { variant: self.name.clone(), reason })
        };

        if self.name.trim().is_empty() {
            return fail("variant name is empty".into());
        }
        if !self.population_multiplier.is_finite() || self.population_multiplier < 0.0 {
            return fail(format!(
                "population_multiplier must be a finite non-negative number, got {}",
                self.population_multiplier
            ));
        }
        if !self.speed_multiplier.is_finite() || self.speed_multiplier < 0.0 {
            return fail(format!(
                "speed_multiplier must be a finite non-negative number, got {}",
                self.speed_multiplier
            ));
        }
        if self.duration_minutes == 0 {
            return fail("duration_minutes must be positive".into());
        }
        if self.tick_minutes == 0 {
            return fail("tick_minutes must be positive".into());
        }
        if let Some(OriginSpec::Near(c)) = &self.origin {
            if !c.is_finite() {
                return fail(format!("origin coordinate {c} is not finite"));
            }
        }
        if let Some(d) = &self.destinations {
            if d.is_empty() {
                return fail("explicit destination list is empty".into());
            }
        }
        Ok(())
    }

    /// `N = round(base_population × population_multiplier)`.
    pub fn population_size(&self, base_population: u32) -> usize {
        (base_population as f64 * self.population_multiplier).round() as usize
    }

    /// Number of ticks covering `duration_minutes` (rounded up).
    pub fn horizon_ticks(&self) -> u64 {
        (self.duration_minutes as u64).div_ceil(self.tick_minutes.max(1) as u64)
    }

    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            tick_minutes:  self.tick_minutes,
            horizon_ticks: self.horizon_ticks(),
            seed:          self.seed,
        }
    }
}
