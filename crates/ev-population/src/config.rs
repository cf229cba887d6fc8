//! Population generation parameters.
//!
//! Deserialised from the `population` block of an ensemble configuration:
//!
//! ```json
//! {
//!   "base_population": 5000,
//!   "destination_quantile": 0.2,
//!   "assignment": "round_robin",
//!   "speed": { "mean_mps": 1.2, "std_dev_mps": 0.2, "min_mps": 0.5, "max_mps": 2.5 },
//!   "start_delay": { "kind": "exponential", "mean_minutes": 5.0 }
//! }
//! ```
//!
//! Every field except `base_population` has a default.

use serde::{Deserialize, Serialize};

use ev_network::centrality::DEFAULT_SAMPLE_SIZE;

use crate::{PopulationError, PopulationResult};

/// How agents are spread over the destination set.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assignment {
    /// Each agent draws a destination uniformly from its own RNG stream.
    #[default]
    Uniform,
    /// Agent `k` goes to destination `k mod |destinations|`.
    RoundRobin,
}

/// Truncated normal walking-speed model (m/s).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedModel {
    pub mean_mps:    f64,
    pub std_dev_mps: f64,
    pub min_mps:     f64,
    pub max_mps:     f64,
}

impl Default for SpeedModel {
    fn default() -> Self {
        Self { mean_mps: 1.2, std_dev_mps: 0.2, min_mps: 0.5, max_mps: 2.5 }
    }
}

/// Distribution of the delay between the alert and an agent setting off.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StartDelay {
    /// Exponential with the given mean (rate `1 / mean_minutes`).
    Exponential { mean_minutes: f64 },
    /// Everyone starts at tick 0.
    Immediate,
}

impl Default for StartDelay {
    fn default() -> Self {
        StartDelay::Exponential { mean_minutes: 5.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Population at multiplier 1.0.
    pub base_population: u32,

    /// Share of non-origin nodes, most distant first, used as boundary
    /// destinations.
    #[serde(default = "default_quantile")]
    pub destination_quantile: f64,

    #[serde(default)]
    pub assignment: Assignment,

    #[serde(default)]
    pub speed: SpeedModel,

    #[serde(default)]
    pub start_delay: StartDelay,

    /// Source nodes sampled for betweenness; `0` means exact.
    #[serde(default = "default_sample_size")]
    pub centrality_sample_size: usize,

    #[serde(default)]
    pub centrality_seed: u64,
}

fn default_quantile() -> f64 {
    0.2
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

impl PopulationConfig {
    pub fn new(base_population: u32) -> Self {
        Self {
            base_population,
            destination_quantile:   default_quantile(),
            assignment:             Assignment::default(),
            speed:                  SpeedModel::default(),
            start_delay:            StartDelay::default(),
            centrality_sample_size: DEFAULT_SAMPLE_SIZE,
            centrality_seed:        0,
        }
    }

    pub fn with_assignment(mut self, assignment: Assignment) -> Self {
        self.assignment = assignment;
        self
    }

    pub fn with_start_delay(mut self, start_delay: StartDelay) -> Self {
        self.start_delay = start_delay;
        self
    }

    pub fn with_speed(mut self, speed: SpeedModel) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_destination_quantile(mut self, q: f64) -> Self {
        self.destination_quantile = q;
        self
    }

    pub fn validate(&self) -> PopulationResult<()> {
        let fail = |msg: String| Err(PopulationError::Config(msg));

        let q = self.destination_quantile;
        if !q.is_finite() || q <= 0.0 || q > 1.0 {
            return fail(format!("destination_quantile must be in (0, 1], got {q}"));
        }

        let s = &self.speed;
        let finite = [s.mean_mps, s.std_dev_mps, s.min_mps, s.max_mps]
            .iter()
            .all(|v| v.is_finite());
        if !finite || s.std_dev_mps < 0.0 || s.min_mps <= 0.0 || s.min_mps > s.max_mps {
            return fail(format!(
                "speed model needs finite values with std_dev >= 0 and 0 < min <= max, got {s:?}"
            ));
        }

        if let StartDelay::Exponential { mean_minutes } = self.start_delay {
            if !mean_minutes.is_finite() || mean_minutes <= 0.0 {
                return fail(format!("start delay mean must be positive, got {mean_minutes}"));
            }
        }
        Ok(())
    }
}
