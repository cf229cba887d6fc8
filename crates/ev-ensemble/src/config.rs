//! Ensemble configuration.
//!
//! Presets are data, not code.  A typical file:
//!
//! ```json
//! {
//!   "population": { "base_population": 2000 },
//!   "max_concurrency": 4,
//!   "replicates": 3,
//!   "variants": [
//!     { "name": "baseline",     "duration_minutes": 90, "seed": 7 },
//!     { "name": "high_density", "population_multiplier": 1.2,
//!       "speed_multiplier": 0.9, "duration_minutes": 90, "seed": 7 }
//!   ]
//! }
//! ```
//!
//! Omitted fields take the defaults listed on [`EnsembleConfig`].

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use ev_core::ScenarioVariant;
use ev_network::CapacityModel;
use ev_population::PopulationConfig;

use crate::{EnsembleError, EnsembleResult};

/// Batch-wide settings plus the list of variants to run.
///
/// | Field                          | Default                 |
/// |--------------------------------|-------------------------|
/// | `max_concurrency`              | available parallelism   |
/// | `replicates`                   | 1                       |
/// | `bottleneck_top_k`             | 10                      |
/// | `start_histogram_bucket_ticks` | 5                       |
/// | `record_sample_limit`          | 1 000                   |
/// | `capacity`                     | `CapacityModel::default()` |
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub population: PopulationConfig,

    pub variants: Vec<ScenarioVariant>,

    /// Upper bound on variants simulated at the same time.
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,

    /// Runs per variant, with seeds `seed, seed + 1, …`.
    #[serde(default = "default_replicates")]
    pub replicates: u32,

    #[serde(default = "default_top_k")]
    pub bottleneck_top_k: usize,

    #[serde(default = "default_bucket_ticks")]
    pub start_histogram_bucket_ticks: u64,

    /// Records forwarded by [`ScenarioResult::sampled_records`][crate::ScenarioResult::sampled_records].
    #[serde(default = "default_sample_limit")]
    pub record_sample_limit: usize,

    /// Used when the network is built from a graph payload.
    #[serde(default)]
    pub capacity: CapacityModel,
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

fn default_replicates() -> u32 {
    1
}

fn default_top_k() -> usize {
    10
}

fn default_bucket_ticks() -> u64 {
    5
}

fn default_sample_limit() -> usize {
    1_000
}

impl EnsembleConfig {
    pub fn new(population: PopulationConfig, variants: Vec<ScenarioVariant>) -> Self {
        Self {
            population,
            variants,
            max_concurrency:              default_concurrency(),
            replicates:                   default_replicates(),
            bottleneck_top_k:             default_top_k(),
            start_histogram_bucket_ticks: default_bucket_ticks(),
            record_sample_limit:          default_sample_limit(),
            capacity:                     CapacityModel::default(),
        }
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn with_replicates(mut self, n: u32) -> Self {
        self.replicates = n;
        self
    }

    pub fn with_bottleneck_top_k(mut self, k: usize) -> Self {
        self.bottleneck_top_k = k;
        self
    }

    pub fn with_record_sample_limit(mut self, limit: usize) -> Self {
        self.record_sample_limit = limit;
        self
    }

    pub fn from_json_str(s: &str) -> EnsembleResult<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> EnsembleResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check batch-wide settings.
    ///
    /// Individual variants are *not* validated here: a malformed variant is
    /// reported as a failure of that variant alone when the batch runs.
    pub fn validate(&self) -> EnsembleResult<()> {
        let fail = |msg: &str| Err(EnsembleError::Config(msg.into()));

        if self.max_concurrency == 0 {
            return fail("max_concurrency must be at least 1");
        }
        if self.replicates == 0 {
            return fail("replicates must be at least 1");
        }
        if self.start_histogram_bucket_ticks == 0 {
            return fail("start_histogram_bucket_ticks must be positive");
        }
        self.population.validate()?;
        self.capacity
            .validate()
            .map_err(|e| EnsembleError::Config(e.to_string()))?;

        let mut seen = HashSet::new();
        for v in &self.variants {
            if !seen.insert(v.name.as_str()) {
                return Err(EnsembleError::Config(format!("duplicate variant name {:?}", v.name)));
            }
        }
        Ok(())
    }
}
