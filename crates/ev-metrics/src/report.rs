//! Aggregate metrics of one run.
//!
//! ```text
//! evacuation_rate = evacuated / population
//! CV              = std_dev(evacuation ticks) / mean(evacuation ticks)
//! fairness        = clamp(1 / (1 + CV), 0, 1)
//! robustness      = evacuation_rate × (1 − min(1, CV))
//! ```
//!
//! With fewer than two evacuees the coefficient of variation is undefined.
//! The report then falls back to fixed values and records a
//! [`MetricFlag`] instead of failing:
//!
//! | Evacuees | fairness | robustness        | flag            |
//! |----------|----------|-------------------|-----------------|
//! | 0        | 0.0      | `evacuation_rate` | `NoEvacuees`    |
//! | 1        | 1.0      | `evacuation_rate` | `SingleEvacuee` |
//!
//! A single evacuee is perfectly synchronous with itself, hence fairness 1.

use serde::Serialize;

use ev_sim::SimOutcome;

use crate::stats::{coefficient_of_variation, mean, percentile};
use crate::MetricsResult;

/// Condition under which a metric used its documented fallback.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFlag {
    /// Population size was zero; `evacuation_rate` is reported as 0.
    EmptyPopulation,
    NoEvacuees,
    SingleEvacuee,
    /// Horizon reached or run cancelled with agents still out.
    PartialEvacuation,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsReport {
    pub population:      usize,
    pub evacuated:       usize,
    pub evacuation_rate: f64,

    /// 50th / 95th percentile of evacuation ticks; `None` without evacuees.
    pub clearance_p50_tick: Option<f64>,
    pub clearance_p95_tick: Option<f64>,
    pub mean_evacuation_tick: Option<f64>,

    /// `None` when undefined (fewer than two evacuees).
    pub cv:         Option<f64>,
    pub fairness:   f64,
    pub robustness: f64,

    pub max_queue:  usize,
    /// Mean queue length over all edges and ticks.
    pub mean_queue: f64,
    /// Mean length of non-empty queues.
    pub mean_active_queue: f64,

    pub tick_minutes: u32,
    pub ticks_run:    u64,

    pub flags: Vec<MetricFlag>,
}

impl MetricsReport {
    pub fn from_outcome(outcome: &SimOutcome) -> Self {
        let population = outcome.population();
        let mut ticks: Vec<f64> = outcome.evacuation_ticks().iter().map(|t| t.0 as f64).collect();
        ticks.sort_by(f64::total_cmp);
        let evacuated = ticks.len();

        let mut flags = Vec::new();
        let evacuation_rate = if population == 0 {
            flags.push(MetricFlag::EmptyPopulation);
            0.0
        } else {
            evacuated as f64 / population as f64
        };
        if population > 0 && evacuated < population {
            flags.push(MetricFlag::PartialEvacuation);
        }

        let cv = coefficient_of_variation(&ticks);
        let (fairness, robustness) = match (cv, evacuated) {
            (Some(cv), _) => (
                (1.0 / (1.0 + cv)).clamp(0.0, 1.0),
                evacuation_rate * (1.0 - cv.min(1.0)),
            ),
            (None, 1) => {
                flags.push(MetricFlag::SingleEvacuee);
                (1.0, evacuation_rate)
            }
            (None, _) => {
                flags.push(MetricFlag::NoEvacuees);
                (0.0, evacuation_rate)
            }
        };

        Self {
            population,
            evacuated,
            evacuation_rate,
            clearance_p50_tick: fixed_percentile(&ticks, 50.0),
            clearance_p95_tick: fixed_percentile(&ticks, 95.0),
            mean_evacuation_tick: mean(&ticks),
            cv,
            fairness,
            robustness,
            max_queue: outcome.queue.max,
            mean_queue: outcome.queue.mean,
            mean_active_queue: outcome.queue.mean_active,
            tick_minutes: outcome.tick_minutes,
            ticks_run: outcome.ticks_run,
            flags,
        }
    }

    /// Arbitrary clearance percentile of the same run.
    pub fn clearance_tick(outcome: &SimOutcome, p: f64) -> MetricsResult<Option<f64>> {
        let mut ticks: Vec<f64> = outcome.evacuation_ticks().iter().map(|t| t.0 as f64).collect();
        ticks.sort_by(f64::total_cmp);
        percentile(&ticks, p)
    }

    /// Clearance percentiles in scenario minutes.
    pub fn clearance_p50_minutes(&self) -> Option<f64> {
        self.clearance_p50_tick.map(|t| t * self.tick_minutes as f64)
    }

    pub fn clearance_p95_minutes(&self) -> Option<f64> {
        self.clearance_p95_tick.map(|t| t * self.tick_minutes as f64)
    }

    pub fn has_flag(&self, flag: MetricFlag) -> bool {
        self.flags.contains(&flag)
    }
}

fn fixed_percentile(sorted: &[f64], p: f64) -> Option<f64> {
    // 50 and 95 are always in range.
    percentile(sorted, p).ok().flatten()
}
