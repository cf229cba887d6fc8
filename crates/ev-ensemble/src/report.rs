//! Ensemble output: one entry per requested variant, in request order.

use serde::Serialize;

use crate::result::{FailureReason, ScenarioResult, VariantFailure};

// ── Replicate aggregation ─────────────────────────────────────────────────────

/// Mean / min / max of one metric across replicates.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Spread {
    pub mean: f64,
    pub min:  f64,
    pub max:  f64,
}

impl Spread {
    /// `None` for an empty slice.
    pub fn of(values: &[f64]) -> Option<Self> {
        let mean = ev_metrics::mean(values)?;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self { mean, min, max })
    }
}

/// Metrics of every replicate of one variant, condensed.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct ReplicateSummary {
    pub replicates:      usize,
    pub evacuation_rate: Spread,
    /// Over replicates with at least one evacuee; `None` if there are none.
    pub clearance_p95_tick: Option<Spread>,
    pub fairness:        Spread,
    pub robustness:      Spread,
}

impl ReplicateSummary {
    pub fn of(runs: &[ScenarioResult]) -> Option<Self> {
        let collect = |f: fn(&ScenarioResult) -> f64| runs.iter().map(f).collect::<Vec<_>>();
        let p95: Vec<f64> = runs.iter().filter_map(|r| r.metrics.clearance_p95_tick).collect();
        Some(Self {
            replicates:         runs.len(),
            evacuation_rate:    Spread::of(&collect(|r| r.metrics.evacuation_rate))?,
            clearance_p95_tick: Spread::of(&p95),
            fairness:           Spread::of(&collect(|r| r.metrics.fairness))?,
            robustness:         Spread::of(&collect(|r| r.metrics.robustness))?,
        })
    }
}

// ── Per-variant entry ─────────────────────────────────────────────────────────

/// All replicates of one variant, or the reason it failed.
///
/// A variant fails as a whole when any of its replicates fails; the first
/// failing replicate's reason is reported.
#[derive(Clone, Debug)]
pub struct VariantReport {
    pub name:    String,
    pub outcome: Result<VariantRuns, VariantFailure>,
}

#[derive(Clone, Debug)]
pub struct VariantRuns {
    /// One result per replicate, ascending seed.
    pub runs:    Vec<ScenarioResult>,
    pub summary: ReplicateSummary,
}

impl VariantReport {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn runs(&self) -> &[ScenarioResult] {
        match &self.outcome {
            Ok(v) => &v.runs,
            Err(_) => &[],
        }
    }

    pub fn failure(&self) -> Option<&VariantFailure> {
        self.outcome.as_ref().err()
    }

    pub fn summary(&self) -> Option<&ReplicateSummary> {
        self.outcome.as_ref().ok().map(|v| &v.summary)
    }
}

// ── Comparison table ──────────────────────────────────────────────────────────

/// One row of the cross-variant comparison.  Numeric columns are replicate
/// means and are `None` for failed variants.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub variant:               String,
    pub failure:               Option<FailureReason>,
    pub replicates:            usize,
    pub population:            Option<usize>,
    pub evacuation_rate:       Option<f64>,
    pub clearance_p50_minutes: Option<f64>,
    pub clearance_p95_minutes: Option<f64>,
    pub fairness:              Option<f64>,
    pub robustness:            Option<f64>,
    /// Largest queue seen in any replicate.
    pub max_queue:             Option<usize>,
}

impl ComparisonRow {
    fn from_variant(v: &VariantReport) -> Self {
        let mut row = ComparisonRow {
            variant:               v.name.clone(),
            failure:               v.failure().map(|f| f.reason.clone()),
            replicates:            0,
            population:            None,
            evacuation_rate:       None,
            clearance_p50_minutes: None,
            clearance_p95_minutes: None,
            fairness:              None,
            robustness:            None,
            max_queue:             None,
        };
        let Ok(runs) = &v.outcome else {
            return row;
        };

        let mean_of = |f: fn(&ScenarioResult) -> Option<f64>| {
            let values: Vec<f64> = runs.runs.iter().filter_map(f).collect();
            ev_metrics::mean(&values)
        };
        row.replicates            = runs.summary.replicates;
        row.population            = runs.runs.first().map(|r| r.metrics.population);
        row.evacuation_rate       = Some(runs.summary.evacuation_rate.mean);
        row.clearance_p50_minutes = mean_of(|r| r.metrics.clearance_p50_minutes());
        row.clearance_p95_minutes = mean_of(|r| r.metrics.clearance_p95_minutes());
        row.fairness              = Some(runs.summary.fairness.mean);
        row.robustness            = Some(runs.summary.robustness.mean);
        row.max_queue             = runs.runs.iter().map(|r| r.metrics.max_queue).max();
        row
    }
}

// ── EnsembleReport ────────────────────────────────────────────────────────────

/// Final output of [`EnsembleRunner::run`][crate::EnsembleRunner::run].
///
/// Every requested variant appears exactly once, in request order, with
/// either its results or a structured failure.
#[derive(Clone, Debug, Default)]
pub struct EnsembleReport {
    pub variants: Vec<VariantReport>,
    /// The cancel token was set while the batch ran.
    pub cancelled: bool,
}

impl EnsembleReport {
    pub fn variant(&self, name: &str) -> Option<&VariantReport> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Every successful run, in request and replicate order.
    pub fn results(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.variants.iter().flat_map(|v| v.runs())
    }

    pub fn failures(&self) -> impl Iterator<Item = &VariantFailure> {
        self.variants.iter().filter_map(|v| v.failure())
    }

    pub fn succeeded(&self) -> usize {
        self.variants.iter().filter(|v| v.is_ok()).count()
    }

    pub fn comparison(&self) -> Vec<ComparisonRow> {
        self.variants.iter().map(ComparisonRow::from_variant).collect()
    }

    /// Successful variant with the highest mean robustness; the earlier
    /// variant wins a tie.
    pub fn best_by_robustness(&self) -> Option<&VariantReport> {
        let mut best: Option<(&VariantReport, f64)> = None;
        for v in &self.variants {
            let Some(s) = v.summary() else { continue };
            if best.is_none_or(|(_, r)| s.robustness.mean > r) {
                best = Some((v, s.robustness.mean));
            }
        }
        best.map(|(v, _)| v)
    }
}
