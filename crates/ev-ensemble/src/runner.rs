//! Bounded parallel execution of scenario variants.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use ev_core::ScenarioVariant;
use ev_metrics::{FlowReport, MetricsReport, bottlenecks};
use ev_network::{GraphPayload, StreetNetwork};
use ev_population::PopulationGenerator;
use ev_sim::{CancelToken, NoopObserver, SimBuilder};

use crate::report::{EnsembleReport, ReplicateSummary, VariantReport, VariantRuns};
use crate::result::{FailureReason, ScenarioResult, VariantFailure};
use crate::{EnsembleConfig, EnsembleError, EnsembleResult};

/// Runs every variant of an [`EnsembleConfig`] against one shared network.
///
/// Variants only share the read-only `Arc<StreetNetwork>` (and the cached
/// centrality origin inside the generator), so runs need no locking.  At
/// most `max_concurrency` runs execute at once on a dedicated Rayon pool.
///
/// ```rust,ignore
/// let runner = EnsembleRunner::new(network, EnsembleConfig::from_path("presets.json")?)?;
/// let abort = runner.cancel_token();   // hand to a signal handler, a budget timer, …
/// let report = runner.run();
/// for row in report.comparison() { println!("{row:?}"); }
/// ```
pub struct EnsembleRunner {
    config:    EnsembleConfig,
    network:   Arc<StreetNetwork>,
    generator: PopulationGenerator,
    pool:      rayon::ThreadPool,
    cancel:    CancelToken,
}

impl EnsembleRunner {
    pub fn new(network: Arc<StreetNetwork>, config: EnsembleConfig) -> EnsembleResult<Self> {
        config.validate()?;
        let generator = PopulationGenerator::new(Arc::clone(&network), config.population.clone())?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrency)
            .thread_name(|i| format!("ev-ensemble-{i}"))
            .build()
            .map_err(|e| EnsembleError::ThreadPool(e.to_string()))?;
        Ok(Self { config, network, generator, pool, cancel: CancelToken::new() })
    }

    /// Build the shared network from a graph payload using the config's
    /// capacity model.
    pub fn from_payload(payload: &GraphPayload, config: EnsembleConfig) -> EnsembleResult<Self> {
        let network = StreetNetwork::from_payload(payload, config.capacity)?;
        Self::new(Arc::new(network), config)
    }

    /// Replace the runner's cancel token with an externally owned one.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle that stops the batch cooperatively: runs in flight end at
    /// their next tick boundary and keep their partial results; runs not
    /// yet started fail with [`FailureReason::Cancelled`].
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn network(&self) -> &Arc<StreetNetwork> {
        &self.network
    }

    // ── Batch ─────────────────────────────────────────────────────────────

    /// Run every replicate of every variant.  Never fails as a whole: each
    /// requested variant appears in the report with results or a reason.
    pub fn run(&self) -> EnsembleReport {
        let cfg = &self.config;
        let started = Instant::now();
        log::info!(
            "ensemble: {} variant(s) × {} replicate(s) on {} worker(s), network {} nodes / {} edges",
            cfg.variants.len(),
            cfg.replicates,
            cfg.max_concurrency,
            self.network.node_count(),
            self.network.edge_count()
        );

        let tasks: Vec<(usize, u32)> = (0..cfg.variants.len())
            .flat_map(|v| (0..cfg.replicates).map(move |r| (v, r)))
            .collect();

        // `collect` on an indexed parallel iterator keeps task order.
        let results: Vec<Result<ScenarioResult, VariantFailure>> = self.pool.install(|| {
            tasks
                .par_iter()
                .map(|&(v, r)| self.run_variant(&cfg.variants[v], r))
                .collect()
        });

        let mut grouped: Vec<Vec<Result<ScenarioResult, VariantFailure>>> =
            cfg.variants.iter().map(|_| Vec::new()).collect();
        for (&(v, _), result) in tasks.iter().zip(results) {
            grouped[v].push(result);
        }

        let variants: Vec<VariantReport> = cfg
            .variants
            .iter()
            .zip(grouped)
            .map(|(variant, runs)| VariantReport {
                name:    variant.name.clone(),
                outcome: collect_runs(&variant.name, runs),
            })
            .collect();

        for f in variants.iter().filter_map(|v| v.failure()) {
            log::warn!("variant failed: {f}");
        }
        let report = EnsembleReport { variants, cancelled: self.cancel.is_cancelled() };
        log::info!(
            "ensemble finished in {:.2?}: {}/{} variant(s) succeeded{}",
            started.elapsed(),
            report.succeeded(),
            report.variants.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }

    // ── Single run ────────────────────────────────────────────────────────

    /// Generate, simulate and analyse one replicate of `variant`.
    ///
    /// Replicate `r` runs with seed `variant.seed + r`.
    pub fn run_variant(
        &self,
        variant:   &ScenarioVariant,
        replicate: u32,
    ) -> Result<ScenarioResult, VariantFailure> {
        let fail = |reason: FailureReason| VariantFailure {
            variant: variant.name.clone(),
            replicate,
            reason,
        };
        if self.cancel.is_cancelled() {
            return Err(fail(FailureReason::Cancelled));
        }

        let started = Instant::now();
        let seed = variant.seed.wrapping_add(replicate as u64);
        let run = variant.clone().with_seed(seed);
        run.validate().map_err(|e| fail(e.into()))?;

        let population = self.generator.generate(&run).map_err(|e| fail(e.into()))?;
        let mut sim = SimBuilder::new(run.sim_config(), Arc::clone(&self.network), population)
            .cancel_token(self.cancel.clone())
            .build()
            .map_err(|e| fail(e.into()))?;
        sim.run(&mut NoopObserver);
        let outcome = sim.into_outcome();

        let metrics = MetricsReport::from_outcome(&outcome);
        let bottlenecks = bottlenecks(&self.network, &outcome.records, self.config.bottleneck_top_k);
        let flow = FlowReport::from_records(&outcome.records, self.config.start_histogram_bucket_ticks)
            .map_err(|e| fail(FailureReason::Simulation { reason: e.to_string() }))?;

        log::debug!(
            "{} #{replicate} (seed {seed}): {:?} after {} ticks, {}/{} evacuated",
            run.name,
            outcome.termination,
            outcome.ticks_run,
            metrics.evacuated,
            metrics.population
        );

        Ok(ScenarioResult {
            variant: run,
            replicate,
            metrics,
            bottlenecks,
            flow,
            outcome,
            sample_limit: self.config.record_sample_limit,
            wall_time: started.elapsed(),
        })
    }
}

/// All replicates of one variant, or the first failure among them.
fn collect_runs(
    name: &str,
    runs: Vec<Result<ScenarioResult, VariantFailure>>,
) -> Result<VariantRuns, VariantFailure> {
    let runs: Vec<ScenarioResult> = runs.into_iter().collect::<Result<_, _>>()?;
    match ReplicateSummary::of(&runs) {
        Some(summary) => Ok(VariantRuns { runs, summary }),
        None => Err(VariantFailure {
            variant:   name.to_string(),
            replicate: 0,
            reason:    FailureReason::Simulation { reason: "no replicate ran".into() },
        }),
    }
}
