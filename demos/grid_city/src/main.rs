//! grid_city — evacuation ensemble over a synthetic 12 × 12 street grid.
//!
//! Loads the grid as a provider-style graph payload, traces one variant
//! tick by tick, then runs the preset ensemble on a bounded worker pool and
//! prints the comparison, bottleneck and flow tables.
//!
//! Set `RUST_LOG=debug` to see origin/destination selection and per-run
//! termination lines.

mod network;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use ev_core::Tick;
use ev_ensemble::{EnsembleConfig, EnsembleRunner, ScenarioResult};
use ev_population::PopulationGenerator;
use ev_sim::{AgentState, SimBuilder, SimObserver, SimulationState, Termination, TickSummary};

use network::{SIDE, build_payload};

// ── Constants ─────────────────────────────────────────────────────────────────

const TRACE_INTERVAL_TICKS: u64   = 5;
const TRACE_VARIANT:        &str  = "baseline";
const SAMPLE_LIMIT:         usize = 5;

// ── Presets ───────────────────────────────────────────────────────────────────

// Multiplier presets as a scenario-specification service would send them.
// `far_exit` names a node outside the grid and fails on purpose.
const PRESETS_JSON: &str = r#"{
    "population": {
        "base_population": 3000,
        "destination_quantile": 0.1,
        "start_delay": { "kind": "exponential", "mean_minutes": 4.0 },
        "centrality_sample_size": 64,
        "centrality_seed": 1
    },
    "max_concurrency": 4,
    "replicates": 2,
    "bottleneck_top_k": 8,
    "start_histogram_bucket_ticks": 5,
    "record_sample_limit": 200,
    "variants": [
        { "name": "baseline",     "duration_minutes": 120, "seed": 42 },
        { "name": "high_density", "population_multiplier": 1.2, "speed_multiplier": 0.9,
          "duration_minutes": 120, "seed": 42 },
        { "name": "congested",    "population_multiplier": 1.5, "speed_multiplier": 0.7,
          "duration_minutes": 120, "seed": 42 },
        { "name": "coarse_ticks", "duration_minutes": 120, "tick_minutes": 2, "seed": 42 },
        { "name": "far_exit",     "duration_minutes": 120, "seed": 42, "destinations": [9999] }
    ]
}"#;

// ── Progress observer ─────────────────────────────────────────────────────────

struct ProgressPrinter {
    interval: u64,
    peak_queue: usize,
}

impl SimObserver for ProgressPrinter {
    fn on_tick_end(&mut self, s: &TickSummary, _: &SimulationState, _: &[AgentState]) {
        self.peak_queue = self.peak_queue.max(s.max_queue);
        if s.tick.0 % self.interval == 0 {
            println!(
                "  {:>5}  waiting {:>5}  moving {:>5}  queued {:>5}  evacuated {:>5}  longest queue {:>4}",
                s.tick.to_string(),
                s.waiting,
                s.moving,
                s.queued,
                s.evacuated,
                s.max_queue
            );
        }
    }

    fn on_sim_end(&mut self, final_tick: Tick, termination: Termination) {
        println!("  stopped at {final_tick}: {termination:?} (peak queue {})", self.peak_queue);
    }
}

// ── Printing ──────────────────────────────────────────────────────────────────

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{x:.decimals$}"))
}

fn print_bottlenecks(result: &ScenarioResult) {
    println!("Bottlenecks of {:?} (replicate {}):", result.name(), result.replicate);
    println!("  {:<12} {:>13} {:>8} {:>10}", "edge", "street", "usage", "tier");
    for b in &result.bottlenecks {
        println!(
            "  {:<12} {:>13} {:>8} {:>10}",
            b.edge.to_string(),
            format!("{} → {}", b.from, b.to),
            b.usage_count,
            b.tier.as_str()
        );
    }
}

fn print_flow(result: &ScenarioResult) {
    let flow = &result.flow;
    println!("Start times ({}-tick buckets):", flow.start_bucket_ticks);
    for b in &flow.start_histogram {
        println!("  T{:<4} {:>5}", b.start, b.count);
    }
    println!("Route lengths (hops):");
    for b in &flow.route_length_histogram {
        println!("  {:>3}   {:>5}", b.start, b.count);
    }
    println!(
        "{} edge traversals planned over {} distinct edges",
        flow.total_traversals, flow.distinct_edges
    );
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== grid_city — evacuation ensemble ===");

    // 1. Network and presets.
    let payload = build_payload();
    log::info!("payload: {} nodes, {} street records", payload.nodes.len(), payload.edges.len());
    let config = EnsembleConfig::from_json_str(PRESETS_JSON).context("parsing presets")?;
    let runner = EnsembleRunner::from_payload(&payload, config.clone())?;
    let network = Arc::clone(runner.network());
    println!(
        "Grid {SIDE}×{SIDE}: {} nodes, {} directed edges, {} variants × {} replicates",
        network.node_count(),
        network.edge_count(),
        config.variants.len(),
        config.replicates
    );
    println!();

    // 2. Trace one variant tick by tick.
    let variant = config
        .variants
        .iter()
        .find(|v| v.name == TRACE_VARIANT)
        .context("trace variant missing from presets")?;
    let generator = PopulationGenerator::new(Arc::clone(&network), config.population.clone())?;
    let population = generator.generate(variant)?;
    println!(
        "Tracing {:?}: {} agents from {} to {} destination(s)",
        variant.name,
        population.count,
        population.origin,
        population.plan.len()
    );
    let mut sim = SimBuilder::new(variant.sim_config(), Arc::clone(&network), population).build()?;
    sim.run(&mut ProgressPrinter { interval: TRACE_INTERVAL_TICKS, peak_queue: 0 });
    println!();

    // 3. Full ensemble.
    let t0 = Instant::now();
    let report = runner.run();
    println!("Ensemble finished in {:.2?}", t0.elapsed());
    println!();

    println!(
        "  {:<14} {:>6} {:>7} {:>9} {:>9} {:>8} {:>10} {:>6}",
        "variant", "agents", "rate", "p50 min", "p95 min", "fairness", "robustness", "queue"
    );
    for row in report.comparison() {
        if let Some(reason) = &row.failure {
            println!("  {:<14} FAILED: {reason}", row.variant);
            continue;
        }
        println!(
            "  {:<14} {:>6} {:>7} {:>9} {:>9} {:>8} {:>10} {:>6}",
            row.variant,
            row.population.unwrap_or(0),
            fmt_opt(row.evacuation_rate, 3),
            fmt_opt(row.clearance_p50_minutes, 1),
            fmt_opt(row.clearance_p95_minutes, 1),
            fmt_opt(row.fairness, 3),
            fmt_opt(row.robustness, 3),
            row.max_queue.map_or_else(|| "-".to_string(), |q| q.to_string())
        );
    }
    println!();

    // 4. Drill into the most robust variant.
    if let Some(best) = report.best_by_robustness() {
        println!("Most robust variant: {}", best.name);
        if let Some(first) = best.runs().first() {
            print_bottlenecks(first);
            println!();
            print_flow(first);
            println!();
            let sample = first.sample();
            println!("{} agents forwarded for rendering, first {SAMPLE_LIMIT}:", sample.len());
            for r in sample.into_iter().take(SAMPLE_LIMIT) {
                println!(
                    "  {}  start {}  hops {:>2}  evacuated {}",
                    r.agent,
                    r.start_tick,
                    r.hop_count(),
                    r.evacuated_at.map_or_else(|| "never".to_string(), |t| t.to_string())
                );
            }
        }
    }
    println!();

    println!("Comparison as JSON:");
    println!("{}", serde_json::to_string_pretty(&report.comparison())?);

    Ok(())
}
