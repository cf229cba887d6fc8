//! Unit tests for ev-ensemble.

use std::io::Write;
use std::sync::Arc;

use ev_core::{Coord, NodeId, OriginSpec, ScenarioVariant};
use ev_network::{GraphPayload, NetworkError, StreetNetwork, StreetNetworkBuilder};
use ev_population::{PopulationConfig, PopulationError, StartDelay};

use crate::*;

// ── Helpers ───────────────────────────────────────────────────────────────────

/// 4 × 4 grid of 20 m, 2 m wide two-way streets, plus a dead-end node 16
/// reachable only through the one-way edge 15 → 16.
fn city() -> Arc<StreetNetwork> {
    let mut b = StreetNetworkBuilder::default();
    let side = 4;
    let id = |r: usize, c: usize| NodeId((r * side + c) as u32);
    for r in 0..side {
        for c in 0..side {
            b.add_node(Coord::new(c as f64 * 20.0, r as f64 * 20.0));
        }
    }
    for r in 0..side {
        for c in 0..side {
            if c + 1 < side {
                b.add_street(id(r, c), id(r, c + 1), 20.0, Some(2.0));
            }
            if r + 1 < side {
                b.add_street(id(r, c), id(r + 1, c), 20.0, Some(2.0));
            }
        }
    }
    let dead_end = b.add_node(Coord::new(80.0, 60.0));
    b.add_directed_street(id(3, 3), dead_end, 20.0, Some(2.0));
    Arc::new(b.build().unwrap())
}

fn population() -> PopulationConfig {
    PopulationConfig::new(40).with_start_delay(StartDelay::Immediate)
}

fn baseline() -> ScenarioVariant {
    ScenarioVariant::new("baseline", 60).with_seed(11)
}

fn congested() -> ScenarioVariant {
    ScenarioVariant::new("congested", 60).with_multipliers(1.5, 0.7).with_seed(11)
}

fn runner(variants: Vec<ScenarioVariant>) -> EnsembleRunner {
    let config = EnsembleConfig::new(population(), variants).with_max_concurrency(4);
    EnsembleRunner::new(city(), config).unwrap()
}

// ── config ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod ensemble_config {
    use super::*;

    const PRESETS: &str = r#"{
        "population": { "base_population": 500, "start_delay": { "kind": "immediate" } },
        "max_concurrency": 2,
        "replicates": 3,
        "variants": [
            { "name": "baseline", "duration_minutes": 90, "seed": 7 },
            { "name": "high_density", "population_multiplier": 1.2,
              "speed_multiplier": 0.9, "duration_minutes": 90, "seed": 7 }
        ]
    }"#;

    #[test]
    fn parses_presets_with_defaults() {
        let c = EnsembleConfig::from_json_str(PRESETS).unwrap();
        assert_eq!(c.variants.len(), 2);
        assert_eq!(c.variants[1].population_multiplier, 1.2);
        assert_eq!(c.variants[0].speed_multiplier, 1.0);
        assert_eq!(c.variants[0].tick_minutes, 1);
        assert_eq!(c.max_concurrency, 2);
        assert_eq!(c.replicates, 3);
        assert_eq!(c.bottleneck_top_k, 10);
        assert_eq!(c.start_histogram_bucket_ticks, 5);
        assert_eq!(c.population.start_delay, StartDelay::Immediate);
    }

    #[test]
    fn loads_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(PRESETS.as_bytes()).unwrap();
        let c = EnsembleConfig::from_path(f.path()).unwrap();
        assert_eq!(c.population.base_population, 500);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EnsembleConfig::from_path(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, EnsembleError::Io(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(EnsembleConfig::from_json_str("{ \"variants\": 3 }"), Err(EnsembleError::Json(_))));
    }

    #[test]
    fn batch_settings_are_validated() {
        let base = EnsembleConfig::new(population(), vec![baseline()]);
        assert!(base.validate().is_ok());
        assert!(base.clone().with_max_concurrency(0).validate().is_err());
        assert!(base.clone().with_replicates(0).validate().is_err());

        let mut zero_bucket = base.clone();
        zero_bucket.start_histogram_bucket_ticks = 0;
        assert!(zero_bucket.validate().is_err());

        let bad_population = EnsembleConfig::new(population().with_destination_quantile(0.0), vec![]);
        assert!(matches!(bad_population.validate(), Err(EnsembleError::Population(_))));
    }

    #[test]
    fn duplicate_variant_names_are_rejected() {
        let c = EnsembleConfig::new(population(), vec![baseline(), baseline()]);
        assert!(matches!(c.validate(), Err(EnsembleError::Config(_))));
    }

    #[test]
    fn malformed_variant_is_not_a_batch_error() {
        let c = EnsembleConfig::new(population(), vec![ScenarioVariant::new("zero", 0)]);
        assert!(c.validate().is_ok());
    }
}

// ── runs ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod runs {
    use super::*;

    #[test]
    fn results_follow_request_order() {
        let names = ["a", "b", "c", "d", "e", "f"];
        let variants = names.iter().map(|n| ScenarioVariant::new(*n, 60).with_seed(3)).collect();
        let report = runner(variants).run();
        let got: Vec<&str> = report.variants.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(got, names);
        assert_eq!(report.succeeded(), names.len());
        assert!(!report.cancelled);
    }

    #[test]
    fn every_agent_gets_out_of_the_grid() {
        let report = runner(vec![baseline()]).run();
        let r = &report.variant("baseline").unwrap().runs()[0];
        assert_eq!(r.metrics.population, 40);
        assert_eq!(r.metrics.evacuation_rate, 1.0);
        assert!((0.0..=1.0).contains(&r.metrics.fairness));
        assert!((0.0..=1.0).contains(&r.metrics.robustness));
        assert_eq!(r.records().len(), 40);
        assert!(!r.bottlenecks.is_empty());
        assert_eq!(r.flow.start_histogram.iter().map(|b| b.count).sum::<u64>(), 40);
        assert_eq!(r.flow.route_length_histogram.iter().map(|b| b.count).sum::<u64>(), 40);
        assert!(!r.timeline().is_empty());
    }

    #[test]
    fn multipliers_scale_the_population() {
        let report = runner(vec![baseline(), congested()]).run();
        assert_eq!(report.variant("congested").unwrap().runs()[0].metrics.population, 60);
    }

    #[test]
    fn same_variant_same_outcome() {
        let a = runner(vec![congested()]).run();
        let b = runner(vec![congested()]).run();
        let ra = &a.variants[0].runs()[0];
        let rb = &b.variants[0].runs()[0];
        let ticks = |r: &ScenarioResult| r.outcome.evacuation_ticks();
        assert_eq!(ticks(ra), ticks(rb));
        assert_eq!(ra.metrics, rb.metrics);
        assert_eq!(ra.bottlenecks, rb.bottlenecks);
    }

    #[test]
    fn unreachable_destination_fails_only_that_variant() {
        let trapped = ScenarioVariant::new("trapped", 60).with_origin(OriginSpec::Node(16));
        let report = runner(vec![baseline(), trapped, congested()]).run();

        assert_eq!(report.variants.len(), 3);
        assert_eq!(report.succeeded(), 2);
        let failures: Vec<&VariantFailure> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].variant, "trapped");
        assert!(matches!(failures[0].reason, FailureReason::UnreachableDestination { origin: NodeId(16), .. }));
        assert_eq!(report.results().count(), 2);
    }

    #[test]
    fn invalid_variant_is_reported_not_raised() {
        let bad = ScenarioVariant::new("negative", 60).with_multipliers(-1.0, 1.0);
        let report = runner(vec![bad, baseline()]).run();
        let f = report.variants[0].failure().unwrap();
        assert_eq!(f.reason.kind(), "invalid_scenario");
        assert!(report.variants[1].is_ok());
    }

    #[test]
    fn zero_population_variant_completes() {
        let empty = ScenarioVariant::new("empty", 60).with_multipliers(0.0, 1.0);
        let report = runner(vec![empty]).run();
        let r = &report.variants[0].runs()[0];
        assert_eq!(r.outcome.ticks_run, 1);
        assert_eq!(r.metrics.evacuation_rate, 0.0);
        assert!(r.metrics.has_flag(ev_metrics::MetricFlag::EmptyPopulation));
        assert!(r.bottlenecks.is_empty());
    }

    #[test]
    fn short_horizon_is_a_partial_result() {
        let rushed = ScenarioVariant::new("rushed", 1);
        let report = runner(vec![rushed]).run();
        let r = &report.variants[0].runs()[0];
        assert_eq!(r.termination(), ev_sim::Termination::HorizonReached);
        assert_eq!(r.metrics.evacuation_rate, 0.0);
        assert_eq!(r.metrics.robustness, 0.0);
    }

    #[test]
    fn cancelled_batch_reports_every_variant() {
        let runner = runner(vec![baseline(), congested()]);
        runner.cancel_token().cancel();
        let report = runner.run();
        assert!(report.cancelled);
        assert_eq!(report.variants.len(), 2);
        assert!(report.failures().all(|f| f.reason == FailureReason::Cancelled));
        assert_eq!(report.failures().count(), 2);
    }

    #[test]
    fn network_from_payload() {
        let payload = GraphPayload::from_json_str(
            r#"{
                "nodes": [{"id": 10, "x": 0, "y": 0}, {"id": 20, "x": 30, "y": 0},
                          {"id": 30, "x": 60, "y": 0}, {"id": 40, "x": 90, "y": 0}],
                "edges": [{"from": 10, "to": 20, "length_m": 30, "width_m": 3},
                          {"from": 20, "to": 30, "length_m": 30, "width_m": 3},
                          {"from": 30, "to": 40, "length_m": 30, "width_m": 3}]
            }"#,
        )
        .unwrap();
        let config = EnsembleConfig::new(PopulationConfig::new(5), vec![baseline()]).with_max_concurrency(1);
        let runner = EnsembleRunner::from_payload(&payload, config).unwrap();
        assert_eq!(runner.network().edge_count(), 6);
        assert!(runner.run().variants[0].is_ok());
    }

    #[test]
    fn overrides_name_payload_nodes() {
        let payload = GraphPayload::from_json_str(
            r#"{
                "nodes": [{"id": 10, "x": 0, "y": 0}, {"id": 20, "x": 30, "y": 0},
                          {"id": 30, "x": 60, "y": 0}],
                "edges": [{"from": 10, "to": 20, "length_m": 30, "width_m": 3},
                          {"from": 20, "to": 30, "length_m": 30, "width_m": 3}]
            }"#,
        )
        .unwrap();
        let west = ScenarioVariant::new("west", 60)
            .with_origin(OriginSpec::Node(10))
            .with_destinations(vec![30]);
        // Dense index 2 exists, payload id 2 does not.
        let dense = ScenarioVariant::new("dense", 60)
            .with_origin(OriginSpec::Node(10))
            .with_destinations(vec![2]);
        let config = EnsembleConfig::new(PopulationConfig::new(5), vec![west, dense]).with_max_concurrency(1);
        let report = EnsembleRunner::from_payload(&payload, config).unwrap().run();

        let run = &report.variant("west").unwrap().runs()[0];
        assert_eq!(run.metrics.evacuation_rate, 1.0);
        assert!(run.records().iter().all(|r| r.destination == NodeId(2) && r.hop_count() == 2));
        let streets: Vec<(u64, u64)> = run.bottlenecks.iter().map(|b| (b.from, b.to)).collect();
        assert_eq!(streets, vec![(10, 20), (20, 30)]);

        let f = report.variant("dense").unwrap().failure().unwrap();
        assert_eq!(f.reason.kind(), "invalid_scenario");
    }
}

// ── replicates & reporting ────────────────────────────────────────────────────

#[cfg(test)]
mod reporting {
    use super::*;

    #[test]
    fn replicates_use_consecutive_seeds() {
        let config = EnsembleConfig::new(population(), vec![congested()])
            .with_replicates(3)
            .with_max_concurrency(2);
        let report = EnsembleRunner::new(city(), config).unwrap().run();
        let runs = report.variants[0].runs();
        let seeds: Vec<u64> = runs.iter().map(|r| r.variant.seed).collect();
        assert_eq!(seeds, vec![11, 12, 13]);
        assert_eq!(runs.iter().map(|r| r.replicate).collect::<Vec<_>>(), vec![0, 1, 2]);

        let s = report.variants[0].summary().unwrap();
        assert_eq!(s.replicates, 3);
        for spread in [s.evacuation_rate, s.fairness, s.robustness] {
            assert!(spread.min <= spread.mean && spread.mean <= spread.max);
        }
    }

    #[test]
    fn spread_of_values() {
        let s = Spread::of(&[1.0, 2.0, 6.0]).unwrap();
        assert_eq!((s.mean, s.min, s.max), (3.0, 1.0, 6.0));
        assert_eq!(Spread::of(&[]), None);
    }

    #[test]
    fn comparison_lists_failures_too() {
        let bad = ScenarioVariant::new("broken", 0);
        let report = runner(vec![baseline(), bad]).run();
        let rows = report.comparison();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].variant, "baseline");
        assert_eq!(rows[0].population, Some(40));
        assert_eq!(rows[0].evacuation_rate, Some(1.0));
        assert!(rows[0].failure.is_none());
        assert_eq!(rows[1].variant, "broken");
        assert!(matches!(rows[1].failure, Some(FailureReason::InvalidScenario { .. })));
        assert_eq!(rows[1].fairness, None);

        let json = serde_json::to_string(&rows).unwrap();
        assert!(json.contains("\"kind\":\"invalid_scenario\""));
    }

    #[test]
    fn best_by_robustness_skips_failures() {
        let rushed = ScenarioVariant::new("rushed", 1);
        let bad = ScenarioVariant::new("broken", 0);
        let report = runner(vec![rushed, bad, baseline()]).run();
        assert_eq!(report.best_by_robustness().map(|v| v.name.as_str()), Some("baseline"));

        let none = runner(vec![ScenarioVariant::new("broken", 0)]).run();
        assert!(none.best_by_robustness().is_none());
    }

    #[test]
    fn sampled_records_are_a_stable_stride() {
        let report = runner(vec![baseline()]).run();
        let r = &report.variants[0].runs()[0];

        let sample = r.sampled_records(10);
        assert_eq!(sample.len(), 10);
        let ids: Vec<u32> = sample.iter().map(|a| a.agent.0).collect();
        assert_eq!(ids, vec![0, 4, 8, 12, 16, 20, 24, 28, 32, 36]);
        assert_eq!(r.sampled_records(10), sample);

        assert_eq!(r.sampled_records(100).len(), 40);
        assert!(r.sampled_records(0).is_empty());
        assert_eq!(r.sample_limit, 1_000);
        assert_eq!(r.sample().len(), 40);
        // Metrics always come from the full set.
        assert_eq!(r.metrics.population, r.records().len());
    }
}

// ── failure mapping ───────────────────────────────────────────────────────────

#[cfg(test)]
mod failures {
    use super::*;

    #[test]
    fn population_errors_map_to_reasons() {
        let unreachable = PopulationError::UnreachableDestination { origin: NodeId(1), destination: NodeId(2) };
        assert_eq!(
            FailureReason::from(unreachable),
            FailureReason::UnreachableDestination { origin: NodeId(1), destination: NodeId(2) }
        );

        let graph = PopulationError::Network(NetworkError::InvalidGraph("no edges".into()));
        assert_eq!(FailureReason::from(graph).kind(), "invalid_graph");

        let missing = PopulationError::Network(NetworkError::NodeNotFound(NodeId(99)));
        assert_eq!(FailureReason::from(missing).kind(), "invalid_scenario");

        let unknown = PopulationError::Network(NetworkError::UnknownNode(9999));
        assert_eq!(FailureReason::from(unknown).kind(), "invalid_scenario");

        let scenario = ScenarioVariant::new("x", 0).validate().unwrap_err();
        assert_eq!(FailureReason::from(PopulationError::from(scenario)).kind(), "invalid_scenario");
    }

    #[test]
    fn display_names_variant_and_replicate() {
        let f = VariantFailure { variant: "v".into(), replicate: 2, reason: FailureReason::Cancelled };
        assert_eq!(f.to_string(), "v (replicate 2): cancelled");
    }
}
