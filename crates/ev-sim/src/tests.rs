//! Unit tests for ev-sim.

use std::collections::HashMap;
use std::sync::Arc;

use ev_core::{AgentId, AgentStatus, Coord, EdgeId, NodeId, ScenarioVariant, SimConfig, Tick};
use ev_network::{Route, StreetNetwork, StreetNetworkBuilder};
use ev_population::{EvacuationPlan, Population, PopulationConfig, PopulationGenerator, StartDelay};

use crate::{
    AgentState, CancelToken, Gate, NoopObserver, SimBuilder, SimObserver, SimOutcome,
    SimulationState, Termination, TickSummary,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn config(horizon_ticks: u64) -> SimConfig {
    SimConfig { tick_minutes: 1, horizon_ticks, seed: 0 }
}

/// One-way line `0 → 1 → … → n-1`; edge `i` joins node `i` to `i + 1`.
fn line(n: usize, length_m: f64, capacity: u32, service_rate: u32) -> Arc<StreetNetwork> {
    let mut b = StreetNetworkBuilder::default();
    let ids: Vec<NodeId> = (0..n).map(|i| b.add_node(Coord::new(i as f64 * length_m, 0.0))).collect();
    for w in ids.windows(2) {
        b.add_directed_edge_with_limits(w[0], w[1], length_m, capacity, service_rate);
    }
    Arc::new(b.build().unwrap())
}

/// Every agent walks the whole line from node 0.
fn line_population(net: &StreetNetwork, speeds: &[f64], starts: &[u64]) -> Population {
    let last = NodeId(net.node_count() as u32 - 1);
    let edges: Arc<[EdgeId]> = (0..net.edge_count() as u32).map(EdgeId).collect();
    let length_m = net.edge_length_m.iter().sum();
    let n = speeds.len();
    Population {
        count:       n,
        plan:        EvacuationPlan {
            origin:       NodeId(0),
            destinations: vec![last],
            routes:       vec![Route { edges: Arc::clone(&edges), length_m }],
        },
        origin:      NodeId(0),
        destination: vec![last; n],
        route:       vec![edges; n],
        speed_mps:   speeds.to_vec(),
        start_tick:  starts.iter().map(|&t| Tick(t)).collect(),
    }
}

fn run(net: Arc<StreetNetwork>, pop: Population, horizon: u64) -> SimOutcome {
    let mut sim = SimBuilder::new(config(horizon), net, pop).build().unwrap();
    sim.run(&mut NoopObserver);
    sim.into_outcome()
}

fn evac_ticks(outcome: &SimOutcome) -> Vec<Option<u64>> {
    outcome.records.iter().map(|r| r.evacuated_at.map(|t| t.0)).collect()
}

/// 6 × 6 grid of 20 m, 1.5 m wide two-way streets (capacity 12, service
/// rate 3 per direction).
fn grid() -> Arc<StreetNetwork> {
    let mut b = StreetNetworkBuilder::default();
    let side = 6;
    let id = |r: usize, c: usize| NodeId((r * side + c) as u32);
    for r in 0..side {
        for c in 0..side {
            b.add_node(Coord::new(c as f64 * 20.0, r as f64 * 20.0));
        }
    }
    for r in 0..side {
        for c in 0..side {
            if c + 1 < side {
                b.add_street(id(r, c), id(r, c + 1), 20.0, Some(1.5));
            }
            if r + 1 < side {
                b.add_street(id(r, c), id(r + 1, c), 20.0, Some(1.5));
            }
        }
    }
    Arc::new(b.build().unwrap())
}

fn grid_population(net: &Arc<StreetNetwork>, base: u32, variant: &ScenarioVariant) -> Population {
    let config = PopulationConfig::new(base).with_start_delay(StartDelay::Exponential { mean_minutes: 2.0 });
    PopulationGenerator::new(Arc::clone(net), config)
        .unwrap()
        .generate(variant)
        .unwrap()
}

/// Observer that checks the stepper invariants at the end of every tick.
#[derive(Default)]
struct InvariantChecker {
    capacity:        Vec<u32>,
    prev_status:     Vec<AgentStatus>,
    prev_evacuated:  usize,
    prev_queues:     HashMap<Gate, Vec<AgentId>>,
    ticks:           usize,
    max_queue_seen:  usize,
}

impl InvariantChecker {
    fn new(net: &StreetNetwork) -> Self {
        Self { capacity: net.edge_capacity.clone(), ..Self::default() }
    }
}

impl SimObserver for InvariantChecker {
    fn on_tick_end(&mut self, s: &TickSummary, state: &SimulationState, agents: &[AgentState]) {
        self.ticks += 1;

        // Conservation, recounted from agent states.
        let count = |st: AgentStatus| agents.iter().filter(|a| a.status == st).count();
        assert_eq!(count(AgentStatus::Waiting), s.waiting, "{}", s.tick);
        assert_eq!(count(AgentStatus::Moving), s.moving, "{}", s.tick);
        assert_eq!(count(AgentStatus::Queued), s.queued, "{}", s.tick);
        assert_eq!(count(AgentStatus::Evacuated), s.evacuated, "{}", s.tick);
        assert_eq!(s.total(), agents.len());

        // Monotonicity; evacuated is terminal.
        assert!(s.evacuated >= self.prev_evacuated);
        self.prev_evacuated = s.evacuated;
        // Activation and queueing can both happen within one tick, so only
        // the two irreversible edges of the lifecycle are checked here.
        for (prev, now) in self.prev_status.iter().zip(agents) {
            assert!(!prev.is_terminal() || now.status.is_terminal(), "left Evacuated");
            assert!(*prev == AgentStatus::Waiting || now.status != AgentStatus::Waiting);
        }
        self.prev_status = agents.iter().map(|a| a.status).collect();

        // Capacity respect, and occupancy matches agent positions.
        let mut on_edge = vec![0u32; self.capacity.len()];
        for a in agents.iter().filter(|a| a.is_on_edge()) {
            on_edge[a.edge.index()] += 1;
        }
        assert_eq!(on_edge, state.occupancy);
        for (occ, cap) in state.occupancy.iter().zip(&self.capacity) {
            assert!(occ <= cap);
        }

        // FIFO: each queue is its previous contents minus a prefix, plus
        // newcomers at the back.
        let mut queues = HashMap::new();
        for gate in state.active_gates() {
            queues.insert(gate, state.queue(gate).iter().copied().collect::<Vec<_>>());
        }
        for (gate, old) in &self.prev_queues {
            let new = queues.get(gate).map(Vec::as_slice).unwrap_or(&[]);
            let survivors = old.iter().filter(|a| new.contains(a)).count();
            let served = old.len() - survivors;
            assert_eq!(&new[..survivors], &old[served..], "FIFO violated at {gate:?}");
        }
        for q in queues.values() {
            self.max_queue_seen = self.max_queue_seen.max(q.len());
        }
        self.prev_queues = queues;
    }
}

// ── Builder validation ────────────────────────────────────────────────────────

#[cfg(test)]
mod builder_tests {
    use super::*;
    use crate::SimError;

    #[test]
    fn builds_with_valid_population() {
        let net = line(4, 10.0, 1, 1);
        let pop = line_population(&net, &[1.2, 1.2], &[0, 0]);
        let sim = SimBuilder::new(config(10), net, pop).build().unwrap();
        assert_eq!(sim.agents.len(), 2);
        assert!(sim.agents.iter().all(|a| a.status == AgentStatus::Waiting));
        assert_eq!(sim.termination(), None);
    }

    #[test]
    fn zero_horizon_rejected() {
        let net = line(3, 10.0, 1, 1);
        let pop = line_population(&net, &[1.0], &[0]);
        assert!(matches!(
            SimBuilder::new(config(0), net, pop).build(),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn length_mismatch_rejected() {
        let net = line(3, 10.0, 1, 1);
        let mut pop = line_population(&net, &[1.0, 1.0], &[0, 0]);
        pop.speed_mps.pop();
        assert!(matches!(
            SimBuilder::new(config(5), net, pop).build(),
            Err(SimError::AgentCountMismatch { expected: 2, got: 1, what: "speeds" })
        ));
    }

    #[test]
    fn broken_route_rejected() {
        let net = line(4, 10.0, 1, 1);
        let mut pop = line_population(&net, &[1.0], &[0]);
        pop.route[0] = vec![EdgeId(0), EdgeId(2)].into();
        assert!(matches!(
            SimBuilder::new(config(5), net, pop).build(),
            Err(SimError::InvalidRoute { agent: AgentId(0), .. })
        ));
    }

    #[test]
    fn non_positive_speed_rejected() {
        let net = line(3, 10.0, 1, 1);
        let pop = line_population(&net, &[0.0], &[0]);
        assert!(SimBuilder::new(config(5), net, pop).build().is_err());
    }
}

// ── Concrete scenarios ────────────────────────────────────────────────────────

#[cfg(test)]
mod scenarios {
    use super::*;

    #[test]
    fn single_agent_crosses_one_edge_per_tick() {
        // A–B–C–D, capacity 1, service rate 1, one edge per tick.
        let net = line(4, 10.0, 1, 1);
        let pop = line_population(&net, &[1.2], &[0]);
        let out = run(net, pop, 20);
        assert_eq!(evac_ticks(&out), vec![Some(3)]);
        assert_eq!(out.termination, Termination::AllEvacuated);
        assert_eq!(out.ticks_run, 4);
        assert!(out.records[0].remaining_route().is_empty());
    }

    #[test]
    fn bottleneck_staggers_three_agents() {
        let net = line(4, 10.0, 1, 1);
        let pop = line_population(&net, &[1.2, 1.2, 1.2], &[0, 0, 0]);
        let out = run(net, pop, 20);
        assert_eq!(evac_ticks(&out), vec![Some(3), Some(4), Some(5)]);
        assert_eq!(out.evacuated(), 3);
        assert_eq!(out.ticks_run, 6);
        // Agents 1 and 2 queued at the first edge during tick 0.
        assert_eq!(out.timeline[0].queued, 2);
        assert_eq!(out.timeline[0].max_queue, 2);
        assert_eq!(out.queue.max, 2);
        // Queue lengths 2 then 1 over 3 edges × 6 ticks.
        assert!((out.queue.mean - 3.0 / 18.0).abs() < 1e-12);
        assert_eq!(out.queue.mean_active, 1.5);
    }

    #[test]
    fn only_first_edge_constrained_gives_same_stagger() {
        let mut b = StreetNetworkBuilder::default();
        let n: Vec<NodeId> = (0..4).map(|i| b.add_node(Coord::new(i as f64, 0.0))).collect();
        b.add_directed_edge_with_limits(n[0], n[1], 10.0, 1, 1);
        b.add_directed_street(n[1], n[2], 10.0, None);
        b.add_directed_street(n[2], n[3], 10.0, None);
        let net = Arc::new(b.build().unwrap());
        let pop = line_population(&net, &[1.2, 1.2, 1.2], &[0, 0, 0]);
        assert_eq!(evac_ticks(&run(net, pop, 20)), vec![Some(3), Some(4), Some(5)]);
    }

    #[test]
    fn empty_population_completes_tick_zero() {
        let net = line(4, 10.0, 1, 1);
        let pop = line_population(&net, &[], &[]);
        let out = run(net, pop, 20);
        assert_eq!(out.termination, Termination::AllEvacuated);
        assert_eq!(out.ticks_run, 1);
        assert!(out.records.is_empty());
        assert_eq!(out.queue.max, 0);
        assert_eq!(out.queue.mean, 0.0);
        assert_eq!(out.queue.mean_active, 0.0);
    }

    #[test]
    fn short_horizon_leaves_everyone_out() {
        let net = line(4, 10.0, 1, 1);
        let pop = line_population(&net, &[1.2, 1.2], &[0, 0]);
        let out = run(net, pop, 2);
        assert_eq!(out.termination, Termination::HorizonReached);
        assert_eq!(out.ticks_run, 2);
        assert_eq!(out.evacuated(), 0);
        assert!(out.records.iter().all(|r| r.status.is_active()));
        assert_eq!(out.records[0].remaining_route(), &[EdgeId(1), EdgeId(2)]);
        assert_eq!(out.records[1].remaining_route(), &[EdgeId(0), EdgeId(1), EdgeId(2)]);
    }

    #[test]
    fn start_delay_shifts_evacuation() {
        let net = line(4, 10.0, 1, 1);
        let pop = line_population(&net, &[1.2], &[2]);
        let out = run(net, pop, 20);
        assert_eq!(evac_ticks(&out), vec![Some(5)]);
        assert_eq!(out.timeline[0].waiting, 1);
        assert_eq!(out.timeline[2].waiting, 0);
    }

    #[test]
    fn short_edges_cap_every_walker_at_one_edge_per_tick() {
        // 10 m edges: anything faster than 10 m per minute gains nothing.
        let net = line(4, 10.0, 10, 10);
        let pop = line_population(&net, &[0.5, 1.2, 2.5, 0.1], &[0, 0, 0, 0]);
        // 0.1 m/s covers 6 m per tick and needs two ticks per edge.
        assert_eq!(evac_ticks(&run(net, pop, 20)), vec![Some(3), Some(3), Some(3), Some(6)]);
    }

    #[test]
    fn slow_walker_needs_several_ticks_per_edge() {
        // 100 m at 1 m/s: 60 m per tick, edge done during the second tick.
        let net = line(2, 100.0, 10, 10);
        let pop = line_population(&net, &[1.0], &[0]);
        assert_eq!(evac_ticks(&run(net, pop, 20)), vec![Some(2)]);
    }

    #[test]
    fn service_rate_limits_final_exit() {
        let net = line(2, 10.0, 2, 1);
        let pop = line_population(&net, &[1.2, 1.2], &[0, 0]);
        let out = run(net, pop, 20);
        assert_eq!(evac_ticks(&out), vec![Some(1), Some(2)]);
        assert_eq!(out.timeline[1].queued, 1);
    }

    #[test]
    fn trivial_route_evacuates_on_activation() {
        let net = line(3, 10.0, 1, 1);
        let mut pop = line_population(&net, &[1.0], &[1]);
        pop.route[0] = Arc::from(Vec::<EdgeId>::new());
        pop.destination[0] = NodeId(0);
        let out = run(net, pop, 20);
        assert_eq!(evac_ticks(&out), vec![Some(1)]);
    }
}

// ── Properties ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod properties {
    use super::*;

    fn variant() -> ScenarioVariant {
        ScenarioVariant::new("grid", 90).with_seed(11)
    }

    #[test]
    fn invariants_hold_every_tick_under_congestion() {
        let net = grid();
        let pop = grid_population(&net, 400, &variant());
        let mut checker = InvariantChecker::new(&net);
        let mut sim = SimBuilder::new(variant().sim_config(), Arc::clone(&net), pop).build().unwrap();
        sim.run(&mut checker);
        let out = sim.into_outcome();

        assert_eq!(checker.ticks as u64, out.ticks_run);
        assert_eq!(out.timeline.len() as u64, out.ticks_run);
        // The scenario is congested enough to form queues.
        assert!(checker.max_queue_seen > 0);
        assert_eq!(out.queue.max, out.timeline.iter().map(|t| t.max_queue).max().unwrap_or(0));
        assert!(out.queue.mean_active >= 1.0);
        assert!(out.queue.mean > 0.0 && out.queue.mean < out.queue.mean_active);
    }

    fn run_with(net: &Arc<StreetNetwork>, parallel: bool) -> SimOutcome {
        let pop = grid_population(net, 400, &variant());
        let mut sim = SimBuilder::new(variant().sim_config(), Arc::clone(net), pop)
            .parallel(parallel)
            .build()
            .unwrap();
        assert_eq!(sim.is_parallel(), parallel && cfg!(feature = "parallel"));
        sim.run(&mut NoopObserver);
        sim.into_outcome()
    }

    #[test]
    fn parallel_progress_matches_sequential() {
        let net = grid();
        let seq = run_with(&net, false);
        let par = run_with(&net, true);
        assert_eq!(seq.timeline, par.timeline);
        assert_eq!(evac_ticks(&seq), evac_ticks(&par));
        assert_eq!(seq.queue, par.queue);
    }

    #[test]
    fn same_variant_reproduces_identical_outcome() {
        let net = grid();
        let a = run(Arc::clone(&net), grid_population(&net, 300, &variant()), 90);
        let b = run(Arc::clone(&net), grid_population(&net, 300, &variant()), 90);
        assert_eq!(evac_ticks(&a), evac_ticks(&b));
        assert_eq!(a.timeline, b.timeline);
        assert_eq!(a.queue, b.queue);
        assert_eq!(a.termination, b.termination);
    }

    #[test]
    fn evacuated_records_are_complete() {
        let net = grid();
        let out = run(Arc::clone(&net), grid_population(&net, 200, &variant()), 90);
        for r in &out.records {
            match r.evacuated_at {
                Some(t) => {
                    assert!(r.is_evacuated());
                    assert!(r.remaining_route().is_empty());
                    // At least one tick per edge after the start tick.
                    assert!(t.0 >= r.start_tick.0 + r.hop_count() as u64);
                }
                None => assert!(!r.is_evacuated()),
            }
        }
    }
}

// ── Cancellation & stepping ───────────────────────────────────────────────────

#[cfg(test)]
mod control {
    use super::*;

    struct CancelAt {
        tick:  Tick,
        token: CancelToken,
        ended: Option<(Tick, Termination)>,
    }

    impl SimObserver for CancelAt {
        fn on_tick_end(&mut self, s: &TickSummary, _: &SimulationState, _: &[AgentState]) {
            if s.tick == self.tick {
                self.token.cancel();
            }
        }

        fn on_sim_end(&mut self, final_tick: Tick, termination: Termination) {
            self.ended = Some((final_tick, termination));
        }
    }

    #[test]
    fn cancelled_before_start_runs_nothing() {
        let net = line(4, 10.0, 1, 1);
        let token = CancelToken::new();
        token.cancel();
        let pop = line_population(&net, &[1.2], &[0]);
        let mut sim = SimBuilder::new(config(20), net, pop).cancel_token(token).build().unwrap();
        assert_eq!(sim.run(&mut NoopObserver), Termination::Cancelled);
        let out = sim.into_outcome();
        assert_eq!(out.ticks_run, 0);
        assert_eq!(out.records[0].status, AgentStatus::Waiting);
    }

    #[test]
    fn cancel_is_observed_at_next_tick_boundary() {
        let net = line(4, 10.0, 1, 1);
        let token = CancelToken::new();
        let pop = line_population(&net, &[1.2, 1.2, 1.2], &[0, 0, 0]);
        let mut sim = SimBuilder::new(config(20), net, pop)
            .cancel_token(token.clone())
            .build()
            .unwrap();
        let mut obs = CancelAt { tick: Tick(1), token, ended: None };
        assert_eq!(sim.run(&mut obs), Termination::Cancelled);
        assert_eq!(obs.ended, Some((Tick(2), Termination::Cancelled)));

        let out = sim.into_outcome();
        assert_eq!(out.ticks_run, 2);
        assert_eq!(out.timeline.len(), 2);
        assert_eq!(out.evacuated(), 0);
    }

    #[test]
    fn run_ticks_then_run_matches_single_run() {
        let net = line(4, 10.0, 1, 1);
        let speeds = [1.2, 1.2, 1.2];
        let starts = [0, 0, 1];

        let full = run(Arc::clone(&net), line_population(&net, &speeds, &starts), 20);

        let pop = line_population(&net, &speeds, &starts);
        let mut sim = SimBuilder::new(config(20), Arc::clone(&net), pop).build().unwrap();
        assert_eq!(sim.run_ticks(2, &mut NoopObserver), None);
        assert_eq!(sim.timeline().len(), 2);
        sim.run(&mut NoopObserver);
        // A finished run stays finished.
        assert_eq!(sim.run(&mut NoopObserver), Termination::AllEvacuated);
        let stepped = sim.into_outcome();

        assert_eq!(evac_ticks(&full), evac_ticks(&stepped));
        assert_eq!(full.timeline, stepped.timeline);
    }
}
