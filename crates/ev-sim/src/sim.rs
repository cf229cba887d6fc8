//! The `Sim` struct and its tick loop.

use std::sync::Arc;

use ev_core::{AgentId, AgentStatus, EdgeId, SimClock, SimConfig, Tick};
use ev_network::StreetNetwork;
use ev_population::Population;

use crate::outcome::{AgentRecord, SimOutcome, Termination};
use crate::state::{AgentState, Gate, SimulationState, TickSummary};
use crate::{CancelToken, SimObserver};

// ── Sim ───────────────────────────────────────────────────────────────────────

/// The evacuation stepper for one scenario variant.
///
/// `Sim` drives a strictly lock-step tick loop; tick `t + 1` never starts
/// before every update of tick `t` is committed:
///
/// 1. **Activation**: waiting agents whose start tick has arrived become
///    `Moving` at the origin.
/// 2. **Progress** (read phase, optionally parallel with the `parallel`
///    feature): every agent that was already on an edge walks
///    `speed × tick_secs` metres, capped at the edge length.
/// 3. **Admission** (commit phase, sequential): agents that reached the end
///    of their edge, or wait at the origin, try to pass their next gate.
///    Passes repeat until nobody moves; each pass serves queue heads in
///    gate order, then (first pass only) fresh candidates by
///    `(entered_at, AgentId)`.  Exits in one pass free room for the next.
/// 4. **Summary**: status counts and queue statistics are recorded.
///
/// An agent makes at most one edge transition per tick, and progress never
/// carries over past an edge's end.  On edges shorter than
/// `speed × tick_secs` every agent therefore moves one edge per tick, and
/// neither walking speed nor `speed_multiplier` changes its evacuation
/// tick.  Choose `tick_minutes` so typical edges take at least one tick.
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim {
    pub config: SimConfig,

    /// Current tick and tick → minutes mapping.
    pub clock: SimClock,

    /// Shared with every other variant of the ensemble; never mutated.
    pub network: Arc<StreetNetwork>,

    /// Static agent parameters (route, speed, start tick).
    pub population: Population,

    /// Dynamic agent state, indexed by `AgentId`.
    pub agents: Vec<AgentState>,

    pub state: SimulationState,

    /// Agents sorted by `(start_tick, AgentId)`; `pending[next_pending..]`
    /// are still waiting.
    pub(crate) pending:      Vec<AgentId>,
    pub(crate) next_pending: usize,

    /// Activated agents that have not evacuated yet.
    pub(crate) active: Vec<AgentId>,

    pub(crate) timeline:    Vec<TickSummary>,
    pub(crate) termination: Option<Termination>,
    pub(crate) cancel:      CancelToken,
    pub(crate) parallel:    bool,
}

impl Sim {
    // ── Public API ────────────────────────────────────────────────────────

    /// Run until every agent has evacuated, the horizon is exhausted or the
    /// cancel token is set.  Calling `run` again after it returned is a
    /// no-op that reports the same termination.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> Termination {
        loop {
            if let Some(t) = self.termination {
                return t;
            }
            self.step(observer);
        }
    }

    /// Run at most `n` more ticks.  Returns the termination if the loop
    /// stopped within them.
    pub fn run_ticks<O: SimObserver>(&mut self, n: u64, observer: &mut O) -> Option<Termination> {
        for _ in 0..n {
            if self.termination.is_some() {
                break;
            }
            self.step(observer);
        }
        self.termination
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Whether the progress phase runs on Rayon.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Per-tick summaries of every executed tick.
    pub fn timeline(&self) -> &[TickSummary] {
        &self.timeline
    }

    /// Collect the final agent records.
    ///
    /// A run stopped by the caller before reaching a termination condition
    /// is reported as `Cancelled`.
    pub fn into_outcome(self) -> SimOutcome {
        let pop = &self.population;
        let records = self
            .agents
            .iter()
            .enumerate()
            .map(|(i, s)| AgentRecord {
                agent:        AgentId(i as u32),
                destination:  pop.destination[i],
                route:        Arc::clone(&pop.route[i]),
                hops_done:    s.hops_done,
                status:       s.status,
                start_tick:   pop.start_tick[i],
                evacuated_at: s.evacuated_at,
            })
            .collect();

        SimOutcome {
            termination:  self.termination.unwrap_or(Termination::Cancelled),
            ticks_run:    self.clock.current_tick.0,
            tick_minutes: self.config.tick_minutes,
            records,
            queue:        self.state.queue_stats(),
            timeline:     self.timeline,
        }
    }

    // ── Tick loop ─────────────────────────────────────────────────────────

    /// Execute one tick and decide whether the loop stops.
    fn step<O: SimObserver>(&mut self, observer: &mut O) {
        let now = self.clock.current_tick;
        if self.cancel.is_cancelled() {
            self.finish(Termination::Cancelled, observer);
            return;
        }

        observer.on_tick_start(now);
        let summary = self.process_tick(now);
        self.timeline.push(summary);
        observer.on_tick_end(&summary, &self.state, &self.agents);
        self.clock.advance();

        if summary.evacuated == self.population.count {
            self.finish(Termination::AllEvacuated, observer);
        } else if self.clock.current_tick >= self.config.end_tick() {
            self.finish(Termination::HorizonReached, observer);
        }
    }

    fn finish<O: SimObserver>(&mut self, termination: Termination, observer: &mut O) {
        self.termination = Some(termination);
        log::debug!(
            "run stopped at {} ({:?}): {}/{} evacuated",
            self.clock.current_tick,
            termination,
            self.state.evacuated,
            self.population.count
        );
        observer.on_sim_end(self.clock.current_tick, termination);
    }

    fn process_tick(&mut self, now: Tick) -> TickSummary {
        self.state.begin_tick(now);

        // ── Phase 1: activation ───────────────────────────────────────────
        while let Some(&agent) = self.pending.get(self.next_pending) {
            if self.population.start_tick[agent.index()] > now {
                break;
            }
            self.next_pending += 1;
            self.activate(agent, now);
        }

        // ── Phase 2: progress (read) ──────────────────────────────────────
        self.advance_progress(now);

        // ── Phase 3: admission (commit) ───────────────────────────────────
        self.admit(now);

        // ── Phase 4: summary ──────────────────────────────────────────────
        let agents = &self.agents;
        self.active.retain(|a| agents[a.index()].status != AgentStatus::Evacuated);

        let (queued, max_queue) = self.state.observe_queues();
        let waiting   = self.pending.len() - self.next_pending;
        let evacuated = self.state.evacuated;
        TickSummary {
            tick: now,
            waiting,
            moving: self.population.count - waiting - queued - evacuated,
            queued,
            evacuated,
            max_queue,
        }
    }

    fn activate(&mut self, agent: AgentId, now: Tick) {
        let s = &mut self.agents[agent.index()];
        s.status = AgentStatus::Moving;
        s.entered_at = now;
        if self.population.route[agent.index()].is_empty() {
            // Origin is the destination.
            s.status = AgentStatus::Evacuated;
            s.evacuated_at = Some(now);
            self.state.evacuated += 1;
        } else {
            self.active.push(agent);
        }
    }

    /// Walk every agent that was on an edge before this tick.
    fn advance_progress(&mut self, now: Tick) {
        let lengths   = &self.network.edge_length_m;
        let speeds    = &self.population.speed_mps;
        let tick_secs = self.clock.tick_secs();

        let walk = |(s, &speed): (&mut AgentState, &f64)| {
            if s.status == AgentStatus::Moving && s.is_on_edge() && s.entered_at < now {
                let len = lengths[s.edge.index()];
                s.progress_m = (s.progress_m + speed * tick_secs).min(len);
            }
        };

        #[cfg(feature = "parallel")]
        if self.parallel {
            use rayon::prelude::*;
            self.agents.par_iter_mut().zip(speeds.par_iter()).for_each(walk);
            return;
        }

        self.agents.iter_mut().zip(speeds.iter()).for_each(walk);
    }

    fn admit(&mut self, now: Tick) {
        let mut fresh: Vec<AgentId> = self
            .active
            .iter()
            .copied()
            .filter(|&a| self.is_ready(a))
            .collect();
        fresh.sort_by_key(|&a| (self.agents[a.index()].entered_at, a));

        let mut first_pass = true;
        loop {
            let mut moved = 0usize;

            for gate in self.state.active_gates() {
                while let Some(&head) = self.state.queue(gate).front() {
                    if !self.can_pass(head, gate) {
                        break;
                    }
                    self.state.pop_head(gate);
                    self.pass(head, gate, now);
                    moved += 1;
                }
            }

            if first_pass {
                for &agent in &fresh {
                    let gate = self.gate_of(agent);
                    // Never overtake agents already waiting at the gate.
                    if self.state.queue(gate).is_empty() && self.can_pass(agent, gate) {
                        self.pass(agent, gate, now);
                        moved += 1;
                    } else {
                        self.agents[agent.index()].status = AgentStatus::Queued;
                        self.state.enqueue(gate, agent);
                    }
                }
                first_pass = false;
            }

            if moved == 0 {
                break;
            }
        }
    }

    // ── Movement rules ────────────────────────────────────────────────────

    /// `Moving` and either at the origin or at the end of its edge.
    fn is_ready(&self, agent: AgentId) -> bool {
        let s = &self.agents[agent.index()];
        s.status == AgentStatus::Moving
            && (!s.is_on_edge() || s.progress_m >= self.network.edge_length_m[s.edge.index()])
    }

    fn gate_of(&self, agent: AgentId) -> Gate {
        let s = &self.agents[agent.index()];
        let route = &self.population.route[agent.index()];
        if !s.is_on_edge() {
            Gate::Enter(route[0])
        } else if s.hops_done + 1 < route.len() {
            Gate::Enter(route[s.hops_done + 1])
        } else {
            Gate::Exit(s.edge)
        }
    }

    fn can_pass(&self, agent: AgentId, gate: Gate) -> bool {
        let s = &self.agents[agent.index()];
        let leave_ok = !s.is_on_edge() || {
            let e = s.edge.index();
            self.state.exits_this_tick[e] < self.network.edge_service_rate[e]
        };
        match gate {
            Gate::Enter(next) => {
                leave_ok && self.state.occupancy[next.index()] < self.network.edge_capacity[next.index()]
            }
            Gate::Exit(_) => leave_ok,
        }
    }

    fn pass(&mut self, agent: AgentId, gate: Gate, now: Tick) {
        let s = &mut self.agents[agent.index()];
        if s.edge != EdgeId::INVALID {
            let e = s.edge.index();
            self.state.occupancy[e] -= 1;
            self.state.exits_this_tick[e] += 1;
            s.hops_done += 1;
        }
        match gate {
            Gate::Enter(next) => {
                debug_assert!(s.status.can_transition_to(AgentStatus::Moving));
                self.state.occupancy[next.index()] += 1;
                s.status     = AgentStatus::Moving;
                s.edge       = next;
                s.progress_m = 0.0;
                s.entered_at = now;
            }
            Gate::Exit(_) => {
                debug_assert!(s.status.can_transition_to(AgentStatus::Evacuated));
                s.status       = AgentStatus::Evacuated;
                s.edge         = EdgeId::INVALID;
                s.progress_m   = 0.0;
                s.evacuated_at = Some(now);
                self.state.evacuated += 1;
            }
        }
    }
}
