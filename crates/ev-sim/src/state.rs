//! Mutable per-run state: agent positions, edge occupancy and queues.
//!
//! # Gates
//!
//! Every ready agent is trying to pass exactly one *gate*:
//!
//! ```text
//! Enter(e)  — step onto edge e (from the origin or from the previous edge)
//! Exit(e)   — leave the final edge e of its route and evacuate
//! ```
//!
//! An agent blocked at a gate waits in that gate's FIFO queue.  Queues are
//! served head first; a blocked head blocks everyone behind it.

use std::collections::{BTreeSet, VecDeque};

use serde::Serialize;

use ev_core::{AgentId, AgentStatus, EdgeId, Tick};

// ── AgentState ────────────────────────────────────────────────────────────────

/// Dynamic state of one agent.  Static parameters (route, speed, start
/// tick) stay in the `Population`.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentState {
    pub status: AgentStatus,

    /// Route edges already exited.
    pub hops_done: usize,

    /// Edge currently occupied; `EdgeId::INVALID` at the origin or once
    /// evacuated.
    pub edge: EdgeId,

    /// Metres walked along `edge`, capped at its length.
    pub progress_m: f64,

    /// Tick the agent stepped onto `edge` (or left the waiting state).
    pub entered_at: Tick,

    pub evacuated_at: Option<Tick>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            status:       AgentStatus::Waiting,
            hops_done:    0,
            edge:         EdgeId::INVALID,
            progress_m:   0.0,
            entered_at:   Tick::ZERO,
            evacuated_at: None,
        }
    }
}

impl AgentState {
    #[inline]
    pub fn is_on_edge(&self) -> bool {
        self.edge != EdgeId::INVALID
    }
}

// ── Gate ──────────────────────────────────────────────────────────────────────

/// A transition point agents queue at.  Orders by edge id, `Enter` before
/// `Exit` on the same edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Gate {
    Enter(EdgeId),
    Exit(EdgeId),
}

impl Gate {
    #[inline]
    pub fn edge(self) -> EdgeId {
        match self {
            Gate::Enter(e) | Gate::Exit(e) => e,
        }
    }

    fn sort_key(self) -> (u32, u8) {
        match self {
            Gate::Enter(e) => (e.0, 0),
            Gate::Exit(e) => (e.0, 1),
        }
    }
}

// ── SimulationState ───────────────────────────────────────────────────────────

/// Per-tick aggregate owned by one stepper.
pub struct SimulationState {
    pub tick: Tick,

    /// Agents currently on each edge (walking or queued at its far end).
    pub occupancy: Vec<u32>,

    /// Agents that left each edge during the current tick.
    pub exits_this_tick: Vec<u32>,

    enter_queues: Vec<VecDeque<AgentId>>,
    exit_queues:  Vec<VecDeque<AgentId>>,

    /// Gates with a non-empty queue, keyed by `Gate::sort_key`.
    active_gates: BTreeSet<(u32, u8)>,

    pub evacuated:     usize,
    pub max_queue_len: usize,

    /// Sum and count of non-empty per-edge queue lengths over all ticks.
    queue_len_sum:      u64,
    queue_observations: u64,
    /// Ticks folded into the queue statistics.
    queue_ticks:        u64,
}

impl SimulationState {
    pub fn new(edge_count: usize) -> Self {
        Self {
            tick:               Tick::ZERO,
            occupancy:          vec![0; edge_count],
            exits_this_tick:    vec![0; edge_count],
            enter_queues:       vec![VecDeque::new(); edge_count],
            exit_queues:        vec![VecDeque::new(); edge_count],
            active_gates:       BTreeSet::new(),
            evacuated:          0,
            max_queue_len:      0,
            queue_len_sum:      0,
            queue_observations: 0,
            queue_ticks:        0,
        }
    }

    #[inline]
    pub fn queue(&self, gate: Gate) -> &VecDeque<AgentId> {
        match gate {
            Gate::Enter(e) => &self.enter_queues[e.index()],
            Gate::Exit(e) => &self.exit_queues[e.index()],
        }
    }

    #[inline]
    fn queue_mut(&mut self, gate: Gate) -> &mut VecDeque<AgentId> {
        match gate {
            Gate::Enter(e) => &mut self.enter_queues[e.index()],
            Gate::Exit(e) => &mut self.exit_queues[e.index()],
        }
    }

    /// Agents queued at `edge` (both its gates).
    pub fn queue_len(&self, edge: EdgeId) -> usize {
        self.enter_queues[edge.index()].len() + self.exit_queues[edge.index()].len()
    }

    pub fn total_queued(&self) -> usize {
        self.active_gates.iter().map(|&k| self.queue(gate_from_key(k)).len()).sum()
    }

    /// Non-empty gates in service order.
    pub fn active_gates(&self) -> Vec<Gate> {
        self.active_gates.iter().map(|&k| gate_from_key(k)).collect()
    }

    pub(crate) fn enqueue(&mut self, gate: Gate, agent: AgentId) {
        self.queue_mut(gate).push_back(agent);
        self.active_gates.insert(gate.sort_key());
    }

    pub(crate) fn pop_head(&mut self, gate: Gate) -> Option<AgentId> {
        let q = self.queue_mut(gate);
        let head = q.pop_front();
        if q.is_empty() {
            self.active_gates.remove(&gate.sort_key());
        }
        head
    }

    pub(crate) fn begin_tick(&mut self, tick: Tick) {
        self.tick = tick;
        self.exits_this_tick.fill(0);
    }

    /// Fold this tick's queue lengths into the running statistics and
    /// return `(total_queued, longest_edge_queue)`.
    pub(crate) fn observe_queues(&mut self) -> (usize, usize) {
        let mut total = 0;
        let mut longest = 0;
        let mut last_edge = u32::MAX;
        for &(e, _) in &self.active_gates {
            // Both gates of an edge count as one observation.
            if e == last_edge {
                continue;
            }
            last_edge = e;
            let len = self.queue_len(EdgeId(e));
            total += len;
            longest = longest.max(len);
            self.queue_len_sum += len as u64;
            self.queue_observations += 1;
        }
        self.max_queue_len = self.max_queue_len.max(longest);
        self.queue_ticks += 1;
        (total, longest)
    }

    pub fn queue_stats(&self) -> QueueStats {
        let ratio = |n: u64| if n == 0 { 0.0 } else { self.queue_len_sum as f64 / n as f64 };
        let edge_ticks = self.occupancy.len() as u64 * self.queue_ticks;
        QueueStats {
            max:         self.max_queue_len,
            mean:        ratio(edge_ticks),
            mean_active: ratio(self.queue_observations),
        }
    }
}

fn gate_from_key((e, kind): (u32, u8)) -> Gate {
    if kind == 0 { Gate::Enter(EdgeId(e)) } else { Gate::Exit(EdgeId(e)) }
}

// ── Summaries ─────────────────────────────────────────────────────────────────

/// Queue statistics over all edges and ticks.
///
/// An edge's queue length is the sum of both its gate queues.  Both means
/// are `0.0` when nothing ever queued.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct QueueStats {
    pub max:  usize,
    /// Mean queue length over every (edge, tick) of the run.
    pub mean: f64,
    /// Mean length of the queues that were non-empty.
    pub mean_active: f64,
}

/// Status counts at the end of one tick.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub tick:         Tick,
    pub waiting:      usize,
    pub moving:       usize,
    pub queued:       usize,
    pub evacuated:    usize,
    /// Longest single-edge queue this tick.
    pub max_queue:    usize,
}

impl TickSummary {
    pub fn total(&self) -> usize {
        self.waiting + self.moving + self.queued + self.evacuated
    }
}
