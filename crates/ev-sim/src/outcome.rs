//! Final output of one simulation run.

use std::sync::Arc;

use serde::Serialize;

use ev_core::{AgentId, AgentStatus, EdgeId, NodeId, Tick};

use crate::state::{QueueStats, TickSummary};

/// Why the tick loop stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    AllEvacuated,
    /// Horizon exhausted with agents still out.  A valid partial outcome.
    HorizonReached,
    /// A cancellation flag was observed at a tick boundary.
    Cancelled,
}

/// Final state of one agent.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentRecord {
    pub agent:        AgentId,
    pub destination:  NodeId,
    /// The full route the agent was given.
    pub route:        Arc<[EdgeId]>,
    /// Edges of `route` already left behind.
    pub hops_done:    usize,
    pub status:       AgentStatus,
    pub start_tick:   Tick,
    /// `None` means "did not evacuate".
    pub evacuated_at: Option<Tick>,
}

impl AgentRecord {
    /// Edges still to traverse, including the one currently occupied.
    pub fn remaining_route(&self) -> &[EdgeId] {
        &self.route[self.hops_done.min(self.route.len())..]
    }

    #[inline]
    pub fn is_evacuated(&self) -> bool {
        self.status == AgentStatus::Evacuated
    }

    #[inline]
    pub fn hop_count(&self) -> usize {
        self.route.len()
    }
}

/// Everything a finished (or stopped) run produced.
#[derive(Clone, Debug)]
pub struct SimOutcome {
    pub termination:  Termination,
    /// Ticks executed; the last executed tick is `ticks_run - 1`.
    pub ticks_run:    u64,
    pub tick_minutes: u32,
    /// One record per agent, indexed by `AgentId`.
    pub records:      Vec<AgentRecord>,
    pub queue:        QueueStats,
    pub timeline:     Vec<TickSummary>,
}

impl SimOutcome {
    pub fn population(&self) -> usize {
        self.records.len()
    }

    pub fn evacuated(&self) -> usize {
        self.records.iter().filter(|r| r.is_evacuated()).count()
    }

    /// Evacuation ticks of every evacuee, in `AgentId` order.
    pub fn evacuation_ticks(&self) -> Vec<Tick> {
        self.records.iter().filter_map(|r| r.evacuated_at).collect()
    }

    /// Scenario minutes simulated.
    pub fn duration_minutes(&self) -> u64 {
        self.ticks_run * self.tick_minutes as u64
    }
}
