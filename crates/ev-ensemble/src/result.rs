//! Per-run results and structured per-variant failures.

use std::time::Duration;

use serde::Serialize;

use ev_core::{EvError, NodeId, ScenarioVariant};
use ev_metrics::{Bottleneck, FlowReport, MetricsReport};
use ev_network::NetworkError;
use ev_population::PopulationError;
use ev_sim::{AgentRecord, SimError, SimOutcome, Termination, TickSummary};

// ── ScenarioResult ────────────────────────────────────────────────────────────

/// Everything one simulation run of one variant produced.
///
/// The full per-agent record set stays attached so metrics and bottleneck
/// figures are never computed from a sample; renderers that only need a
/// bounded number of agents use [`sampled_records`](Self::sampled_records).
#[derive(Clone, Debug)]
pub struct ScenarioResult {
    /// The variant as run, with the replicate's seed.
    pub variant:      ScenarioVariant,
    /// `0` for the first run of a variant.
    pub replicate:    u32,
    pub metrics:      MetricsReport,
    pub bottlenecks:  Vec<Bottleneck>,
    pub flow:         FlowReport,
    pub outcome:      SimOutcome,
    /// Default size of [`sample`](Self::sample).
    pub sample_limit: usize,
    /// Wall-clock time spent generating and simulating.
    pub wall_time:    Duration,
}

impl ScenarioResult {
    pub fn name(&self) -> &str {
        &self.variant.name
    }

    pub fn termination(&self) -> Termination {
        self.outcome.termination
    }

    /// Every agent's final record, indexed by `AgentId`.
    pub fn records(&self) -> &[AgentRecord] {
        &self.outcome.records
    }

    pub fn timeline(&self) -> &[TickSummary] {
        &self.outcome.timeline
    }

    /// At most `limit` records spread evenly over the population, in
    /// `AgentId` order.  The same limit always yields the same agents.
    pub fn sampled_records(&self, limit: usize) -> Vec<&AgentRecord> {
        let records = self.records();
        let n = records.len();
        if n <= limit {
            return records.iter().collect();
        }
        (0..limit).map(|i| &records[i * n / limit]).collect()
    }

    /// [`sampled_records`](Self::sampled_records) with the ensemble's
    /// `record_sample_limit`.
    pub fn sample(&self) -> Vec<&AgentRecord> {
        self.sampled_records(self.sample_limit)
    }
}

// ── Failures ──────────────────────────────────────────────────────────────────

/// Why a variant produced no result.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    InvalidScenario { reason: String },
    InvalidGraph { reason: String },
    UnreachableDestination { origin: NodeId, destination: NodeId },
    /// Cancelled before the run started.
    Cancelled,
    Simulation { reason: String },
}

impl FailureReason {
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::InvalidScenario { .. }        => "invalid_scenario",
            FailureReason::InvalidGraph { .. }           => "invalid_graph",
            FailureReason::UnreachableDestination { .. } => "unreachable_destination",
            FailureReason::Cancelled                     => "cancelled",
            FailureReason::Simulation { .. }             => "simulation",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::InvalidScenario { reason } => write!(f, "invalid scenario: {reason}"),
            FailureReason::InvalidGraph { reason } => write!(f, "invalid graph: {reason}"),
            FailureReason::UnreachableDestination { origin, destination } => {
                write!(f, "destination {destination} unreachable from {origin}")
            }
            FailureReason::Cancelled => f.write_str("cancelled"),
            FailureReason::Simulation { reason } => write!(f, "simulation: {reason}"),
        }
    }
}

impl From<EvError> for FailureReason {
    fn from(e: EvError) -> Self {
        match e {
            EvError::InvalidScenario { reason, .. } => FailureReason::InvalidScenario { reason },
            other => FailureReason::InvalidScenario { reason: other.to_string() },
        }
    }
}

impl From<NetworkError> for FailureReason {
    fn from(e: NetworkError) -> Self {
        match e {
            NetworkError::NoRoute { from, to } => {
                FailureReason::UnreachableDestination { origin: from, destination: to }
            }
            // An origin or destination override naming a missing node.
            NetworkError::NodeNotFound(_) | NetworkError::UnknownNode(_) => {
                FailureReason::InvalidScenario { reason: e.to_string() }
            }
            other => FailureReason::InvalidGraph { reason: other.to_string() },
        }
    }
}

impl From<PopulationError> for FailureReason {
    fn from(e: PopulationError) -> Self {
        match e {
            PopulationError::UnreachableDestination { origin, destination } => {
                FailureReason::UnreachableDestination { origin, destination }
            }
            PopulationError::Scenario(e) => e.into(),
            PopulationError::Network(e) => e.into(),
            // Population settings are checked with the ensemble config, so a
            // late config error means the network offers no usable plan.
            PopulationError::Config(reason) => FailureReason::InvalidGraph { reason },
        }
    }
}

impl From<SimError> for FailureReason {
    fn from(e: SimError) -> Self {
        FailureReason::Simulation { reason: e.to_string() }
    }
}

/// A variant (or one of its replicates) that produced no result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariantFailure {
    pub variant:   String,
    pub replicate: u32,
    pub reason:    FailureReason,
}

impl std::fmt::Display for VariantFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (replicate {}): {}", self.variant, self.replicate, self.reason)
    }
}
