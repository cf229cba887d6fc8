//! Agent population: Structure-of-Arrays agent parameters and the generator
//! that fills them.
//!
//! # Determinism
//!
//! Agent `k` of a variant draws from `AgentRng::new(variant.seed, k)` in a
//! fixed order: speed, start delay, then (uniform assignment only) the
//! destination index.  Generation is therefore independent of population
//! size and of thread scheduling.

use std::sync::{Arc, OnceLock};

use rand_distr::{Exp, Normal};

use ev_core::{AgentId, AgentRng, EdgeId, NodeId, ScenarioVariant, SimClock, Tick};
use ev_network::{StreetNetwork, most_central_node};

use crate::config::{Assignment, PopulationConfig, StartDelay};
use crate::plan::{EvacuationPlan, resolve_destinations, resolve_origin};
use crate::{PopulationError, PopulationResult};

// ── Population ────────────────────────────────────────────────────────────────

/// Immutable per-agent parameters of one variant.
///
/// Every `Vec` has `count` elements and is indexed by `AgentId`.  Route and
/// speed never change once generated; only the stepper's queue position for
/// an agent does.
pub struct Population {
    pub count: usize,
    pub plan:  EvacuationPlan,

    /// Node every agent starts from (the plan's origin).
    pub origin: NodeId,

    pub destination: Vec<NodeId>,

    /// Full route; agents heading to the same destination share one slice.
    pub route: Vec<Arc<[EdgeId]>>,

    /// Walking speed in m/s, already scaled and clamped.
    pub speed_mps: Vec<f64>,

    /// First tick at which the agent may leave the origin.
    pub start_tick: Vec<Tick>,
}

impl Population {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        (0..self.count as u32).map(AgentId)
    }

    /// Hop count of an agent's full route.
    #[inline]
    pub fn route_len(&self, agent: AgentId) -> usize {
        self.route[agent.index()].len()
    }
}

// ── PopulationGenerator ───────────────────────────────────────────────────────

/// Produces a [`Population`] per variant over a shared network.
///
/// The centrality-based origin depends only on the network and config, so
/// it is computed on first use and reused by every later variant.  The
/// generator is `Sync`; concurrent variants may share one instance.
pub struct PopulationGenerator {
    network: Arc<StreetNetwork>,
    config:  PopulationConfig,
    central: OnceLock<Option<NodeId>>,
}

impl PopulationGenerator {
    pub fn new(network: Arc<StreetNetwork>, config: PopulationConfig) -> PopulationResult<Self> {
        config.validate()?;
        Ok(Self { network, config, central: OnceLock::new() })
    }

    pub fn network(&self) -> &Arc<StreetNetwork> {
        &self.network
    }

    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }

    /// Highest-betweenness node, ties to the lowest `NodeId`.
    pub fn central_origin(&self) -> PopulationResult<NodeId> {
        let central = self.central.get_or_init(|| {
            let node = most_central_node(
                &self.network,
                self.config.centrality_sample_size,
                self.config.centrality_seed,
            );
            if let Some(n) = node {
                log::debug!("most central node: {n}");
            }
            node
        });
        central.ok_or_else(|| PopulationError::Config("network has no nodes".into()))
    }

    /// Origin and destinations for `variant`.
    pub fn plan(&self, variant: &ScenarioVariant) -> PopulationResult<EvacuationPlan> {
        let origin = match &variant.origin {
            Some(spec) => resolve_origin(&self.network, spec)?,
            None => self.central_origin()?,
        };
        let explicit = match &variant.destinations {
            Some(ids) => Some(resolve_destinations(&self.network, ids)?),
            None => None,
        };
        let plan = EvacuationPlan::build(
            &self.network,
            origin,
            explicit.as_deref(),
            self.config.destination_quantile,
        )?;
        log::debug!(
            "variant '{}': origin {}, {} destination(s)",
            variant.name,
            plan.origin,
            plan.len()
        );
        Ok(plan)
    }

    /// Generate `round(base_population × population_multiplier)` agents.
    ///
    /// # Errors
    ///
    /// Invalid variants, unknown override nodes and unreachable
    /// destinations.  A zero-sized population still resolves the plan, so a
    /// malformed network is reported regardless of the multiplier.
    pub fn generate(&self, variant: &ScenarioVariant) -> PopulationResult<Population> {
        variant.validate()?;
        let plan = self.plan(variant)?;
        let count = variant.population_size(self.config.base_population);
        if plan.is_empty() && count > 0 {
            return Err(PopulationError::Config("no destination available".into()));
        }

        let sm = self.config.speed;
        let normal = Normal::new(sm.mean_mps, sm.std_dev_mps)
            .map_err(|e| PopulationError::Config(format!("speed distribution: {e}")))?;
        let delay = match self.config.start_delay {
            StartDelay::Exponential { mean_minutes } => Some(
                Exp::new(1.0 / mean_minutes)
                    .map_err(|e| PopulationError::Config(format!("start delay distribution: {e}")))?,
            ),
            StartDelay::Immediate => None,
        };
        let clock = SimClock::new(variant.tick_minutes);

        let mut destination = Vec::with_capacity(count);
        let mut route       = Vec::with_capacity(count);
        let mut speed_mps   = Vec::with_capacity(count);
        let mut start_tick  = Vec::with_capacity(count);

        for i in 0..count {
            let mut rng = AgentRng::new(variant.seed, AgentId(i as u32));

            let raw: f64 = rng.sample(&normal);
            speed_mps.push((raw * variant.speed_multiplier).clamp(sm.min_mps, sm.max_mps));

            let start = match &delay {
                Some(exp) => clock.tick_at_minutes(rng.sample(exp)),
                None => Tick::ZERO,
            };
            start_tick.push(start);

            let k = match self.config.assignment {
                Assignment::Uniform => rng.gen_range(0..plan.len()),
                Assignment::RoundRobin => i % plan.len(),
            };
            destination.push(plan.destinations[k]);
            route.push(Arc::clone(&plan.routes[k].edges));
        }

        Ok(Population {
            count,
            origin: plan.origin,
            plan,
            destination,
            route,
            speed_mps,
            start_tick,
        })
    }
}
