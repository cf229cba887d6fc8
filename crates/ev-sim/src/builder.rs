//! Fluent builder for constructing a [`Sim`].

use std::sync::Arc;

use ev_core::{AgentId, SimConfig};
use ev_network::StreetNetwork;
use ev_population::Population;

use crate::state::{AgentState, SimulationState};
use crate::{CancelToken, Sim, SimError, SimResult};

/// Fluent builder for [`Sim`].
///
/// # Required inputs
///
/// - [`SimConfig`] — tick length, horizon, seed
/// - `Arc<StreetNetwork>` — shared, read-only
/// - [`Population`] — from [`ev_population::PopulationGenerator`]
///
/// # Optional inputs
///
/// | Method             | Default                                   |
/// |--------------------|-------------------------------------------|
/// | `.cancel_token(t)` | A fresh, never-set token                  |
/// | `.parallel(b)`     | `true` when built with `parallel` feature |
///
/// # Example
///
/// ```rust,ignore
/// let population = generator.generate(&variant)?;
/// let mut sim = SimBuilder::new(variant.sim_config(), network, population)
///     .cancel_token(token.clone())
///     .build()?;
/// sim.run(&mut NoopObserver);
/// let outcome = sim.into_outcome();
/// ```
pub struct SimBuilder {
    config:     SimConfig,
    network:    Arc<StreetNetwork>,
    population: Population,
    cancel:     Option<CancelToken>,
    parallel:   bool,
}

impl SimBuilder {
    pub fn new(config: SimConfig, network: Arc<StreetNetwork>, population: Population) -> Self {
        Self { config, network, population, cancel: None, parallel: cfg!(feature = "parallel") }
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Run the progress phase on Rayon.  Ignored without the `parallel`
    /// feature.
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled && cfg!(feature = "parallel");
        self
    }

    /// Validate inputs and return a ready-to-run [`Sim`].
    ///
    /// Every route must start at the population origin, be a connected
    /// chain of existing edges and end at the agent's destination.
    pub fn build(self) -> SimResult<Sim> {
        if self.config.tick_minutes == 0 {
            return Err(SimError::Config("tick_minutes must be positive".into()));
        }
        if self.config.horizon_ticks == 0 {
            return Err(SimError::Config("horizon must be at least one tick".into()));
        }

        let pop = &self.population;
        let n = pop.count;
        for (what, got) in [
            ("destinations", pop.destination.len()),
            ("routes", pop.route.len()),
            ("speeds", pop.speed_mps.len()),
            ("start ticks", pop.start_tick.len()),
        ] {
            if got != n {
                return Err(SimError::AgentCountMismatch { expected: n, got, what });
            }
        }

        for agent in pop.agent_ids() {
            validate_agent(&self.network, pop, agent)?;
        }

        // Activation order: (start tick, AgentId).
        let mut pending: Vec<AgentId> = pop.agent_ids().collect();
        pending.sort_by_key(|a| (pop.start_tick[a.index()], *a));

        Ok(Sim {
            clock:        self.config.make_clock(),
            config:       self.config,
            state:        SimulationState::new(self.network.edge_count()),
            agents:       vec![AgentState::default(); n],
            network:      self.network,
            population:   self.population,
            pending,
            next_pending: 0,
            active:       Vec::new(),
            timeline:     Vec::new(),
            termination:  None,
            cancel:       self.cancel.unwrap_or_default(),
            parallel:     self.parallel,
        })
    }
}

fn validate_agent(net: &StreetNetwork, pop: &Population, agent: AgentId) -> SimResult<()> {
    let invalid = |reason: String| Err(SimError::InvalidRoute { agent, reason });
    let i = agent.index();

    let speed = pop.speed_mps[i];
    if !speed.is_finite() || speed <= 0.0 {
        return invalid(format!("speed {speed} m/s is not positive"));
    }

    let mut at = pop.origin;
    for &e in pop.route[i].iter() {
        if e.index() >= net.edge_count() {
            return invalid(format!("{e} does not exist"));
        }
        if net.edge_from[e.index()] != at {
            return invalid(format!("{e} does not start at {at}"));
        }
        at = net.edge_to[e.index()];
    }
    if at != pop.destination[i] {
        return invalid(format!("route ends at {at}, destination is {}", pop.destination[i]));
    }
    Ok(())
}
