//! Evacuation plan: one origin, its boundary destinations and the shortest
//! route to each.
//!
//! The plan is shared by every agent of a variant.  Routes are computed once
//! per destination from a single shortest-path tree rooted at the origin.

use ev_core::{NodeId, OriginSpec};
use ev_network::{NetworkError, Route, ShortestPathTree, StreetNetwork};

use crate::{PopulationError, PopulationResult};

#[derive(Clone, Debug)]
pub struct EvacuationPlan {
    pub origin: NodeId,
    /// Boundary nodes in ascending `NodeId` order.
    pub destinations: Vec<NodeId>,
    /// `routes[i]` leads from `origin` to `destinations[i]`.
    pub routes: Vec<Route>,
}

impl EvacuationPlan {
    /// Build a plan from a resolved origin.
    ///
    /// With `explicit` set, exactly those nodes become destinations.
    /// Otherwise the `quantile` most distant non-origin nodes are used;
    /// unreachable nodes count as infinitely distant, so a disconnected
    /// network always surfaces here rather than mid-simulation.
    ///
    /// # Errors
    ///
    /// [`PopulationError::UnreachableDestination`] if any selected
    /// destination has no path from `origin`.
    pub fn build(
        network:  &StreetNetwork,
        origin:   NodeId,
        explicit: Option<&[NodeId]>,
        quantile: f64,
    ) -> PopulationResult<Self> {
        let tree = ShortestPathTree::build(network, origin)?;

        let mut destinations = match explicit {
            Some(nodes) => {
                for &n in nodes {
                    if !network.contains_node(n) {
                        return Err(NetworkError::NodeNotFound(n).into());
                    }
                }
                nodes.to_vec()
            }
            None => most_distant(&tree, network, origin, quantile),
        };
        destinations.sort_unstable();
        destinations.dedup();

        let mut routes = Vec::with_capacity(destinations.len());
        for &d in &destinations {
            if !tree.is_reachable(d) {
                return Err(PopulationError::UnreachableDestination { origin, destination: d });
            }
            routes.push(tree.route_to(network, d)?);
        }

        Ok(Self { origin, destinations, routes })
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}

/// Top `ceil(q × (n − 1))` nodes by distance (at least one), excluding the
/// origin.  Equal distances rank the lower `NodeId` first.
fn most_distant(tree: &ShortestPathTree, network: &StreetNetwork, origin: NodeId, q: f64) -> Vec<NodeId> {
    let mut candidates: Vec<NodeId> = network.node_ids().filter(|&n| n != origin).collect();
    // dist_mm is u64::MAX for unreachable nodes, which sorts them first.
    candidates.sort_by(|a, b| {
        tree.dist_mm[b.index()]
            .cmp(&tree.dist_mm[a.index()])
            .then(a.cmp(b))
    });
    let take = ((candidates.len() as f64 * q).ceil() as usize).clamp(1, candidates.len().max(1));
    candidates.truncate(take);
    candidates
}

/// Resolve a variant's origin override against the network.
///
/// `None` means "use the most central node"; the caller supplies it.
pub fn resolve_origin(network: &StreetNetwork, spec: &OriginSpec) -> PopulationResult<NodeId> {
    match spec {
        OriginSpec::Node(external) => Ok(network.resolve_external(*external)?),
        OriginSpec::Near(c) => network
            .nearest_node(*c)
            .ok_or_else(|| NetworkError::InvalidGraph("network has no nodes".into()).into()),
    }
}

/// Map a variant's payload destination ids to dense `NodeId`s.
pub fn resolve_destinations(network: &StreetNetwork, external: &[u64]) -> PopulationResult<Vec<NodeId>> {
    external
        .iter()
        .map(|&id| network.resolve_external(id).map_err(Into::into))
        .collect()
}
