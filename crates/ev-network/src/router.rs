//! Shortest paths by edge length.
//!
//! # Determinism
//!
//! Costs are integer millimetres (`StreetNetwork::edge_cost_mm`), so equal
//! path lengths compare exactly.  The heap is ordered by `(cost, NodeId)`
//! and, between two equally short ways of reaching a node, the one whose
//! final edge has the lower `EdgeId` wins.  The same network therefore
//! always yields the same routes, independent of platform.
//!
//! Every agent of a scenario shares one origin, so the population generator
//! builds a single [`ShortestPathTree`] from the origin and extracts one
//! route per destination from it.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use ev_core::{EdgeId, NodeId};

use crate::network::StreetNetwork;
use crate::{NetworkError, NetworkResult};

// ── Route ─────────────────────────────────────────────────────────────────────

/// An ordered list of edges from an origin to a destination.
///
/// The edge list is reference-counted: every agent heading to the same
/// destination shares one allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub edges:    Arc<[EdgeId]>,
    pub length_m: f64,
}

impl Route {
    /// Number of edges (hops).
    #[inline]
    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }

    /// `true` if origin and destination coincide.
    pub fn is_trivial(&self) -> bool {
        self.edges.is_empty()
    }
}

// ── ShortestPathTree ──────────────────────────────────────────────────────────

/// Single-source shortest-path tree over the whole network.
pub struct ShortestPathTree {
    pub source: NodeId,
    /// Best cost in millimetres; `u64::MAX` for unreachable nodes.
    pub dist_mm: Vec<u64>,
    /// Edge through which each node is reached; `EdgeId::INVALID` for the
    /// source and unreachable nodes.
    pub prev_edge: Vec<EdgeId>,
}

impl ShortestPathTree {
    /// Run Dijkstra from `source` to exhaustion.
    pub fn build(network: &StreetNetwork, source: NodeId) -> NetworkResult<Self> {
        if !network.contains_node(source) {
            return Err(NetworkError::NodeNotFound(source));
        }
        let (dist_mm, prev_edge) = dijkstra(network, source);
        Ok(Self { source, dist_mm, prev_edge })
    }

    #[inline]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.dist_mm.get(node.index()).is_some_and(|&d| d != u64::MAX)
    }

    /// Shortest distance in metres, `None` if unreachable.
    pub fn distance_m(&self, node: NodeId) -> Option<f64> {
        self.is_reachable(node)
            .then(|| self.dist_mm[node.index()] as f64 / 1000.0)
    }

    /// Reconstruct the route to `to`.
    pub fn route_to(&self, network: &StreetNetwork, to: NodeId) -> NetworkResult<Route> {
        if !self.is_reachable(to) {
            return Err(NetworkError::NoRoute { from: self.source, to });
        }
        Ok(reconstruct(network, &self.prev_edge, to))
    }
}

// ── Dijkstra internals ────────────────────────────────────────────────────────

fn dijkstra(network: &StreetNetwork, from: NodeId) -> (Vec<u64>, Vec<EdgeId>) {
    let n = network.node_count();
    let mut dist      = vec![u64::MAX; n];
    let mut prev_edge = vec![EdgeId::INVALID; n];
    let mut settled   = vec![false; n];

    dist[from.index()] = 0;

    // Reverse turns the max-heap into a min-heap; NodeId breaks cost ties.
    let mut heap: BinaryHeap<Reverse<(u64, NodeId)>> = BinaryHeap::new();
    heap.push(Reverse((0, from)));

    while let Some(Reverse((cost, node))) = heap.pop() {
        if settled[node.index()] || cost > dist[node.index()] {
            continue;
        }
        settled[node.index()] = true;

        for edge in network.out_edges(node) {
            let neighbor = network.edge_to[edge.index()];
            if settled[neighbor.index()] {
                continue;
            }
            let new_cost = cost.saturating_add(network.edge_cost_mm[edge.index()]);
            let best = dist[neighbor.index()];

            if new_cost < best {
                dist[neighbor.index()] = new_cost;
                prev_edge[neighbor.index()] = edge;
                heap.push(Reverse((new_cost, neighbor)));
            } else if new_cost == best && edge < prev_edge[neighbor.index()] {
                prev_edge[neighbor.index()] = edge;
            }
        }
    }

    (dist, prev_edge)
}

fn reconstruct(network: &StreetNetwork, prev_edge: &[EdgeId], to: NodeId) -> Route {
    let mut edges = Vec::new();
    let mut length_m = 0.0;
    let mut cur = to;
    loop {
        let e = prev_edge[cur.index()];
        if e == EdgeId::INVALID {
            break;
        }
        edges.push(e);
        length_m += network.edge_length_m[e.index()];
        cur = network.edge_from[e.index()];
    }
    edges.reverse();
    Route { edges: edges.into(), length_m }
}
