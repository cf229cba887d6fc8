//! Street network representation, capacity model and builder.
//!
//! # Data layout
//!
//! The graph uses **Compressed Sparse Row (CSR)** format for outgoing edges.
//! Given a `NodeId n`, its outgoing edges occupy the slice:
//!
//! ```text
//! edge_*[ node_out_start[n] .. node_out_start[n+1] ]
//! ```
//!
//! All edge arrays are sorted by source node and indexed by `EdgeId`, so a
//! node's outgoing edges are a contiguous memory scan.
//!
//! # Capacity model
//!
//! Each directed edge carries two integer limits derived once at build time:
//!
//! ```text
//! capacity     = max(1, floor(width_m × length_m / area_per_person_m2))
//! service_rate = max(1, capacity / tick_divisor)
//! ```
//!
//! Edges without a width (synthetic and test graphs) are unconstrained:
//! both limits are `u32::MAX`.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) maps `(x, y)` to the nearest `NodeId` so an
//! origin can be given as a coordinate.

use std::collections::HashMap;

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use ev_core::{Coord, EdgeId, NodeId};

use crate::{NetworkError, NetworkResult};

/// Typical personal space allowance of a walking evacuee, m².
pub const DEFAULT_AREA_PER_PERSON_M2: f64 = 2.5;

/// Share of an edge's capacity that may discharge per tick is
/// `1 / DEFAULT_TICK_DIVISOR`.
pub const DEFAULT_TICK_DIVISOR: u32 = 4;

/// Capacity / service-rate value of an edge with no physical limit.
pub const UNCONSTRAINED: u32 = u32::MAX;

// ── Capacity model ────────────────────────────────────────────────────────────

/// Constants used to derive per-edge occupancy limits.
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CapacityModel {
    pub area_per_person_m2: f64,
    pub tick_divisor:       u32,
}

impl Default for CapacityModel {
    fn default() -> Self {
        Self {
            area_per_person_m2: DEFAULT_AREA_PER_PERSON_M2,
            tick_divisor:       DEFAULT_TICK_DIVISOR,
        }
    }
}

impl CapacityModel {
    pub fn validate(&self) -> NetworkResult<()> {
        if !self.area_per_person_m2.is_finite() || self.area_per_person_m2 <= 0.0 {
            return Err(NetworkError::InvalidGraph(format!(
                "area_per_person_m2 must be positive, got {}",
                self.area_per_person_m2
            )));
        }
        if self.tick_divisor == 0 {
            return Err(NetworkError::InvalidGraph("tick_divisor must be positive".into()));
        }
        Ok(())
    }

    /// Maximum simultaneous occupants of a `width_m × length_m` segment.
    pub fn capacity(&self, width_m: f64, length_m: f64) -> u32 {
        let people = (width_m * length_m / self.area_per_person_m2).floor();
        if people >= UNCONSTRAINED as f64 {
            UNCONSTRAINED - 1
        } else {
            (people as u32).max(1)
        }
    }

    /// Maximum exits per tick for an edge of the given capacity.
    pub fn service_rate(&self, capacity: u32) -> u32 {
        if capacity == UNCONSTRAINED {
            return UNCONSTRAINED;
        }
        (capacity / self.tick_divisor.max(1)).max(1)
    }
}

// ── R-tree node entry ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct NodeEntry {
    point: [f64; 2],
    id:    NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ── StreetNetwork ─────────────────────────────────────────────────────────────

/// Directed street graph in CSR format with per-edge occupancy limits.
///
/// Immutable once built.  Concurrent scenario runs share one instance
/// behind an `Arc`; nothing in it is ever mutated during simulation.
///
/// All fields are `pub` for direct indexed access on hot paths.  Construct
/// with [`StreetNetworkBuilder`] or [`StreetNetwork::from_payload`].
pub struct StreetNetwork {
    // ── Node data ─────────────────────────────────────────────────────────
    /// Projected position of each node.  Indexed by `NodeId`.
    pub node_pos: Vec<Coord>,

    /// Identifier of each node in the originating payload.
    pub node_external_id: Vec<u64>,

    // ── CSR edge adjacency ────────────────────────────────────────────────
    /// Outgoing edges of node `n` are `node_out_start[n] .. node_out_start[n+1]`.
    /// Length = `node_count + 1`.
    pub node_out_start: Vec<u32>,

    // ── Edge data (indexed by EdgeId = position in sorted order) ──────────
    pub edge_from: Vec<NodeId>,
    pub edge_to:   Vec<NodeId>,

    /// Physical length in metres.  Always finite and positive.
    pub edge_length_m: Vec<f64>,

    /// Integer routing cost (length in millimetres, at least 1).  Keeps
    /// shortest-path tie detection exact.
    pub edge_cost_mm: Vec<u64>,

    /// Maximum simultaneous occupants.
    pub edge_capacity: Vec<u32>,

    /// Maximum exits per tick.  `1 <= service_rate <= capacity`.
    pub edge_service_rate: Vec<u32>,

    external_index: HashMap<u64, NodeId>,
    spatial_idx:    RTree<NodeEntry>,
}

impl StreetNetwork {
    // ── Graph dimensions ──────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_pos.is_empty()
    }

    /// Iterator over every `NodeId` in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.node_count() as u32).map(NodeId)
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        node.index() < self.node_count()
    }

    // ── Graph traversal ───────────────────────────────────────────────────

    /// Contiguous range of `node`'s outgoing `EdgeId`s.
    #[inline]
    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        (start..end).map(|i| EdgeId(i as u32))
    }

    #[inline]
    pub fn out_degree(&self, node: NodeId) -> usize {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        end - start
    }

    // ── Edge limits ───────────────────────────────────────────────────────

    #[inline]
    pub fn capacity(&self, edge: EdgeId) -> u32 {
        self.edge_capacity[edge.index()]
    }

    #[inline]
    pub fn service_rate(&self, edge: EdgeId) -> u32 {
        self.edge_service_rate[edge.index()]
    }

    #[inline]
    pub fn is_unconstrained(&self, edge: EdgeId) -> bool {
        self.edge_capacity[edge.index()] == UNCONSTRAINED
    }

    // ── Lookups ───────────────────────────────────────────────────────────

    /// Dense `NodeId` of a payload node id.
    pub fn node_by_external_id(&self, external: u64) -> Option<NodeId> {
        self.external_index.get(&external).copied()
    }

    /// [`node_by_external_id`](Self::node_by_external_id), failing with
    /// [`NetworkError::UnknownNode`].
    pub fn resolve_external(&self, external: u64) -> NetworkResult<NodeId> {
        self.node_by_external_id(external).ok_or(NetworkError::UnknownNode(external))
    }

    /// Nearest node to `pos`.  `None` only for an empty network.
    pub fn nearest_node(&self, pos: Coord) -> Option<NodeId> {
        self.spatial_idx
            .nearest_neighbor(&[pos.x, pos.y])
            .map(|e| e.id)
    }
}

// ── StreetNetworkBuilder ──────────────────────────────────────────────────────

/// Construct a [`StreetNetwork`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use ev_core::Coord;
/// use ev_network::StreetNetworkBuilder;
///
/// let mut b = StreetNetworkBuilder::default();
/// let a = b.add_node(Coord::new(0.0, 0.0));
/// let c = b.add_node(Coord::new(100.0, 0.0));
/// b.add_street(a, c, 100.0, Some(5.0)); // 100 m long, 5 m wide
/// let net = b.build().unwrap();
/// assert_eq!(net.edge_count(), 2); // bidirectional
/// assert_eq!(net.edge_capacity[0], 200);
/// ```
pub struct StreetNetworkBuilder {
    model:     CapacityModel,
    nodes:     Vec<Coord>,
    external:  Vec<u64>,
    raw_edges: Vec<RawEdge>,
}

struct RawEdge {
    from:     NodeId,
    to:       NodeId,
    length_m: f64,
    limits:   RawLimits,
}

enum RawLimits {
    Width(Option<f64>),
    Explicit { capacity: u32, service_rate: u32 },
}

impl StreetNetworkBuilder {
    pub fn new(model: CapacityModel) -> Self {
        Self { model, nodes: Vec::new(), external: Vec::new(), raw_edges: Vec::new() }
    }

    pub fn with_capacity(model: CapacityModel, nodes: usize, edges: usize) -> Self {
        Self {
            model,
            nodes:     Vec::with_capacity(nodes),
            external:  Vec::with_capacity(nodes),
            raw_edges: Vec::with_capacity(edges),
        }
    }

    /// Add a node and return its `NodeId` (sequential from 0).  The external
    /// id defaults to the dense index.
    pub fn add_node(&mut self, pos: Coord) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.add_node_with_external_id(pos, id.0 as u64)
    }

    pub fn add_node_with_external_id(&mut self, pos: Coord, external: u64) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(pos);
        self.external.push(external);
        id
    }

    /// Add a **directed** street segment.  `width_m = None` makes it
    /// unconstrained.
    pub fn add_directed_street(&mut self, from: NodeId, to: NodeId, length_m: f64, width_m: Option<f64>) {
        self.raw_edges.push(RawEdge { from, to, length_m, limits: RawLimits::Width(width_m) });
    }

    /// Add a segment walkable in **both directions**; each direction gets
    /// its own occupancy limits.
    pub fn add_street(&mut self, a: NodeId, b: NodeId, length_m: f64, width_m: Option<f64>) {
        self.add_directed_street(a, b, length_m, width_m);
        self.add_directed_street(b, a, length_m, width_m);
    }

    /// Add a directed edge with explicit limits, bypassing the width model.
    pub fn add_directed_edge_with_limits(
        &mut self,
        from:         NodeId,
        to:           NodeId,
        length_m:     f64,
        capacity:     u32,
        service_rate: u32,
    ) {
        self.raw_edges.push(RawEdge {
            from,
            to,
            length_m,
            limits: RawLimits::Explicit { capacity, service_rate },
        });
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.raw_edges.len() }

    /// Validate every node and edge, derive limits and produce the network.
    ///
    /// # Errors
    ///
    /// [`NetworkError::InvalidGraph`] for an empty graph, a graph without
    /// edges, non-finite coordinates, dangling endpoints, self loops,
    /// non-positive lengths or widths, duplicate external ids, and explicit
    /// limits violating `1 <= service_rate <= capacity`.
    pub fn build(self) -> NetworkResult<StreetNetwork> {
        self.model.validate()?;

        let node_count = self.nodes.len();
        if node_count == 0 {
            return Err(NetworkError::InvalidGraph("network has no nodes".into()));
        }
        if self.raw_edges.is_empty() {
            return Err(NetworkError::InvalidGraph("network has no edges".into()));
        }
        if let Some((i, p)) = self.nodes.iter().enumerate().find(|(_, p)| !p.is_finite()) {
            return Err(NetworkError::InvalidGraph(format!(
                "node {} has non-finite position {p}",
                NodeId(i as u32)
            )));
        }

        let mut external_index = HashMap::with_capacity(node_count);
        for (i, &ext) in self.external.iter().enumerate() {
            if external_index.insert(ext, NodeId(i as u32)).is_some() {
                return Err(NetworkError::InvalidGraph(format!("duplicate node id {ext}")));
            }
        }

        let mut raw = self.raw_edges;
        for e in &raw {
            validate_edge(e, node_count)?;
        }

        // Stable sort keeps insertion order among a node's edges.
        raw.sort_by_key(|e| e.from.0);

        let model = self.model;
        let edge_count = raw.len();
        let mut edge_from         = Vec::with_capacity(edge_count);
        let mut edge_to           = Vec::with_capacity(edge_count);
        let mut edge_length_m     = Vec::with_capacity(edge_count);
        let mut edge_cost_mm      = Vec::with_capacity(edge_count);
        let mut edge_capacity     = Vec::with_capacity(edge_count);
        let mut edge_service_rate = Vec::with_capacity(edge_count);

        for e in &raw {
            let (capacity, service_rate) = match e.limits {
                RawLimits::Width(Some(w)) => {
                    let c = model.capacity(w, e.length_m);
                    (c, model.service_rate(c))
                }
                RawLimits::Width(None) => (UNCONSTRAINED, UNCONSTRAINED),
                RawLimits::Explicit { capacity, service_rate } => (capacity, service_rate),
            };
            edge_from.push(e.from);
            edge_to.push(e.to);
            edge_length_m.push(e.length_m);
            edge_cost_mm.push(((e.length_m * 1000.0).round() as u64).max(1));
            edge_capacity.push(capacity);
            edge_service_rate.push(service_rate);
        }

        let mut node_out_start = vec![0u32; node_count + 1];
        for e in &raw {
            node_out_start[e.from.index() + 1] += 1;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }
        debug_assert_eq!(node_out_start[node_count] as usize, edge_count);

        let entries: Vec<NodeEntry> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, p)| NodeEntry { point: [p.x, p.y], id: NodeId(i as u32) })
            .collect();
        let spatial_idx = RTree::bulk_load(entries);

        Ok(StreetNetwork {
            node_pos: self.nodes,
            node_external_id: self.external,
            node_out_start,
            edge_from,
            edge_to,
            edge_length_m,
            edge_cost_mm,
            edge_capacity,
            edge_service_rate,
            external_index,
            spatial_idx,
        })
    }
}

impl Default for StreetNetworkBuilder {
    fn default() -> Self {
        Self::new(CapacityModel::default())
    }
}

fn validate_edge(e: &RawEdge, node_count: usize) -> NetworkResult<()> {
    let invalid = |msg: String| Err(NetworkError::InvalidGraph(msg));

    if e.from.index() >= node_count || e.to.index() >= node_count {
        return invalid(format!("edge {} -> {} references a missing node", e.from, e.to));
    }
    if e.from == e.to {
        return invalid(format!("self loop at {}", e.from));
    }
    if !e.length_m.is_finite() || e.length_m <= 0.0 {
        return invalid(format!(
            "edge {} -> {} has non-positive length {}",
            e.from, e.to, e.length_m
        ));
    }
    match e.limits {
        RawLimits::Width(Some(w)) if !w.is_finite() || w <= 0.0 => invalid(format!(
            "edge {} -> {} has non-positive width {w}",
            e.from, e.to
        )),
        RawLimits::Explicit { capacity, service_rate }
            if capacity == 0 || service_rate == 0 || service_rate > capacity =>
        {
            invalid(format!(
                "edge {} -> {} limits violate 1 <= service_rate ({service_rate}) <= capacity ({capacity})",
                e.from, e.to
            ))
        }
        _ => Ok(()),
    }
}
