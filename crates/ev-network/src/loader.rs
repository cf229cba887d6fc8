//! Graph payload loading.
//!
//! The external network provider delivers nodes `{id, x, y}` and edges
//! `{from, to, length_m, width_m}`.  Two encodings are accepted:
//!
//! **JSON** — one document:
//!
//! ```json
//! { "nodes": [{"id": 10, "x": 0.0, "y": 0.0}, …],
//!   "edges": [{"from": 10, "to": 11, "length_m": 84.2, "width_m": 6.0}, …] }
//! ```
//!
//! **CSV** — two files:
//!
//! ```csv
//! id,x,y
//! 10,0.0,0.0
//! ```
//!
//! ```csv
//! from,to,length_m,width_m,one_way
//! 10,11,84.2,6.0,false
//! 11,12,40.0,,
//! ```
//!
//! An empty `width_m` marks an unconstrained (synthetic) edge.  Edges are
//! walkable both ways unless `one_way` is `true`.  `capacity` and
//! `service_rate` columns/fields optionally override the width model.
//!
//! Payload node ids are arbitrary `u64`s; they are remapped to dense
//! `NodeId`s in payload order.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use ev_core::{Coord, NodeId};

use crate::network::{CapacityModel, StreetNetwork, StreetNetworkBuilder};
use crate::{NetworkError, NetworkResult};

// ── Payload records ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: u64,
    pub x:  f64,
    pub y:  f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from:     u64,
    pub to:       u64,
    pub length_m: f64,
    #[serde(default)]
    pub width_m:  Option<f64>,
    #[serde(default)]
    pub one_way:  Option<bool>,
    #[serde(default)]
    pub capacity:     Option<u32>,
    #[serde(default)]
    pub service_rate: Option<u32>,
}

/// Raw graph description as handed over by the network provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

impl GraphPayload {
    pub fn from_json_str(s: &str) -> NetworkResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> NetworkResult<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json_path(path: &Path) -> NetworkResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_json_reader(std::io::BufReader::new(file))
    }

    /// Parse a node CSV and an edge CSV (see module docs for headers).
    pub fn from_csv_readers<N: Read, E: Read>(nodes: N, edges: E) -> NetworkResult<Self> {
        let mut node_reader = csv::Reader::from_reader(nodes);
        let nodes = node_reader
            .deserialize::<NodeRecord>()
            .collect::<Result<Vec<_>, _>>()?;

        let mut edge_reader = csv::Reader::from_reader(edges);
        let edges = edge_reader
            .deserialize::<EdgeRecord>()
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { nodes, edges })
    }

    pub fn from_csv_paths(nodes: &Path, edges: &Path) -> NetworkResult<Self> {
        let n = std::fs::File::open(nodes)?;
        let e = std::fs::File::open(edges)?;
        Self::from_csv_readers(n, e)
    }
}

// ── Payload → StreetNetwork ───────────────────────────────────────────────────

impl StreetNetwork {
    /// Build a network from a provider payload.
    ///
    /// # Errors
    ///
    /// [`NetworkError::InvalidGraph`] for unknown edge endpoints, a single
    /// explicit limit without the other, and everything
    /// [`StreetNetworkBuilder::build`] rejects.
    pub fn from_payload(payload: &GraphPayload, model: CapacityModel) -> NetworkResult<Self> {
        let mut b = StreetNetworkBuilder::with_capacity(
            model,
            payload.nodes.len(),
            payload.edges.len() * 2,
        );

        let mut index: HashMap<u64, NodeId> = HashMap::with_capacity(payload.nodes.len());
        for n in &payload.nodes {
            let id = b.add_node_with_external_id(Coord::new(n.x, n.y), n.id);
            // Duplicates are reported by `build`.
            index.entry(n.id).or_insert(id);
        }

        let lookup = |ext: u64| {
            index.get(&ext).copied().ok_or_else(|| {
                NetworkError::InvalidGraph(format!("edge references unknown node id {ext}"))
            })
        };

        for e in &payload.edges {
            let from = lookup(e.from)?;
            let to   = lookup(e.to)?;
            let one_way = e.one_way.unwrap_or(false);
            match (e.capacity, e.service_rate) {
                (Some(capacity), Some(service_rate)) => {
                    b.add_directed_edge_with_limits(from, to, e.length_m, capacity, service_rate);
                    if !one_way {
                        b.add_directed_edge_with_limits(to, from, e.length_m, capacity, service_rate);
                    }
                }
                (None, None) => {
                    if one_way {
                        b.add_directed_street(from, to, e.length_m, e.width_m);
                    } else {
                        b.add_street(from, to, e.length_m, e.width_m);
                    }
                }
                _ => {
                    return Err(NetworkError::InvalidGraph(format!(
                        "edge {} -> {} must give both capacity and service_rate or neither",
                        e.from, e.to
                    )));
                }
            }
        }

        let network = b.build()?;
        log::debug!(
            "street network built: {} nodes, {} directed edges",
            network.node_count(),
            network.edge_count()
        );
        Ok(network)
    }
}
