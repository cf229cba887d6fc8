//! Betweenness centrality (Brandes, length-weighted) used to place the
//! evacuating population.
//!
//! Exact centrality costs one Dijkstra per node.  For networks larger than
//! the configured sample size, `k` source nodes are drawn with a fixed seed
//! and their dependencies are scaled by `n / k` (Brandes & Pich 2007).  The
//! result is an estimate, but a reproducible one: the same network, sample
//! size and seed always pick the same sources and the accumulation order is
//! ascending `NodeId`.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ev_core::{NodeId, SimRng};

use crate::network::StreetNetwork;

/// Default number of source nodes sampled on large networks.
pub const DEFAULT_SAMPLE_SIZE: usize = 256;

/// Betweenness score of every node (indexed by `NodeId`).
pub fn betweenness(network: &StreetNetwork, sample_size: usize, seed: u64) -> Vec<f64> {
    let n = network.node_count();
    let mut score = vec![0.0_f64; n];
    if n == 0 {
        return score;
    }

    let sources: Vec<NodeId> = if sample_size == 0 || sample_size >= n {
        network.node_ids().collect()
    } else {
        let all: Vec<NodeId> = network.node_ids().collect();
        let mut picked = SimRng::new(seed).choose_multiple(&all, sample_size);
        picked.sort_unstable();
        picked
    };
    let scale = n as f64 / sources.len() as f64;

    let mut scratch = Scratch::new(n);
    for &s in &sources {
        scratch.accumulate(network, s, &mut score);
    }
    if scale != 1.0 {
        score.iter_mut().for_each(|v| *v *= scale);
    }
    score
}

/// Node with the highest betweenness; ties go to the lowest `NodeId`.
pub fn most_central_node(network: &StreetNetwork, sample_size: usize, seed: u64) -> Option<NodeId> {
    let score = betweenness(network, sample_size, seed);
    let mut best: Option<(NodeId, f64)> = None;
    for (i, &v) in score.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((NodeId(i as u32), v)),
        }
    }
    best.map(|(id, _)| id)
}

// ── Brandes single-source pass ────────────────────────────────────────────────

/// Buffers reused across source iterations.
struct Scratch {
    dist:    Vec<u64>,
    settled: Vec<bool>,
    sigma:   Vec<f64>,
    delta:   Vec<f64>,
    preds:   Vec<Vec<NodeId>>,
    order:   Vec<NodeId>,
}

impl Scratch {
    fn new(n: usize) -> Self {
        Self {
            dist:    vec![u64::MAX; n],
            settled: vec![false; n],
            sigma:   vec![0.0; n],
            delta:   vec![0.0; n],
            preds:   vec![Vec::new(); n],
            order:   Vec::with_capacity(n),
        }
    }

    fn reset(&mut self) {
        self.dist.fill(u64::MAX);
        self.settled.fill(false);
        self.sigma.fill(0.0);
        self.delta.fill(0.0);
        self.preds.iter_mut().for_each(Vec::clear);
        self.order.clear();
    }

    fn accumulate(&mut self, network: &StreetNetwork, s: NodeId, score: &mut [f64]) {
        self.reset();
        self.dist[s.index()] = 0;
        self.sigma[s.index()] = 1.0;

        let mut heap: BinaryHeap<Reverse<(u64, NodeId)>> = BinaryHeap::new();
        heap.push(Reverse((0, s)));

        // Settle nodes in non-decreasing distance, counting shortest paths.
        while let Some(Reverse((d, v))) = heap.pop() {
            if d > self.dist[v.index()] || self.settled[v.index()] {
                continue;
            }
            self.settled[v.index()] = true;
            self.order.push(v);

            for edge in network.out_edges(v) {
                let w = network.edge_to[edge.index()];
                let alt = d.saturating_add(network.edge_cost_mm[edge.index()]);
                let dw = self.dist[w.index()];
                if alt < dw {
                    self.dist[w.index()] = alt;
                    self.sigma[w.index()] = self.sigma[v.index()];
                    self.preds[w.index()].clear();
                    self.preds[w.index()].push(v);
                    heap.push(Reverse((alt, w)));
                } else if alt == dw {
                    self.sigma[w.index()] += self.sigma[v.index()];
                    self.preds[w.index()].push(v);
                }
            }
        }

        // Back-propagate dependencies in reverse settle order.
        while let Some(w) = self.order.pop() {
            let coeff = (1.0 + self.delta[w.index()]) / self.sigma[w.index()];
            for &v in &self.preds[w.index()] {
                self.delta[v.index()] += self.sigma[v.index()] * coeff;
            }
            if w != s {
                score[w.index()] += self.delta[w.index()];
            }
        }
    }
}
