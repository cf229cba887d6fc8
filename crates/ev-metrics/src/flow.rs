//! Bottleneck and flow-pattern analysis.
//!
//! A pure aggregation pass over every agent's *full* route, evacuated or
//! not, so the ranking reflects planned demand rather than only completed
//! trips.
//!
//! Congestion tiers compare an edge's usage with the distribution of usage
//! over all edges that appear in at least one route:
//!
//! ```text
//! usage ≥ p95 → Critical      usage ≥ p75 → High
//! usage ≥ p50 → Moderate      otherwise   → Low
//! ```

use rustc_hash::FxHashMap;
use serde::Serialize;

use ev_core::EdgeId;
use ev_network::StreetNetwork;
use ev_sim::AgentRecord;

use crate::stats::percentile;
use crate::{MetricsError, MetricsResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionTier {
    Low,
    Moderate,
    High,
    Critical,
}

impl CongestionTier {
    pub fn as_str(self) -> &'static str {
        match self {
            CongestionTier::Low      => "low",
            CongestionTier::Moderate => "moderate",
            CongestionTier::High     => "high",
            CongestionTier::Critical => "critical",
        }
    }
}

impl std::fmt::Display for CongestionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the bottleneck table.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Bottleneck {
    pub edge:        EdgeId,
    /// Payload ids of the street's end nodes, in walking direction.
    pub from:        u64,
    pub to:          u64,
    pub usage_count: u64,
    pub tier:        CongestionTier,
}

/// `(bucket, count)` pair of a histogram.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Bucket {
    /// Lower bound of the bucket (ticks or hops).
    pub start: u64,
    pub count: u64,
}

/// Distributions describing how the population moved.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FlowReport {
    /// Contiguous buckets of `start_bucket_ticks` from tick 0.
    pub start_histogram:    Vec<Bucket>,
    pub start_bucket_ticks: u64,
    /// One bucket per distinct hop count, ascending.
    pub route_length_histogram: Vec<Bucket>,
    pub total_traversals: u64,
    pub distinct_edges:   usize,
}

// ── Edge usage ────────────────────────────────────────────────────────────────

/// Number of routes that contain each edge.
pub fn edge_usage(records: &[AgentRecord]) -> FxHashMap<EdgeId, u64> {
    let mut usage: FxHashMap<EdgeId, u64> = FxHashMap::default();
    for r in records {
        for &e in r.route.iter() {
            *usage.entry(e).or_insert(0) += 1;
        }
    }
    usage
}

/// Top-`k` edges by usage, ties to the lower `EdgeId`.
///
/// `records` must come from a run on `network`.
pub fn bottlenecks(network: &StreetNetwork, records: &[AgentRecord], top_k: usize) -> Vec<Bottleneck> {
    let usage = edge_usage(records);
    if usage.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut counts: Vec<f64> = usage.values().map(|&c| c as f64).collect();
    counts.sort_by(f64::total_cmp);
    let threshold = |p: f64| percentile(&counts, p).ok().flatten().unwrap_or(f64::INFINITY);
    let (p50, p75, p95) = (threshold(50.0), threshold(75.0), threshold(95.0));

    let mut ranked: Vec<(EdgeId, u64)> = usage.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(top_k);

    ranked
        .into_iter()
        .map(|(edge, usage_count)| {
            let u = usage_count as f64;
            let tier = if u >= p95 {
                CongestionTier::Critical
            } else if u >= p75 {
                CongestionTier::High
            } else if u >= p50 {
                CongestionTier::Moderate
            } else {
                CongestionTier::Low
            };
            let from = network.node_external_id[network.edge_from[edge.index()].index()];
            let to   = network.node_external_id[network.edge_to[edge.index()].index()];
            Bottleneck { edge, from, to, usage_count, tier }
        })
        .collect()
}

// ── Histograms ────────────────────────────────────────────────────────────────

/// Agents per start-tick bucket of width `bucket_ticks`, from tick 0 to the
/// latest start.  Empty buckets in between are kept.
pub fn start_time_histogram(records: &[AgentRecord], bucket_ticks: u64) -> MetricsResult<Vec<Bucket>> {
    if bucket_ticks == 0 {
        return Err(MetricsError::BucketWidth);
    }
    let Some(latest) = records.iter().map(|r| r.start_tick.0).max() else {
        return Ok(Vec::new());
    };
    let mut counts = vec![0u64; (latest / bucket_ticks) as usize + 1];
    for r in records {
        counts[(r.start_tick.0 / bucket_ticks) as usize] += 1;
    }
    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bucket { start: i as u64 * bucket_ticks, count })
        .collect())
}

/// Agents per route hop count.
pub fn route_length_histogram(records: &[AgentRecord]) -> Vec<Bucket> {
    let mut by_hops: FxHashMap<u64, u64> = FxHashMap::default();
    for r in records {
        *by_hops.entry(r.hop_count() as u64).or_insert(0) += 1;
    }
    let mut buckets: Vec<Bucket> = by_hops
        .into_iter()
        .map(|(start, count)| Bucket { start, count })
        .collect();
    buckets.sort_by_key(|b| b.start);
    buckets
}

impl FlowReport {
    pub fn from_records(records: &[AgentRecord], start_bucket_ticks: u64) -> MetricsResult<Self> {
        let usage = edge_usage(records);
        Ok(Self {
            start_histogram: start_time_histogram(records, start_bucket_ticks)?,
            start_bucket_ticks,
            route_length_histogram: route_length_histogram(records),
            total_traversals: usage.values().sum(),
            distinct_edges: usage.len(),
        })
    }
}
