//! `ev-metrics` — post-run analysis of evacuation outcomes.
//!
//! Both analyzers are pure functions of a [`SimOutcome`][ev_sim::SimOutcome]
//! and always see the full per-agent record set, never a rendering sample.
//!
//! | Module     | Contents                                                     |
//! |------------|--------------------------------------------------------------|
//! | [`stats`]  | Linear-interpolation percentiles, mean, std-dev, CV          |
//! | [`report`] | `MetricsReport`: clearance, fairness, robustness, queues     |
//! | [`flow`]   | Bottleneck ranking with congestion tiers, flow histograms    |
//! | [`error`]  | `MetricsError`, `MetricsResult<T>`                           |

pub mod error;
pub mod flow;
pub mod report;
pub mod stats;


pub use error::{MetricsError, MetricsResult};
pub use flow::{
    Bottleneck, Bucket, CongestionTier, FlowReport, bottlenecks, edge_usage, route_length_histogram,
    start_time_histogram,
};
pub use report::{MetricFlag, MetricsReport};
pub use stats::{coefficient_of_variation, mean, percentile, std_dev};
