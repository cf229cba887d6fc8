//! Network-model error type.

use thiserror::Error;

use ev_core::NodeId;

/// Errors produced by `ev-network`.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The graph description cannot be turned into a usable network.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("no route from {from} to {to}")]
    NoRoute { from: NodeId, to: NodeId },

    #[error("node {0} not found in network")]
    NodeNotFound(NodeId),

    /// A payload node id the network was not built with.
    #[error("payload node {0} not found in network")]
    UnknownNode(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV payload error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON payload error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type NetworkResult<T> = Result<T, NetworkError>;
