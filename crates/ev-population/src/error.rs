//! Population-generation error type.

use thiserror::Error;

use ev_core::{EvError, NodeId};
use ev_network::NetworkError;

#[derive(Debug, Error)]
pub enum PopulationError {
    /// A boundary destination cannot be reached from the origin.  Fatal for
    /// the whole variant: it means the network is malformed.
    #[error("destination {destination} is unreachable from origin {origin}")]
    UnreachableDestination { origin: NodeId, destination: NodeId },

    #[error("invalid population config: {0}")]
    Config(String),

    #[error(transparent)]
    Scenario(#[from] EvError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

pub type PopulationResult<T> = Result<T, PopulationError>;
