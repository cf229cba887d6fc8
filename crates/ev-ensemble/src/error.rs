//! Ensemble error type.
//!
//! Only batch-level problems surface here.  Anything that goes wrong inside
//! one variant becomes a [`VariantFailure`][crate::VariantFailure] in the
//! report instead.

use thiserror::Error;

use ev_network::NetworkError;
use ev_population::PopulationError;

#[derive(Debug, Error)]
pub enum EnsembleError {
    #[error("invalid ensemble config: {0}")]
    Config(String),

    #[error("cannot start worker pool: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Population(#[from] PopulationError),

    /// The shared network could not be built from its payload.
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON config error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EnsembleResult<T> = Result<T, EnsembleError>;
