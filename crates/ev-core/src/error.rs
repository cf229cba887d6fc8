//! Base error type.
//!
//! Sub-crates define their own enums and wrap `EvError` via `#[from]` where
//! a core failure can surface through them.

use thiserror::Error;

/// Errors raised by `ev-core` primitives.
#[derive(Debug, Error)]
pub enum EvError {
    /// A scenario variant failed validation before simulation started.
    #[error("invalid scenario {variant:?}: {reason}")]
    InvalidScenario { variant: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for `ev-core`.
pub type EvResult<T> = Result<T, EvError>;
