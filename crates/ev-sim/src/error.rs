use thiserror::Error;

use ev_core::AgentId;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    #[error("{what} length {got} does not match agent count {expected}")]
    AgentCountMismatch {
        expected: usize,
        got:      usize,
        what:     &'static str,
    },

    #[error("agent {agent} has an invalid route: {reason}")]
    InvalidRoute { agent: AgentId, reason: String },
}

pub type SimResult<T> = Result<T, SimError>;
