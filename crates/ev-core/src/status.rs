//! Agent lifecycle status shared by the stepper, metrics and reporting.
//!
//! ```text
//! Waiting ──▶ Moving ◀──▶ Queued
//!                │            │
//!                └──▶ Evacuated ◀┘   (terminal)
//! ```

/// Where an agent is in its evacuation lifecycle.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AgentStatus {
    /// Start tick not reached yet.
    #[default]
    Waiting,
    /// At the origin or walking along an edge.
    Moving,
    /// Waiting in an edge's FIFO admission queue.
    Queued,
    /// Reached a boundary node.  Never changes afterwards.
    Evacuated,
}

impl AgentStatus {
    /// `true` for `Moving` and `Queued`.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, AgentStatus::Moving | AgentStatus::Queued)
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentStatus::Evacuated)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    /// Staying in the same status is always allowed except for leaving
    /// `Evacuated`, which is never allowed.
    pub fn can_transition_to(self, next: AgentStatus) -> bool {
        use AgentStatus::*;
        match (self, next) {
            (Evacuated, Evacuated) => true,
            (Evacuated, _) => false,
            (a, b) if a == b => true,
            (Waiting, Moving) => true,
            (Moving, Queued) | (Queued, Moving) => true,
            (Moving, Evacuated) | (Queued, Evacuated) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Waiting   => "waiting",
            AgentStatus::Moving    => "moving",
            AgentStatus::Queued    => "queued",
            AgentStatus::Evacuated => "evacuated",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
