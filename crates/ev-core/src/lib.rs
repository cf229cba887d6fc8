//! `ev-core` — foundational types for the evacuation simulator.
//!
//! This crate is a dependency of every other `ev-*` crate.  It has no
//! `ev-*` dependencies and minimal external ones (only `rand` and
//! `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `AgentId`, `NodeId`, `EdgeId`                         |
//! | [`geo`]         | `Coord`, Euclidean distance                           |
//! | [`time`]        | `Tick`, `SimClock`, `SimConfig`                       |
//! | [`rng`]         | `AgentRng` (per-agent), `SimRng` (run-level)          |
//! | [`status`]      | `AgentStatus` lifecycle enum                          |
//! | [`scenario`]    | `ScenarioVariant`, `OriginSpec`, validation           |
//! | [`error`]       | `EvError`, `EvResult`                                 |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod error;
pub mod geo;
pub mod ids;
pub mod rng;
pub mod scenario;
pub mod status;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{EvError, EvResult};
pub use geo::Coord;
pub use ids::{AgentId, EdgeId, NodeId};
pub use rng::{AgentRng, SimRng};
pub use scenario::{OriginSpec, ScenarioVariant};
pub use status::AgentStatus;
pub use time::{SimClock, SimConfig, Tick};
