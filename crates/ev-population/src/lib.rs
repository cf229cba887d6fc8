//! `ev-population` — turns a street network and a scenario variant into an
//! evacuating population.
//!
//! | Module        | Contents                                                |
//! |---------------|---------------------------------------------------------|
//! | [`config`]    | `PopulationConfig`, `SpeedModel`, `StartDelay`, `Assignment` |
//! | [`plan`]      | `EvacuationPlan`: origin, boundary destinations, routes |
//! | [`generator`] | `PopulationGenerator`, SoA `Population`                 |
//! | [`error`]     | `PopulationError`, `PopulationResult<T>`                |

pub mod config;
pub mod error;
pub mod generator;
pub mod plan;


pub use config::{Assignment, PopulationConfig, SpeedModel, StartDelay};
pub use error::{PopulationError, PopulationResult};
pub use generator::{Population, PopulationGenerator};
pub use plan::{EvacuationPlan, resolve_destinations, resolve_origin};
