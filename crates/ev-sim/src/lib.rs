//! `ev-sim` — the lock-step evacuation stepper.
//!
//! # Tick loop
//!
//! ```text
//! for tick in 0..horizon:
//!   ⓪ Cancel    — stop before the tick if the CancelToken is set.
//!   ① Activate  — waiting agents whose start tick arrived become Moving.
//!   ② Progress  — on-edge agents walk speed × tick_secs (parallel with
//!                 the `parallel` feature; reads only).
//!   ③ Admit     — ready agents pass their next gate subject to capacity
//!                 and service rate, in passes until nobody moves:
//!                   queue heads (gate order, strict FIFO)
//!                   fresh candidates by (entered_at, AgentId)
//!   ④ Summary   — TickSummary pushed to the timeline; observer called.
//!   stop when everyone evacuated or the horizon is reached.
//! ```
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                 |
//! |------------|--------------------------------------------------------|
//! | `parallel` | Runs the progress phase on Rayon's thread pool.        |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use ev_population::{PopulationConfig, PopulationGenerator};
//! use ev_sim::{NoopObserver, SimBuilder};
//!
//! let generator = PopulationGenerator::new(network.clone(), PopulationConfig::new(1_000))?;
//! let population = generator.generate(&variant)?;
//! let mut sim = SimBuilder::new(variant.sim_config(), network, population).build()?;
//! sim.run(&mut NoopObserver);
//! let outcome = sim.into_outcome();
//! ```

pub mod builder;
pub mod error;
pub mod observer;
pub mod outcome;
pub mod sim;
pub mod state;

#[cfg(test)]
mod tests;

pub use builder::SimBuilder;
pub use error::{SimError, SimResult};
pub use observer::{CancelToken, NoopObserver, SimObserver};
pub use outcome::{AgentRecord, SimOutcome, Termination};
pub use sim::Sim;
pub use state::{AgentState, Gate, QueueStats, SimulationState, TickSummary};
