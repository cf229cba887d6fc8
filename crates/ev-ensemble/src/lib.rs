//! `ev-ensemble` — runs a batch of scenario variants against one street
//! network and reports each variant's results or failure.
//!
//! ```text
//! EnsembleConfig ─┐
//!                 ├─► EnsembleRunner::run ─► for each (variant, replicate), ≤ max_concurrency at once:
//! Arc<Network> ───┘       validate → generate population → simulate → metrics + bottlenecks + flow
//!                                             │
//!                                             ▼
//!                         EnsembleReport { one VariantReport per variant, request order }
//! ```
//!
//! A failing variant (malformed parameters, unreachable destination,
//! cancellation) never aborts the batch; it is recorded as a
//! [`VariantFailure`] with a structured [`FailureReason`].
//!
//! | Module     | Contents                                                 |
//! |------------|----------------------------------------------------------|
//! | [`config`] | `EnsembleConfig` (JSON presets) and its validation       |
//! | [`runner`] | `EnsembleRunner`: bounded Rayon pool, cancellation       |
//! | [`result`] | `ScenarioResult`, `VariantFailure`, `FailureReason`      |
//! | [`report`] | `EnsembleReport`, replicate aggregation, comparison rows |
//! | [`error`]  | `EnsembleError`, `EnsembleResult<T>`                     |

pub mod config;
pub mod error;
pub mod report;
pub mod result;
pub mod runner;

#[cfg(test)]
mod tests;

pub use config::EnsembleConfig;
pub use error::{EnsembleError, EnsembleResult};
pub use report::{ComparisonRow, EnsembleReport, ReplicateSummary, Spread, VariantReport, VariantRuns};
pub use result::{FailureReason, ScenarioResult, VariantFailure};
pub use runner::EnsembleRunner;
