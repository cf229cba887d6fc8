//! `ev-network` — the immutable street network shared by every scenario run.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                    |
//! |----------------|-------------------------------------------------------------|
//! | [`network`]    | `StreetNetwork` (CSR + R-tree), builder, `CapacityModel`    |
//! | [`router`]     | `Route`, `ShortestPathTree`                                 |
//! | [`centrality`] | Sampled Brandes betweenness, `most_central_node`            |
//! | [`loader`]     | `GraphPayload` from JSON or CSV, `StreetNetwork::from_payload` |
//! | [`error`]      | `NetworkError`, `NetworkResult<T>`                          |

pub mod centrality;
pub mod error;
pub mod loader;
pub mod network;
pub mod router;


pub use centrality::{betweenness, most_central_node};
pub use error::{NetworkError, NetworkResult};
pub use loader::{EdgeRecord, GraphPayload, NodeRecord};
pub use network::{CapacityModel, StreetNetwork, StreetNetworkBuilder, UNCONSTRAINED};
pub use router::{Route, ShortestPathTree};
