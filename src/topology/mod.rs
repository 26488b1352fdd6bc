//! Process grids and element boxes of a structured decomposition.
//!
//! - [`dim`]: compile-time dimension check and row-major box helpers
//! - [`process_grid`]: ranks per axis, rank coordinates and grid balancing
//! - [`local_sizes`]: per-axis element counts of every rank
//! - [`discovery`]: the structured-topology discovery seam

pub mod dim;
pub mod discovery;
pub mod local_sizes;
pub mod process_grid;

pub use discovery::{BlockDiscovery, DiscoveredLayout, DiscoveryRequest, TopologyDiscovery};
pub use local_sizes::LocalSizesOnRanks;
pub use process_grid::ProcessGrid;
