//! Structured and flat partitions with their node and DOF index sets.

pub mod basis;
pub mod dof_index;
pub mod extent;
pub mod extract;
pub mod flat;
pub mod manager;
pub mod settings;
pub mod structured;

pub use basis::BasisLayout;
pub use dof_index::{DofIndexBuilder, DofIndexSet, RankDofTable};
pub use extent::{ExtentMode, LocalExtentResolver, LocalPartition, PartitionInput, ResolvedExtent};
pub use flat::FlatPartition;
pub use manager::PartitionManager;
pub use settings::{PartitionLayout, PartitionSettings};
pub use structured::StructuredPartition;
