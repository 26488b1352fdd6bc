#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-decomp
//!
//! Parallel domain decomposition of structured 1-D, 2-D and 3-D element grids
//! and the node/DOF index management derived from it.
//!
//! ## Overview
//! - [`topology`]: process grid balancing and per-rank element boxes
//! - [`partition`]: local extents, DOF index sets (owned + one ghost layer),
//!   structured and flat partitions, extraction of local data from global
//!   buffers, typed settings and the [`partition::PartitionManager`]
//! - [`data`]: the local-to-global DOF mapping handed to a distributed-vector
//!   backend
//! - [`algs`]: communicator backends (serial, threads, MPI behind
//!   `mpi-support`) and rank-subset views
//!
//! ## Numbering
//! Boxes are traversed row-major with axis 0 fastest. A node shared by two
//! partitions belongs to the partition for which it is the first node, so
//! ghosts only exist on the upper side of a partition. Owned DOFs are
//! numbered contiguously per rank in rank order; local DOF numbers list the
//! owned DOFs first and the ghost DOFs after them.
//!
//! ## Usage
//! ```
//! use mesh_decomp::prelude::*;
//!
//! let mut manager = PartitionManager::new(NoComm);
//! let partition = manager
//!     .create_partitioning_structured_global([4, 4], None, BasisLayout::lagrange_linear())
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(partition.n_dofs_global(), 25);
//! ```

pub mod algs;
pub mod data;
pub mod debug_invariants;
pub mod decomp_error;
pub mod partition;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use decomp_error::DecompError;

/// The most-used traits and types.
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::sub_comm::SubComm;
    pub use crate::data::global_map::{DistributedBackend, InMemoryBackend, LocalToGlobalMapping};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::decomp_error::DecompError;
    pub use crate::partition::{
        BasisLayout, FlatPartition, PartitionInput, PartitionLayout, PartitionManager,
        PartitionSettings, StructuredPartition,
    };
    pub use crate::topology::{BlockDiscovery, TopologyDiscovery};
}
