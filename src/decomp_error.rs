//! DecompError: Unified error type for mesh-decomp public APIs
//!
//! Every fallible operation of the decomposition returns this error. None of
//! the variants is locally recoverable: a decomposition is either globally
//! consistent or it does not exist, so callers are expected to abort the run
//! with the reported values.

use thiserror::Error;

/// Unified error type for mesh-decomp operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecompError {
    // ----- configuration -------------------------------------------------
    /// The requested per-axis rank counts cannot be realized by the workers.
    #[error("Rank count mismatch: nRanks {n_ranks:?} (product {product}) does not match {n_workers} worker(s)")]
    RankCountMismatch {
        n_ranks: Vec<usize>,
        product: usize,
        n_workers: usize,
    },
    /// No factorization of the worker count fits the element counts.
    #[error("Cannot distribute {n_workers} worker(s) over nElementsGlobal {n_elements_global:?} (every rank needs at least one element per axis)")]
    NoBalancedFactorization {
        n_workers: usize,
        n_elements_global: Vec<usize>,
    },
    /// The global domain has no elements along an axis.
    #[error("Global domain is empty along axis {axis}")]
    EmptyDomain { axis: usize },
    /// A partition has no elements along an axis.
    #[error("Local partition on rank {rank} is empty along axis {axis}")]
    EmptyPartition { rank: usize, axis: usize },
    /// Runtime-sized settings do not match the compile-time dimension.
    #[error("Dimension mismatch for `{field}`: expected {expected} entries, got {got}")]
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        got: usize,
    },
    /// Only a ghost layer of width one is supported.
    #[error("Unsupported ghost width {0} (only 1 is supported)")]
    UnsupportedGhostWidth(usize),
    /// The per-rank partitions do not form an exact cover of the domain.
    #[error("Partition cover violated along axis {axis}: {reason}")]
    CoverViolation { axis: usize, reason: String },
    /// `beginElementGlobal + nElementsLocal` exceeds `nElementsGlobal`.
    #[error("Partition exceeds domain along axis {axis}: begin {begin} + local {n_local} > global {n_global}")]
    PartitionExceedsDomain {
        axis: usize,
        begin: usize,
        n_local: usize,
        n_global: usize,
    },
    /// A basis places no nodes or no DOFs.
    #[error("Invalid basis layout: {nodes_per_element_along_axis} node(s) per element and axis, {dofs_per_node} DOF(s) per node")]
    InvalidBasis {
        nodes_per_element_along_axis: usize,
        dofs_per_node: usize,
    },
    /// A rank subset is empty, unsorted, duplicated or outside the communicator.
    #[error("Invalid rank subset: {0}")]
    InvalidRankSubset(String),

    // ----- precondition / bounds -----------------------------------------
    /// An index lies outside the range it must address.
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    /// A global-ordered buffer is too short for the requested extraction.
    #[error("Buffer too small: need at least {required} entries, got {len}")]
    BufferTooSmall { required: usize, len: usize },

    // ----- collectives ---------------------------------------------------
    /// Processes reached a collective with incompatible parameters.
    #[error("Collective mismatch: {0}")]
    CollectiveMismatch(String),
    /// Communication with a peer failed (no data, wrong size or timeout).
    #[error("Communication error with neighbor {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },
}
