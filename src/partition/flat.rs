//! Unstructured 1-D partition of a plain global index range.

use std::fmt;

use crate::algs::communicator::Communicator;
use crate::data::global_map::{DistributedBackend, LocalToGlobalMapping};
use crate::decomp_error::DecompError;
use crate::topology::process_grid::{block_begin, block_sizes};

/// Contiguous block of `0..global_size` owned by one rank, without ghosts.
///
/// The first `global_size % n_ranks` ranks hold one extra entry. Ranks may
/// hold nothing when `global_size < n_ranks`.
#[derive(Debug)]
pub struct FlatPartition {
    global_size: usize,
    local_size: usize,
    begin_global: usize,
    rank_no: usize,
    n_ranks: usize,
    mapping: Option<LocalToGlobalMapping>,
}

impl FlatPartition {
    /// Collective over `comm` (one call to `backend`).
    pub fn new<C, B>(global_size: usize, comm: &C, backend: &B) -> Result<Self, DecompError>
    where
        C: Communicator,
        B: DistributedBackend,
    {
        if global_size == 0 {
            return Err(DecompError::EmptyDomain { axis: 0 });
        }
        let n_ranks = comm.size().max(1);
        let rank_no = comm.rank();
        let local_size = block_sizes(global_size, n_ranks)
            .get(rank_no)
            .copied()
            .ok_or(DecompError::IndexOutOfRange {
                index: rank_no,
                len: n_ranks,
            })?;
        let begin_global = block_begin(global_size, n_ranks, rank_no);
        log::debug!("rank {rank_no}: flat partition [{begin_global}, {}) of {global_size}", begin_global + local_size);

        let mapping = backend.create_local_to_global_mapping(local_size, global_size, &[])?;
        if mapping.begin() != begin_global {
            return Err(DecompError::CollectiveMismatch(format!(
                "backend placed rank {rank_no} at {}, expected {begin_global}",
                mapping.begin()
            )));
        }
        Ok(Self {
            global_size,
            local_size,
            begin_global,
            rank_no,
            n_ranks,
            mapping: Some(mapping),
        })
    }

    pub fn global_size(&self) -> usize {
        self.global_size
    }
    pub fn local_size(&self) -> usize {
        self.local_size
    }
    pub fn begin_global(&self) -> usize {
        self.begin_global
    }
    pub fn own_rank_no(&self) -> usize {
        self.rank_no
    }
    pub fn n_ranks(&self) -> usize {
        self.n_ranks
    }

    /// Local DOF numbers, `0..local_size`.
    pub fn dof_nos_local(&self) -> Vec<usize> {
        (0..self.local_size).collect()
    }

    pub fn mapping(&self) -> Option<&LocalToGlobalMapping> {
        self.mapping.as_ref()
    }

    pub fn release_mapping(&mut self) {
        if let Some(mapping) = self.mapping.take() {
            mapping.release();
        }
    }

    /// The owned slice of a global buffer.
    pub fn extract_local_dofs<T: Copy>(&self, buffer: &[T]) -> Result<Vec<T>, DecompError> {
        let end = self.begin_global + self.local_size;
        buffer
            .get(self.begin_global..end)
            .map(<[T]>::to_vec)
            .ok_or(DecompError::BufferTooSmall {
                required: end,
                len: buffer.len(),
            })
    }
}

impl fmt::Display for FlatPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FlatPartition rank {} of {}: local {} of global {}, begin {}",
            self.rank_no, self.n_ranks, self.local_size, self.global_size, self.begin_global
        )
    }
}
