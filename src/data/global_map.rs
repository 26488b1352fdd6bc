//! Local-to-global DOF mapping handed to the distributed-vector backend.
//!
//! Local DOF numbers `0..n_owned` map to the contiguous owned range
//! `begin..begin + n_owned` of the global index space; local numbers from
//! `n_owned` on map to the ghost list, in order. The mapping is built once
//! through a single collective of the backend and released with the
//! partition that owns it.

use std::collections::HashMap;
use std::ops::AddAssign;

use crate::algs::communicator::Communicator;
use crate::decomp_error::DecompError;

/// Factory of local-to-global mappings (a distributed linear-algebra stack).
pub trait DistributedBackend {
    /// Collective: every rank of the backend's communicator calls this once.
    fn create_local_to_global_mapping(
        &self,
        n_local: usize,
        n_global: usize,
        ghosts: &[usize],
    ) -> Result<LocalToGlobalMapping, DecompError>;
}

/// Backend that keeps the mapping in process memory.
///
/// The only collective is one all-gather of the owned counts, which yields
/// the begin offset and cross-checks the global size.
#[derive(Debug)]
pub struct InMemoryBackend<'c, C> {
    comm: &'c C,
}

impl<'c, C: Communicator> InMemoryBackend<'c, C> {
    pub fn new(comm: &'c C) -> Self {
        Self { comm }
    }
}

impl<C: Communicator> DistributedBackend for InMemoryBackend<'_, C> {
    fn create_local_to_global_mapping(
        &self,
        n_local: usize,
        n_global: usize,
        ghosts: &[usize],
    ) -> Result<LocalToGlobalMapping, DecompError> {
        let owned = self.comm.allgather_sizes(&[n_local])?;
        let total: usize = owned.iter().sum();
        if total != n_global {
            return Err(DecompError::CollectiveMismatch(format!(
                "owned DOF counts {owned:?} add up to {total}, expected {n_global}"
            )));
        }
        let begin = owned[..self.comm.rank()].iter().sum();
        log::debug!(
            "rank {}: local-to-global mapping over [{begin}, {}) with {} ghost(s)",
            self.comm.rank(),
            begin + n_local,
            ghosts.len()
        );
        LocalToGlobalMapping::new(begin, n_local, n_global, ghosts.to_vec())
    }
}

/// Owned mapping between local and global DOF numbers.
#[derive(Debug)]
pub struct LocalToGlobalMapping {
    begin: usize,
    n_owned: usize,
    n_global: usize,
    ghosts: Vec<usize>,
    ghost_slots: HashMap<usize, usize>,
}

impl LocalToGlobalMapping {
    /// Build a mapping from an already known begin offset.
    ///
    /// Ghosts must be distinct, inside `0..n_global` and outside the owned
    /// range.
    pub fn new(
        begin: usize,
        n_owned: usize,
        n_global: usize,
        ghosts: Vec<usize>,
    ) -> Result<Self, DecompError> {
        if begin.checked_add(n_owned).is_none_or(|end| end > n_global) {
            return Err(DecompError::IndexOutOfRange {
                index: begin.saturating_add(n_owned),
                len: n_global,
            });
        }
        let mut ghost_slots = HashMap::with_capacity(ghosts.len());
        for (slot, &g) in ghosts.iter().enumerate() {
            let owned = (begin..begin + n_owned).contains(&g);
            if g >= n_global || owned || ghost_slots.insert(g, n_owned + slot).is_some() {
                return Err(DecompError::IndexOutOfRange {
                    index: g,
                    len: n_global,
                });
            }
        }
        Ok(Self {
            begin,
            n_owned,
            n_global,
            ghosts,
            ghost_slots,
        })
    }

    /// First global DOF owned by this rank.
    pub fn begin(&self) -> usize {
        self.begin
    }
    pub fn n_owned(&self) -> usize {
        self.n_owned
    }
    pub fn n_global(&self) -> usize {
        self.n_global
    }
    /// Owned plus ghost DOFs.
    pub fn len(&self) -> usize {
        self.n_owned + self.ghosts.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn ghost_indices(&self) -> &[usize] {
        &self.ghosts
    }

    /// Global number of local DOF `local`.
    pub fn apply(&self, local: usize) -> Result<usize, DecompError> {
        if local < self.n_owned {
            return Ok(self.begin + local);
        }
        self.ghosts
            .get(local - self.n_owned)
            .copied()
            .ok_or(DecompError::IndexOutOfRange {
                index: local,
                len: self.len(),
            })
    }

    /// Local number of global DOF `global`, if this rank stores it.
    pub fn apply_inverse(&self, global: usize) -> Option<usize> {
        if (self.begin..self.begin + self.n_owned).contains(&global) {
            Some(global - self.begin)
        } else {
            self.ghost_slots.get(&global).copied()
        }
    }

    /// Local vector (owned then ghost values) read from a global buffer.
    pub fn gather_from_global<T: Copy>(&self, global: &[T]) -> Result<Vec<T>, DecompError> {
        if global.len() < self.n_global {
            return Err(DecompError::BufferTooSmall {
                required: self.n_global,
                len: global.len(),
            });
        }
        let mut local = Vec::with_capacity(self.len());
        local.extend_from_slice(&global[self.begin..self.begin + self.n_owned]);
        local.extend(self.ghosts.iter().map(|&g| global[g]));
        Ok(local)
    }

    /// Add every local value, ghosts included, into its global slot.
    pub fn scatter_add_to_global<T: Copy + AddAssign>(
        &self,
        local: &[T],
        global: &mut [T],
    ) -> Result<(), DecompError> {
        if local.len() != self.len() {
            return Err(DecompError::DimensionMismatch {
                field: "local",
                expected: self.len(),
                got: local.len(),
            });
        }
        if global.len() < self.n_global {
            return Err(DecompError::BufferTooSmall {
                required: self.n_global,
                len: global.len(),
            });
        }
        let (owned, ghost) = local.split_at(self.n_owned);
        for (slot, &v) in global[self.begin..].iter_mut().zip(owned) {
            *slot += v;
        }
        for (&g, &v) in self.ghosts.iter().zip(ghost) {
            global[g] += v;
        }
        Ok(())
    }

    /// Release the mapping; equivalent to dropping it.
    pub fn release(self) {}
}

impl Drop for LocalToGlobalMapping {
    fn drop(&mut self) {
        log::trace!(
            "releasing local-to-global mapping over [{}, {}) with {} ghost(s)",
            self.begin,
            self.begin + self.n_owned,
            self.ghosts.len()
        );
    }
}
