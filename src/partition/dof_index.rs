//! DOF index construction for one structured partition.
//!
//! The builder walks the local node box, including one ghost layer on every
//! axis that does not end at the global upper boundary, and produces:
//! - `dof_nos_local`: for every node in canonical box order, the local
//!   numbers of its DOFs. Owned DOFs are numbered first (row-major over the
//!   owned box), ghost DOFs follow in traversal order.
//! - `ghost_dof_global_nos`: partition-contiguous global numbers of the ghost
//!   DOFs, in the same order as their local numbers.
//! - `only_nodal_dof_local_nos`: the first DOF of every node.
//!
//! A node shared by two partitions along an axis belongs to the partition
//! for which it is the first node, so ghosts only ever sit on the upper side.

use crate::debug_invariants::{check_permutation, DebugInvariants};
use crate::decomp_error::DecompError;
use crate::partition::basis::BasisLayout;
use crate::partition::extent::LocalPartition;
use crate::topology::dim::{for_each_in_box, linear_index, unravel_index, volume};
use crate::topology::local_sizes::LocalSizesOnRanks;
use crate::topology::process_grid::ProcessGrid;

/// Owned node ranges and DOF offsets of every rank, from the gathered sizes.
#[derive(Clone, Debug)]
pub struct RankDofTable<const D: usize> {
    node_begin: [Vec<usize>; D],
    n_nodes_owned: [Vec<usize>; D],
    dof_offset: Vec<usize>,
    n_ranks: [usize; D],
    n_nodes_global: [usize; D],
    dofs_per_node: usize,
}

impl<const D: usize> RankDofTable<D> {
    pub fn new(sizes: &LocalSizesOnRanks<D>, basis: &BasisLayout) -> Self {
        let npe = basis.nodes_per_element_along_axis;
        let n_ranks = sizes.n_ranks();
        let node_begin: [Vec<usize>; D] = std::array::from_fn(|d| {
            (0..n_ranks[d]).map(|c| sizes.begin_element(d, c) * npe).collect()
        });
        let n_nodes_owned: [Vec<usize>; D] = std::array::from_fn(|d| {
            let along = sizes.along(d);
            along
                .iter()
                .enumerate()
                .map(|(c, &n)| n * npe + usize::from(c + 1 == along.len()))
                .collect()
        });
        let n_nodes_global = std::array::from_fn(|d| sizes.n_elements_global(d) * npe + 1);

        let n_workers = volume(&n_ranks);
        let mut dof_offset = Vec::with_capacity(n_workers + 1);
        let mut running = 0;
        for rank in 0..n_workers {
            dof_offset.push(running);
            let coord = unravel_index(rank, &n_ranks);
            let owned: usize = (0..D).map(|d| n_nodes_owned[d][coord[d]]).product();
            running += owned * basis.dofs_per_node;
        }
        dof_offset.push(running);

        Self {
            node_begin,
            n_nodes_owned,
            dof_offset,
            n_ranks,
            n_nodes_global,
            dofs_per_node: basis.dofs_per_node,
        }
    }

    /// First partition-contiguous global DOF of `rank_no`.
    pub fn begin_dof_global(&self, rank_no: usize) -> Result<usize, DecompError> {
        let n_workers = self.dof_offset.len() - 1;
        if rank_no >= n_workers {
            return Err(DecompError::IndexOutOfRange {
                index: rank_no,
                len: n_workers,
            });
        }
        Ok(self.dof_offset[rank_no])
    }

    pub fn n_dofs_global(&self) -> usize {
        self.dof_offset.last().copied().unwrap_or(0)
    }

    /// Owning rank number of the node at global node coordinates `node`.
    pub fn owner_of(&self, node: &[usize; D]) -> Result<usize, DecompError> {
        let (coord, _) = self.locate(node)?;
        Ok(linear_index(&coord, &self.n_ranks))
    }

    /// Partition-contiguous global number of the first DOF of `node`.
    pub fn global_dof_no(&self, node: &[usize; D]) -> Result<usize, DecompError> {
        let (coord, local) = self.locate(node)?;
        let owner_extent: [usize; D] = std::array::from_fn(|d| self.n_nodes_owned[d][coord[d]]);
        let rank = linear_index(&coord, &self.n_ranks);
        Ok(self.dof_offset[rank] + linear_index(&local, &owner_extent) * self.dofs_per_node)
    }

    /// Owner grid coordinate and node index inside the owner's box.
    fn locate(&self, node: &[usize; D]) -> Result<([usize; D], [usize; D]), DecompError> {
        let mut coord = [0; D];
        let mut local = [0; D];
        for d in 0..D {
            if node[d] >= self.n_nodes_global[d] {
                return Err(DecompError::IndexOutOfRange {
                    index: node[d],
                    len: self.n_nodes_global[d],
                });
            }
            // node_begin[d][0] == 0, so at least one begin is <= node[d]
            let c = self.node_begin[d].partition_point(|&b| b <= node[d]) - 1;
            coord[d] = c;
            local[d] = node[d] - self.node_begin[d][c];
        }
        Ok((coord, local))
    }
}

/// Node and DOF index sets of one partition. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DofIndexSet<const D: usize> {
    dofs_per_node: usize,
    has_full_number_of_nodes: [bool; D],
    n_nodes_global: [usize; D],
    begin_node_global: [usize; D],
    n_nodes_local_without_ghosts: [usize; D],
    n_nodes_local_with_ghosts: [usize; D],
    begin_dof_global: usize,
    n_dofs_global: usize,
    dof_nos_local: Vec<usize>,
    ghost_dof_global_nos: Vec<usize>,
    only_nodal_dof_local_nos: Vec<usize>,
}

impl<const D: usize> DofIndexSet<D> {
    pub fn dofs_per_node(&self) -> usize {
        self.dofs_per_node
    }
    pub fn n_nodes_global(&self) -> &[usize; D] {
        &self.n_nodes_global
    }
    pub fn n_nodes_global_total(&self) -> usize {
        volume(&self.n_nodes_global)
    }
    pub fn begin_node_global(&self) -> &[usize; D] {
        &self.begin_node_global
    }
    pub fn n_nodes_local_without_ghosts(&self) -> &[usize; D] {
        &self.n_nodes_local_without_ghosts
    }
    pub fn n_nodes_local_with_ghosts(&self) -> &[usize; D] {
        &self.n_nodes_local_with_ghosts
    }
    pub fn n_nodes_local_without_ghosts_total(&self) -> usize {
        volume(&self.n_nodes_local_without_ghosts)
    }
    pub fn n_nodes_local_with_ghosts_total(&self) -> usize {
        volume(&self.n_nodes_local_with_ghosts)
    }
    pub fn n_dofs_local_without_ghosts(&self) -> usize {
        self.n_nodes_local_without_ghosts_total() * self.dofs_per_node
    }
    pub fn n_dofs_local_with_ghosts(&self) -> usize {
        self.n_nodes_local_with_ghosts_total() * self.dofs_per_node
    }
    pub fn n_dofs_global(&self) -> usize {
        self.n_dofs_global
    }
    /// First partition-contiguous global DOF owned by this partition.
    pub fn begin_dof_global(&self) -> usize {
        self.begin_dof_global
    }

    /// Local DOF numbers in canonical node order; with `only_nodal_values`
    /// only the first DOF of every node.
    pub fn dof_nos_local(&self, only_nodal_values: bool) -> &[usize] {
        if only_nodal_values {
            &self.only_nodal_dof_local_nos
        } else {
            &self.dof_nos_local
        }
    }

    pub fn ghost_dof_global_nos(&self) -> &[usize] {
        &self.ghost_dof_global_nos
    }
}

impl<const D: usize> DebugInvariants for DofIndexSet<D> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "DofIndexSet");
    }

    fn validate_invariants(&self) -> Result<(), DecompError> {
        for d in 0..D {
            let extra = usize::from(!self.has_full_number_of_nodes[d]);
            if self.n_nodes_local_with_ghosts[d] != self.n_nodes_local_without_ghosts[d] + extra {
                return Err(DecompError::CoverViolation {
                    axis: d,
                    reason: format!(
                        "{} nodes with ghosts, {} without, full number of nodes {}",
                        self.n_nodes_local_with_ghosts[d],
                        self.n_nodes_local_without_ghosts[d],
                        self.has_full_number_of_nodes[d]
                    ),
                });
            }
        }
        let n_with = self.n_dofs_local_with_ghosts();
        if self.dof_nos_local.len() != n_with {
            return Err(DecompError::IndexOutOfRange {
                index: self.dof_nos_local.len(),
                len: n_with,
            });
        }
        check_permutation(&self.dof_nos_local)?;
        let owned = self.begin_dof_global..self.begin_dof_global + self.n_dofs_local_without_ghosts();
        if let Some(&ghost) = self
            .ghost_dof_global_nos
            .iter()
            .find(|&&g| owned.contains(&g) || g >= self.n_dofs_global)
        {
            return Err(DecompError::IndexOutOfRange {
                index: ghost,
                len: self.n_dofs_global,
            });
        }
        Ok(())
    }
}

/// Builds the [`DofIndexSet`] of the calling rank.
pub struct DofIndexBuilder<'a, const D: usize> {
    partition: &'a LocalPartition<D>,
    grid: &'a ProcessGrid<D>,
    sizes: &'a LocalSizesOnRanks<D>,
    basis: BasisLayout,
}

impl<'a, const D: usize> DofIndexBuilder<'a, D> {
    pub fn new(
        partition: &'a LocalPartition<D>,
        grid: &'a ProcessGrid<D>,
        sizes: &'a LocalSizesOnRanks<D>,
        basis: BasisLayout,
    ) -> Self {
        Self {
            partition,
            grid,
            sizes,
            basis,
        }
    }

    pub fn build(&self) -> Result<DofIndexSet<D>, DecompError> {
        let npe = self.basis.nodes_per_element_along_axis;
        let dpn = self.basis.dofs_per_node;
        if npe == 0 || dpn == 0 {
            return Err(DecompError::InvalidBasis {
                nodes_per_element_along_axis: npe,
                dofs_per_node: dpn,
            });
        }
        if self.sizes.n_ranks() != *self.grid.n_ranks() {
            return Err(DecompError::CollectiveMismatch(format!(
                "size lists span {:?} ranks, process grid is {:?}",
                self.sizes.n_ranks(),
                self.grid.n_ranks()
            )));
        }
        let (begin, n_local) = self.sizes.element_box(self.grid.rank_coord())?;
        let own_begin = self.partition.begin_element_global();
        let own_n = self.partition.n_elements_local();
        if let Some(axis) = (0..D).find(|&d| begin[d] != own_begin[d] || n_local[d] != own_n[d]) {
            return Err(DecompError::CoverViolation {
                axis,
                reason: format!(
                    "rank {} owns elements from {own_begin:?} (count {own_n:?}), \
                     the size lists place it at {begin:?} (count {n_local:?})",
                    self.grid.rank_no(),
                ),
            });
        }

        let table = RankDofTable::new(self.sizes, &self.basis);
        let full = *self.partition.has_full_number_of_nodes();
        let n_elements_local = self.partition.n_elements_local();
        let begin_node_global: [usize; D] =
            std::array::from_fn(|d| self.partition.begin_element_global()[d] * npe);
        let without: [usize; D] =
            std::array::from_fn(|d| n_elements_local[d] * npe + usize::from(full[d]));
        let with: [usize; D] = std::array::from_fn(|d| n_elements_local[d] * npe + 1);
        let n_owned_nodes = volume(&without);

        let mut dof_nos_local = Vec::with_capacity(volume(&with) * dpn);
        let mut ghost_dof_global_nos = Vec::with_capacity((volume(&with) - n_owned_nodes) * dpn);
        let mut n_ghost_nodes = 0;
        let mut failure = None;
        for_each_in_box(&with, |idx| {
            if failure.is_some() {
                return;
            }
            let owned = (0..D).all(|d| idx[d] < without[d]);
            let local_node = if owned {
                linear_index(idx, &without)
            } else {
                let global: [usize; D] = std::array::from_fn(|d| begin_node_global[d] + idx[d]);
                match table.global_dof_no(&global) {
                    Ok(first) => ghost_dof_global_nos.extend(first..first + dpn),
                    Err(err) => {
                        failure = Some(err);
                        return;
                    }
                }
                n_ghost_nodes += 1;
                n_owned_nodes + n_ghost_nodes - 1
            };
            dof_nos_local.extend(local_node * dpn..(local_node + 1) * dpn);
        });
        if let Some(err) = failure {
            return Err(err);
        }
        let only_nodal_dof_local_nos = dof_nos_local.iter().step_by(dpn).copied().collect();

        let set = DofIndexSet {
            dofs_per_node: dpn,
            has_full_number_of_nodes: full,
            n_nodes_global: std::array::from_fn(|d| self.partition.n_elements_global()[d] * npe + 1),
            begin_node_global,
            n_nodes_local_without_ghosts: without,
            n_nodes_local_with_ghosts: with,
            begin_dof_global: table.begin_dof_global(self.grid.rank_no())?,
            n_dofs_global: table.n_dofs_global(),
            dof_nos_local,
            ghost_dof_global_nos,
            only_nodal_dof_local_nos,
        };
        set.debug_assert_invariants();
        Ok(set)
    }
}
