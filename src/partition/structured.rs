//! Structured partition of a D-dimensional element grid.
//!
//! A [`StructuredPartition`] is what every downstream assembly and solve
//! step consults: which elements, nodes and DOFs this rank stores, how the
//! local DOF numbers relate to the global ones, and the mapping handle for
//! the distributed-vector backend. It is built once, collectively, and is
//! immutable afterwards (apart from releasing the mapping).

use std::fmt;

use itertools::join;

use crate::algs::communicator::Communicator;
use crate::data::global_map::{DistributedBackend, LocalToGlobalMapping};
use crate::debug_invariants::DebugInvariants;
use crate::decomp_error::DecompError;
use crate::partition::basis::BasisLayout;
use crate::partition::dof_index::{DofIndexBuilder, DofIndexSet};
use crate::partition::extent::{ExtentMode, LocalExtentResolver, LocalPartition, PartitionInput};
use crate::partition::settings::PartitionLayout;
use crate::topology::dim::{for_each_in_box, linear_index, volume};
use crate::topology::discovery::TopologyDiscovery;
use crate::topology::local_sizes::LocalSizesOnRanks;
use crate::topology::process_grid::ProcessGrid;

#[derive(Debug)]
pub struct StructuredPartition<const D: usize> {
    partition: LocalPartition<D>,
    grid: ProcessGrid<D>,
    sizes: LocalSizesOnRanks<D>,
    basis: BasisLayout,
    dofs: DofIndexSet<D>,
    mode: ExtentMode,
    mapping: Option<LocalToGlobalMapping>,
}

static_assertions::assert_impl_all!(StructuredPartition<3>: Send, Sync);

impl<const D: usize> StructuredPartition<D> {
    /// Collective over `comm`: resolve the local extent, build the DOF
    /// index sets and create the local-to-global mapping.
    pub fn new<C, T, B>(
        input: &PartitionInput<D>,
        basis: BasisLayout,
        comm: &C,
        discovery: &T,
        backend: &B,
    ) -> Result<Self, DecompError>
    where
        C: Communicator,
        T: TopologyDiscovery,
        B: DistributedBackend,
    {
        let extent = LocalExtentResolver::new(comm, discovery)
            .with_dofs_per_node(basis.dofs_per_node)
            .resolve(input)?;
        log::debug!(
            "rank {}: structured partition ({:?}) elements {:?} from {:?} in grid {:?}",
            comm.rank(),
            extent.mode,
            extent.partition.n_elements_local(),
            extent.partition.begin_element_global(),
            extent.grid.n_ranks()
        );
        let dofs = DofIndexBuilder::new(&extent.partition, &extent.grid, &extent.sizes, basis).build()?;

        if extent.mode == ExtentMode::Discovered {
            let begin = comm.exscan_sum(dofs.n_dofs_local_without_ghosts())?;
            if begin != dofs.begin_dof_global() {
                return Err(DecompError::CollectiveMismatch(format!(
                    "exclusive scan puts the first owned DOF of rank {} at {begin}, \
                     the discovered layout at {}",
                    comm.rank(),
                    dofs.begin_dof_global()
                )));
            }
        }

        let mapping = backend.create_local_to_global_mapping(
            dofs.n_dofs_local_without_ghosts(),
            dofs.n_dofs_global(),
            dofs.ghost_dof_global_nos(),
        )?;
        if mapping.begin() != dofs.begin_dof_global() {
            return Err(DecompError::CollectiveMismatch(format!(
                "backend placed the owned DOFs of rank {} at {}, expected {}",
                comm.rank(),
                mapping.begin(),
                dofs.begin_dof_global()
            )));
        }

        let partition = Self {
            partition: extent.partition,
            grid: extent.grid,
            sizes: extent.sizes,
            basis,
            dofs,
            mode: extent.mode,
            mapping: Some(mapping),
        };
        partition.debug_assert_invariants();
        Ok(partition)
    }

    // ----- elements --------------------------------------------------------
    pub fn n_elements_global(&self) -> &[usize; D] {
        self.partition.n_elements_global()
    }
    pub fn n_elements_local(&self) -> &[usize; D] {
        self.partition.n_elements_local()
    }
    pub fn n_elements_local_total(&self) -> usize {
        volume(self.partition.n_elements_local())
    }
    pub fn begin_element_global(&self) -> &[usize; D] {
        self.partition.begin_element_global()
    }
    pub fn has_full_number_of_nodes(&self) -> &[bool; D] {
        self.partition.has_full_number_of_nodes()
    }
    pub fn local_partition(&self) -> &LocalPartition<D> {
        &self.partition
    }

    // ----- process grid ----------------------------------------------------
    pub fn n_ranks(&self) -> &[usize; D] {
        self.grid.n_ranks()
    }
    pub fn rank_coord(&self) -> &[usize; D] {
        self.grid.rank_coord()
    }
    pub fn own_rank_no(&self) -> usize {
        self.grid.rank_no()
    }
    pub fn process_grid(&self) -> &ProcessGrid<D> {
        &self.grid
    }
    pub fn local_sizes_on_ranks(&self) -> &LocalSizesOnRanks<D> {
        &self.sizes
    }
    /// How the local extent was obtained.
    pub fn mode(&self) -> ExtentMode {
        self.mode
    }

    // ----- nodes and DOFs --------------------------------------------------
    pub fn basis(&self) -> BasisLayout {
        self.basis
    }
    pub fn dof_index_set(&self) -> &DofIndexSet<D> {
        &self.dofs
    }
    pub fn n_nodes_global(&self) -> &[usize; D] {
        self.dofs.n_nodes_global()
    }
    pub fn n_nodes_global_total(&self) -> usize {
        self.dofs.n_nodes_global_total()
    }
    pub fn begin_node_global(&self) -> &[usize; D] {
        self.dofs.begin_node_global()
    }
    pub fn n_nodes_local_without_ghosts(&self) -> &[usize; D] {
        self.dofs.n_nodes_local_without_ghosts()
    }
    pub fn n_nodes_local_with_ghosts(&self) -> &[usize; D] {
        self.dofs.n_nodes_local_with_ghosts()
    }
    pub fn n_nodes_local_without_ghosts_total(&self) -> usize {
        self.dofs.n_nodes_local_without_ghosts_total()
    }
    pub fn n_nodes_local_with_ghosts_total(&self) -> usize {
        self.dofs.n_nodes_local_with_ghosts_total()
    }
    pub fn n_dofs_local_without_ghosts(&self) -> usize {
        self.dofs.n_dofs_local_without_ghosts()
    }
    pub fn n_dofs_local_with_ghosts(&self) -> usize {
        self.dofs.n_dofs_local_with_ghosts()
    }
    pub fn n_dofs_global(&self) -> usize {
        self.dofs.n_dofs_global()
    }
    pub fn begin_dof_global(&self) -> usize {
        self.dofs.begin_dof_global()
    }
    pub fn dof_nos_local(&self, only_nodal_values: bool) -> &[usize] {
        self.dofs.dof_nos_local(only_nodal_values)
    }
    pub fn ghost_dof_global_nos(&self) -> &[usize] {
        self.dofs.ghost_dof_global_nos()
    }

    /// Whether local node `node_no_local` is owned by this rank.
    pub fn is_non_ghost(&self, node_no_local: usize) -> bool {
        node_no_local < self.n_nodes_local_without_ghosts_total()
    }

    /// Natural global node numbers of the local node box, in box order.
    pub fn node_nos_global_natural(&self, with_ghosts: bool) -> Vec<usize> {
        let extent = if with_ghosts {
            self.n_nodes_local_with_ghosts()
        } else {
            self.n_nodes_local_without_ghosts()
        };
        let begin = self.begin_node_global();
        let n_nodes_global = self.n_nodes_global();
        let mut out = Vec::with_capacity(volume(extent));
        for_each_in_box(extent, |idx| {
            let global: [usize; D] = std::array::from_fn(|d| begin[d] + idx[d]);
            out.push(linear_index(&global, n_nodes_global));
        });
        out
    }

    // ----- mapping ---------------------------------------------------------
    /// The local-to-global mapping, unless it was released.
    pub fn mapping(&self) -> Option<&LocalToGlobalMapping> {
        self.mapping.as_ref()
    }

    /// Release the mapping before the partition itself is dropped.
    pub fn release_mapping(&mut self) {
        if let Some(mapping) = self.mapping.take() {
            mapping.release();
        }
    }

    /// Snapshot that reproduces this decomposition through given mode.
    pub fn layout(&self) -> PartitionLayout {
        PartitionLayout {
            n_elements_global: self.n_elements_global().to_vec(),
            n_elements_local: self.n_elements_local().to_vec(),
            begin_element_global: self.begin_element_global().to_vec(),
            n_ranks: self.n_ranks().to_vec(),
        }
    }
}

impl<const D: usize> DebugInvariants for StructuredPartition<D> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "StructuredPartition");
    }

    fn validate_invariants(&self) -> Result<(), DecompError> {
        for d in 0..D {
            let last = self.grid.is_last_along(d);
            if self.has_full_number_of_nodes()[d] != last {
                return Err(DecompError::CoverViolation {
                    axis: d,
                    reason: format!(
                        "rank coordinate {} of {} but full number of nodes is {}",
                        self.rank_coord()[d],
                        self.n_ranks()[d],
                        self.has_full_number_of_nodes()[d]
                    ),
                });
            }
        }
        self.dofs.validate_invariants()
    }
}

impl<const D: usize> fmt::Display for StructuredPartition<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "StructuredPartition<{D}> rank {} at [{}] of grid [{}] ({:?})",
            self.own_rank_no(),
            join(self.rank_coord(), ","),
            join(self.n_ranks(), ","),
            self.mode
        )?;
        writeln!(
            f,
            "  elements: global [{}], local [{}], begin [{}], full nodes [{}]",
            join(self.n_elements_global(), ","),
            join(self.n_elements_local(), ","),
            join(self.begin_element_global(), ","),
            join(self.has_full_number_of_nodes(), ",")
        )?;
        for d in 0..D {
            writeln!(f, "  local sizes on ranks, axis {d}: [{}]", join(self.sizes.along(d), ","))?;
        }
        writeln!(
            f,
            "  nodes: global [{}], local [{}] ({} with ghosts), begin [{}]",
            join(self.n_nodes_global(), ","),
            join(self.n_nodes_local_without_ghosts(), ","),
            join(self.n_nodes_local_with_ghosts(), ","),
            join(self.begin_node_global(), ",")
        )?;
        writeln!(
            f,
            "  dofs: {} per node, local {} ({} with ghosts), global {}, begin {}",
            self.basis.dofs_per_node,
            self.n_dofs_local_without_ghosts(),
            self.n_dofs_local_with_ghosts(),
            self.n_dofs_global(),
            self.begin_dof_global()
        )?;
        writeln!(f, "  dofNosLocal: [{}]", join(self.dof_nos_local(false), ","))?;
        write!(f, "  ghostDofGlobalNos: [{}]", join(self.ghost_dof_global_nos(), ","))
    }
}
