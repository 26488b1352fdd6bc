//! Local extent of a structured partition: which elements a rank owns and
//! whether it touches the upper boundary of the global domain.
//!
//! Three construction modes end in the same [`ResolvedExtent`]:
//! - *discover*: only the global element counts are known; the topology
//!   discovery service assigns the box.
//! - *given*: the caller supplies the complete box (restart, or coupling a
//!   second mesh to an existing decomposition); the per-rank size lists are
//!   rebuilt with one all-gather per axis and checked for an exact cover.
//! - *local sizes*: the caller supplies only the local element counts and the
//!   process grid; global counts and begins follow from the all-gather.

use crate::algs::communicator::Communicator;
use crate::decomp_error::DecompError;
use crate::topology::dim::Dim;
use crate::topology::discovery::{DiscoveryRequest, TopologyDiscovery};
use crate::topology::local_sizes::LocalSizesOnRanks;
use crate::topology::process_grid::ProcessGrid;

/// The element box owned by one rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalPartition<const D: usize> {
    n_elements_global: [usize; D],
    begin_element_global: [usize; D],
    n_elements_local: [usize; D],
    has_full_number_of_nodes: [bool; D],
}

impl<const D: usize> LocalPartition<D> {
    /// Check the box against the domain and derive `has_full_number_of_nodes`.
    pub fn new(
        n_elements_global: [usize; D],
        begin_element_global: [usize; D],
        n_elements_local: [usize; D],
    ) -> Result<Self, DecompError> {
        let () = Dim::<D>::CHECK;
        let mut has_full_number_of_nodes = [false; D];
        for d in 0..D {
            match begin_element_global[d].checked_add(n_elements_local[d]) {
                Some(end) if end <= n_elements_global[d] => {
                    has_full_number_of_nodes[d] = end == n_elements_global[d];
                }
                _ => {
                    return Err(DecompError::PartitionExceedsDomain {
                        axis: d,
                        begin: begin_element_global[d],
                        n_local: n_elements_local[d],
                        n_global: n_elements_global[d],
                    });
                }
            }
        }
        Ok(Self {
            n_elements_global,
            begin_element_global,
            n_elements_local,
            has_full_number_of_nodes,
        })
    }

    pub fn n_elements_global(&self) -> &[usize; D] {
        &self.n_elements_global
    }
    pub fn begin_element_global(&self) -> &[usize; D] {
        &self.begin_element_global
    }
    pub fn n_elements_local(&self) -> &[usize; D] {
        &self.n_elements_local
    }
    /// True along axes where this partition owns the final node layer.
    pub fn has_full_number_of_nodes(&self) -> &[bool; D] {
        &self.has_full_number_of_nodes
    }
}

/// What caller-side information a partition is built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionInput<const D: usize> {
    Discover {
        n_elements_global: [usize; D],
        n_ranks: Option<[usize; D]>,
    },
    Given {
        n_elements_global: [usize; D],
        n_elements_local: [usize; D],
        begin_element_global: [usize; D],
        n_ranks: [usize; D],
    },
    LocalSizes {
        n_elements_local: [usize; D],
        n_ranks: [usize; D],
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExtentMode {
    Discovered,
    Given,
    LocalSizes,
}

/// Everything the extent resolver learns about the calling rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedExtent<const D: usize> {
    pub partition: LocalPartition<D>,
    pub grid: ProcessGrid<D>,
    pub sizes: LocalSizesOnRanks<D>,
    pub mode: ExtentMode,
}

pub struct LocalExtentResolver<'a, C, T> {
    comm: &'a C,
    discovery: &'a T,
    dofs_per_node: usize,
}

impl<'a, C, T> LocalExtentResolver<'a, C, T>
where
    C: Communicator,
    T: TopologyDiscovery,
{
    pub fn new(comm: &'a C, discovery: &'a T) -> Self {
        Self {
            comm,
            discovery,
            dofs_per_node: 1,
        }
    }

    /// DOFs per node forwarded to the discovery service.
    pub fn with_dofs_per_node(mut self, dofs_per_node: usize) -> Self {
        self.dofs_per_node = dofs_per_node;
        self
    }

    pub fn resolve<const D: usize>(
        &self,
        input: &PartitionInput<D>,
    ) -> Result<ResolvedExtent<D>, DecompError> {
        match *input {
            PartitionInput::Discover {
                n_elements_global,
                n_ranks,
            } => self.discover(n_elements_global, n_ranks),
            PartitionInput::Given {
                n_elements_global,
                n_elements_local,
                begin_element_global,
                n_ranks,
            } => self.given(n_elements_global, n_elements_local, begin_element_global, n_ranks),
            PartitionInput::LocalSizes {
                n_elements_local,
                n_ranks,
            } => self.from_local_sizes(n_elements_local, n_ranks),
        }
    }

    fn discover<const D: usize>(
        &self,
        n_elements_global: [usize; D],
        n_ranks: Option<[usize; D]>,
    ) -> Result<ResolvedExtent<D>, DecompError> {
        let mut request = DiscoveryRequest::new(n_elements_global, self.comm.size(), self.comm.rank())
            .with_dofs_per_node(self.dofs_per_node);
        request.n_ranks = n_ranks;
        let layout = self.discovery.discover(&request)?;
        if layout.grid.rank_no() != self.comm.rank() || layout.grid.n_workers() != self.comm.size() {
            return Err(DecompError::CollectiveMismatch(format!(
                "discovery placed rank {} of {} but the communicator has rank {} of {}",
                layout.grid.rank_no(),
                layout.grid.n_workers(),
                self.comm.rank(),
                self.comm.size()
            )));
        }
        let partition = LocalPartition::new(
            n_elements_global,
            layout.begin_element_global,
            layout.n_elements_local,
        )?;
        Ok(ResolvedExtent {
            partition,
            grid: layout.grid,
            sizes: layout.sizes,
            mode: ExtentMode::Discovered,
        })
    }

    fn given<const D: usize>(
        &self,
        n_elements_global: [usize; D],
        n_elements_local: [usize; D],
        begin_element_global: [usize; D],
        n_ranks: [usize; D],
    ) -> Result<ResolvedExtent<D>, DecompError> {
        let grid = ProcessGrid::given(n_ranks, self.comm.size(), self.comm.rank())?;
        // no rank-local early return before the all-gather: every rank checks
        // the gathered boxes of all ranks and fails with the same error
        let entries = self.gather_entries(&grid, |d| AxisEntry {
            n_local: n_elements_local[d],
            begin: begin_element_global[d],
            n_global: n_elements_global[d],
        })?;
        let sizes = check_given_boxes(&grid, &entries)?;
        let partition = LocalPartition::new(n_elements_global, begin_element_global, n_elements_local)?;
        Ok(ResolvedExtent {
            partition,
            grid,
            sizes,
            mode: ExtentMode::Given,
        })
    }

    fn from_local_sizes<const D: usize>(
        &self,
        n_elements_local: [usize; D],
        n_ranks: [usize; D],
    ) -> Result<ResolvedExtent<D>, DecompError> {
        let grid = ProcessGrid::given(n_ranks, self.comm.size(), self.comm.rank())?;
        let entries = self.gather_entries(&grid, |d| AxisEntry {
            n_local: n_elements_local[d],
            begin: 0,
            n_global: 0,
        })?;
        let sizes = slab_sizes(&grid, &entries)?;
        let n_elements_global = std::array::from_fn(|d| sizes.n_elements_global(d));
        let (begin_element_global, _) = sizes.element_box(grid.rank_coord())?;
        let partition = LocalPartition::new(n_elements_global, begin_element_global, n_elements_local)?;
        Ok(ResolvedExtent {
            partition,
            grid,
            sizes,
            mode: ExtentMode::LocalSizes,
        })
    }

    /// One all-gather per axis of every rank's `(local, begin, global)` entry.
    fn gather_entries<const D: usize>(
        &self,
        grid: &ProcessGrid<D>,
        entry: impl Fn(usize) -> AxisEntry,
    ) -> Result<[Vec<AxisEntry>; D], DecompError> {
        let mut gathered: [Vec<AxisEntry>; D] = std::array::from_fn(|_| Vec::new());
        for (d, slot) in gathered.iter_mut().enumerate() {
            log::debug!("rank {}: all-gather of local sizes along axis {d}", grid.rank_no());
            let own = entry(d);
            let raw = self.comm.allgather_sizes(&[own.n_local, own.begin, own.n_global])?;
            if raw.len() != AxisEntry::WIDTH * grid.n_workers() {
                return Err(DecompError::CollectiveMismatch(format!(
                    "gathered {} values along axis {d}, expected {}",
                    raw.len(),
                    AxisEntry::WIDTH * grid.n_workers()
                )));
            }
            *slot = raw
                .chunks_exact(AxisEntry::WIDTH)
                .map(|c| AxisEntry {
                    n_local: c[0],
                    begin: c[1],
                    n_global: c[2],
                })
                .collect();
        }
        Ok(gathered)
    }
}

/// What one rank contributes to the all-gather along one axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct AxisEntry {
    n_local: usize,
    begin: usize,
    n_global: usize,
}

impl AxisEntry {
    const WIDTH: usize = 3;
}

/// Per-axis size lists from the gathered entries. All ranks in one slab
/// (same coordinate along an axis) must hold the same element count.
fn slab_sizes<const D: usize>(
    grid: &ProcessGrid<D>,
    entries: &[Vec<AxisEntry>; D],
) -> Result<LocalSizesOnRanks<D>, DecompError> {
    for (axis, along) in entries.iter().enumerate() {
        if let Some(rank) = along.iter().position(|e| e.n_local == 0) {
            return Err(DecompError::EmptyPartition { rank, axis });
        }
    }
    let mut lists: [Vec<usize>; D] = std::array::from_fn(|_| Vec::new());
    for d in 0..D {
        let along: Vec<usize> = (0..grid.n_ranks_along(d))
            .map(|c| {
                let mut coord = [0; D];
                coord[d] = c;
                entries[d][grid.rank_no_of(&coord)].n_local
            })
            .collect();
        for (rank, e) in entries[d].iter().enumerate() {
            let c = grid.coord_of(rank)[d];
            if e.n_local != along[c] {
                return Err(DecompError::CoverViolation {
                    axis: d,
                    reason: format!(
                        "rank {rank} holds {} elements, other ranks at coordinate {c} hold {}",
                        e.n_local, along[c]
                    ),
                });
            }
        }
        log::trace!("axis {d}: local sizes on ranks {along:?}");
        lists[d] = along;
    }
    LocalSizesOnRanks::new(lists)
}

/// Check the gathered given-mode boxes of all ranks for an exact cover.
fn check_given_boxes<const D: usize>(
    grid: &ProcessGrid<D>,
    entries: &[Vec<AxisEntry>; D],
) -> Result<LocalSizesOnRanks<D>, DecompError> {
    for (axis, along) in entries.iter().enumerate() {
        let declared = along[0].n_global;
        for (rank, e) in along.iter().enumerate() {
            if e.n_global == 0 {
                return Err(DecompError::EmptyDomain { axis });
            }
            if e.n_global != declared {
                return Err(DecompError::CoverViolation {
                    axis,
                    reason: format!(
                        "rank {rank} declares nElementsGlobal {}, rank 0 declares {declared}",
                        e.n_global
                    ),
                });
            }
            if e.begin.checked_add(e.n_local).is_none_or(|end| end > e.n_global) {
                return Err(DecompError::PartitionExceedsDomain {
                    axis,
                    begin: e.begin,
                    n_local: e.n_local,
                    n_global: e.n_global,
                });
            }
        }
    }
    let sizes = slab_sizes(grid, entries)?;
    for (axis, along) in entries.iter().enumerate() {
        let total = sizes.n_elements_global(axis);
        if total != along[0].n_global {
            return Err(DecompError::CoverViolation {
                axis,
                reason: format!(
                    "local sizes {:?} add up to {total}, nElementsGlobal is {}",
                    sizes.along(axis),
                    along[0].n_global
                ),
            });
        }
        for (rank, e) in along.iter().enumerate() {
            let expected_begin = sizes.begin_element(axis, grid.coord_of(rank)[axis]);
            if expected_begin != e.begin {
                return Err(DecompError::CoverViolation {
                    axis,
                    reason: format!(
                        "rank {rank} starts at element {}, the ranks before it end at {expected_begin}",
                        e.begin
                    ),
                });
            }
        }
    }
    Ok(sizes)
}
