//! Structured-topology discovery: which box of elements belongs to a rank.
//!
//! [`TopologyDiscovery`] is the seam to a structured-grid service (a DMDA-like
//! component in a distributed linear-algebra stack). [`BlockDiscovery`] is the
//! built-in implementation: balanced process grid, contiguous blocks per axis.

use crate::decomp_error::DecompError;
use crate::topology::local_sizes::LocalSizesOnRanks;
use crate::topology::process_grid::ProcessGrid;

/// Input of a discovery query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryRequest<const D: usize> {
    pub n_elements_global: [usize; D],
    /// Fixed ranks per axis; `None` lets the service balance them.
    pub n_ranks: Option<[usize; D]>,
    pub ghost_width: usize,
    /// DOFs carried by every node; block splitting does not depend on it.
    pub dofs_per_node: usize,
    pub n_workers: usize,
    pub rank_no: usize,
}

impl<const D: usize> DiscoveryRequest<D> {
    pub fn new(n_elements_global: [usize; D], n_workers: usize, rank_no: usize) -> Self {
        Self {
            n_elements_global,
            n_ranks: None,
            ghost_width: 1,
            dofs_per_node: 1,
            n_workers,
            rank_no,
        }
    }

    pub fn with_n_ranks(mut self, n_ranks: [usize; D]) -> Self {
        self.n_ranks = Some(n_ranks);
        self
    }

    pub fn with_dofs_per_node(mut self, dofs_per_node: usize) -> Self {
        self.dofs_per_node = dofs_per_node;
        self
    }
}

/// Answer of a discovery query for the calling rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredLayout<const D: usize> {
    pub begin_element_global: [usize; D],
    pub n_elements_local: [usize; D],
    pub grid: ProcessGrid<D>,
    pub sizes: LocalSizesOnRanks<D>,
}

pub trait TopologyDiscovery {
    fn discover<const D: usize>(
        &self,
        request: &DiscoveryRequest<D>,
    ) -> Result<DiscoveredLayout<D>, DecompError>;
}

/// Balanced process grid with contiguous per-axis blocks.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockDiscovery;

impl TopologyDiscovery for BlockDiscovery {
    fn discover<const D: usize>(
        &self,
        request: &DiscoveryRequest<D>,
    ) -> Result<DiscoveredLayout<D>, DecompError> {
        if request.ghost_width != 1 {
            return Err(DecompError::UnsupportedGhostWidth(request.ghost_width));
        }
        if let Some(axis) = request.n_elements_global.iter().position(|&n| n == 0) {
            return Err(DecompError::EmptyDomain { axis });
        }
        let grid = match request.n_ranks {
            Some(n_ranks) => ProcessGrid::given(n_ranks, request.n_workers, request.rank_no)?,
            None => ProcessGrid::balanced(
                &request.n_elements_global,
                request.n_workers,
                request.rank_no,
            )?,
        };
        for d in 0..D {
            if grid.n_ranks_along(d) > request.n_elements_global[d] {
                return Err(DecompError::NoBalancedFactorization {
                    n_workers: request.n_workers,
                    n_elements_global: request.n_elements_global.to_vec(),
                });
            }
        }
        let sizes = LocalSizesOnRanks::from_blocks(&request.n_elements_global, grid.n_ranks())?;
        let (begin_element_global, n_elements_local) = sizes.element_box(grid.rank_coord())?;

        let largest: usize = (0..D).map(|d| sizes.along(d)[0]).product();
        let smallest: usize = (0..D)
            .map(|d| sizes.along(d).last().copied().unwrap_or(1))
            .product();
        if largest > 2 * smallest {
            log::warn!(
                "structured decomposition is unbalanced: largest local box {largest} elements, \
                 smallest {smallest} (grid {:?})",
                grid.n_ranks()
            );
        }

        Ok(DiscoveredLayout {
            begin_element_global,
            n_elements_local,
            grid,
            sizes,
        })
    }
}
