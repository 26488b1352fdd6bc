//! Per-axis lists of local element counts, indexed by rank coordinate.
//!
//! Once gathered, these lists are enough to reconstruct the element box of
//! every rank (and therefore ghost ownership and per-rank DOF offsets)
//! without any further communication.

use crate::decomp_error::DecompError;
use crate::topology::process_grid::block_sizes;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalSizesOnRanks<const D: usize> {
    sizes: [Vec<usize>; D],
}

impl<const D: usize> LocalSizesOnRanks<D> {
    /// Wrap explicit per-axis lists. Every entry must be at least one.
    pub fn new(sizes: [Vec<usize>; D]) -> Result<Self, DecompError> {
        for (axis, list) in sizes.iter().enumerate() {
            if list.is_empty() {
                return Err(DecompError::CoverViolation {
                    axis,
                    reason: "no ranks along axis".into(),
                });
            }
            if let Some(coord) = list.iter().position(|&n| n == 0) {
                return Err(DecompError::CoverViolation {
                    axis,
                    reason: format!("rank coordinate {coord} holds no elements"),
                });
            }
        }
        Ok(Self { sizes })
    }

    /// Contiguous block split of each axis over `n_ranks[d]` ranks.
    pub fn from_blocks(n_elements_global: &[usize; D], n_ranks: &[usize; D]) -> Result<Self, DecompError> {
        Self::new(std::array::from_fn(|d| block_sizes(n_elements_global[d], n_ranks[d])))
    }

    /// Local element counts along `axis`, indexed by rank coordinate.
    pub fn along(&self, axis: usize) -> &[usize] {
        &self.sizes[axis]
    }

    pub fn n_ranks(&self) -> [usize; D] {
        std::array::from_fn(|d| self.sizes[d].len())
    }

    /// Global element count along `axis`.
    pub fn n_elements_global(&self, axis: usize) -> usize {
        self.sizes[axis].iter().sum()
    }

    /// First global element along `axis` of the rank at coordinate `coord`.
    pub fn begin_element(&self, axis: usize, coord: usize) -> usize {
        self.sizes[axis][..coord].iter().sum()
    }

    /// `(beginElementGlobal, nElementsLocal)` of the rank at `coord`.
    pub fn element_box(&self, coord: &[usize; D]) -> Result<([usize; D], [usize; D]), DecompError> {
        for d in 0..D {
            if coord[d] >= self.sizes[d].len() {
                return Err(DecompError::IndexOutOfRange {
                    index: coord[d],
                    len: self.sizes[d].len(),
                });
            }
        }
        Ok((
            std::array::from_fn(|d| self.begin_element(d, coord[d])),
            std::array::from_fn(|d| self.sizes[d][coord[d]]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxes_from_blocks() {
        let sizes = LocalSizesOnRanks::from_blocks(&[10, 4], &[3, 2]).unwrap();
        assert_eq!(sizes.along(0), &[4, 3, 3]);
        assert_eq!(sizes.along(1), &[2, 2]);
        assert_eq!(sizes.n_ranks(), [3, 2]);
        assert_eq!(sizes.element_box(&[2, 1]).unwrap(), ([7, 2], [3, 2]));
        assert_eq!(sizes.n_elements_global(0), 10);
    }

    #[test]
    fn zero_sized_rank_is_a_cover_violation() {
        let err = LocalSizesOnRanks::<1>::new([vec![3, 0]]).unwrap_err();
        assert!(matches!(err, DecompError::CoverViolation { axis: 0, .. }));
    }

    #[test]
    fn out_of_grid_coordinate() {
        let sizes = LocalSizesOnRanks::<1>::new([vec![3, 2]]).unwrap();
        assert_eq!(
            sizes.element_box(&[2]).unwrap_err(),
            DecompError::IndexOutOfRange { index: 2, len: 2 }
        );
    }
}
