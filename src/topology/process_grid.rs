//! Cartesian process grid of a structured decomposition.
//!
//! A [`ProcessGrid`] records how many ranks sit along each axis and where the
//! calling rank sits. Rank numbers map to coordinates with axis 0 varying
//! fastest, the same convention as the node and element boxes.

use crate::decomp_error::DecompError;
use crate::topology::dim::{Dim, linear_index, unravel_index, volume};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessGrid<const D: usize> {
    n_ranks: [usize; D],
    rank_coord: [usize; D],
    rank_no: usize,
}

impl<const D: usize> ProcessGrid<D> {
    /// Grid with a caller-fixed number of ranks per axis (no balancing).
    pub fn given(n_ranks: [usize; D], n_workers: usize, rank_no: usize) -> Result<Self, DecompError> {
        let () = Dim::<D>::CHECK;
        let product = volume(&n_ranks);
        if product != n_workers || product == 0 {
            return Err(DecompError::RankCountMismatch {
                n_ranks: n_ranks.to_vec(),
                product,
                n_workers,
            });
        }
        if rank_no >= n_workers {
            return Err(DecompError::IndexOutOfRange {
                index: rank_no,
                len: n_workers,
            });
        }
        Ok(Self {
            n_ranks,
            rank_coord: unravel_index(rank_no, &n_ranks),
            rank_no,
        })
    }

    /// Grid whose per-axis rank counts are balanced against the element counts.
    pub fn balanced(
        n_elements_global: &[usize; D],
        n_workers: usize,
        rank_no: usize,
    ) -> Result<Self, DecompError> {
        let n_ranks = balance_ranks(n_elements_global, n_workers)?;
        Self::given(n_ranks, n_workers, rank_no)
    }

    pub fn n_ranks(&self) -> &[usize; D] {
        &self.n_ranks
    }

    pub fn n_ranks_along(&self, axis: usize) -> usize {
        self.n_ranks[axis]
    }

    pub fn rank_coord(&self) -> &[usize; D] {
        &self.rank_coord
    }

    pub fn rank_no(&self) -> usize {
        self.rank_no
    }

    pub fn n_workers(&self) -> usize {
        volume(&self.n_ranks)
    }

    /// Rank number of the process at `coord`.
    pub fn rank_no_of(&self, coord: &[usize; D]) -> usize {
        linear_index(coord, &self.n_ranks)
    }

    /// Grid coordinate of rank `rank_no`.
    pub fn coord_of(&self, rank_no: usize) -> [usize; D] {
        unravel_index(rank_no, &self.n_ranks)
    }

    /// Whether the calling rank is the last one along `axis`.
    pub fn is_last_along(&self, axis: usize) -> bool {
        self.rank_coord[axis] + 1 == self.n_ranks[axis]
    }
}

/// Split `n` items into `parts` contiguous blocks; the first `n % parts`
/// blocks get one extra item.
pub fn block_sizes(n: usize, parts: usize) -> Vec<usize> {
    if parts == 0 {
        return Vec::new();
    }
    let base = n / parts;
    let residual = n % parts;
    (0..parts).map(|i| base + usize::from(i < residual)).collect()
}

/// Begin of block `i` of [`block_sizes`]`(n, parts)`.
pub fn block_begin(n: usize, parts: usize, i: usize) -> usize {
    let base = n / parts;
    let residual = n % parts;
    i * base + residual.min(i)
}

/// (largest local element box, total interface area)
type Score = (usize, usize);

fn score<const D: usize>(n_elements: &[usize; D], n_ranks: &[usize; D]) -> Score {
    let largest_box = (0..D)
        .map(|d| n_elements[d].div_ceil(n_ranks[d]))
        .product();
    let interface = (0..D)
        .map(|d| {
            let face: usize = (0..D).filter(|&e| e != d).map(|e| n_elements[e]).product();
            (n_ranks[d] - 1) * face
        })
        .sum();
    (largest_box, interface)
}

fn search<const D: usize>(
    axis: usize,
    remaining: usize,
    n_elements: &[usize; D],
    current: &mut [usize; D],
    best: &mut Option<(Score, [usize; D])>,
) {
    if axis + 1 == D {
        if remaining <= n_elements[axis] {
            current[axis] = remaining;
            let s = score(n_elements, current);
            if best.as_ref().is_none_or(|(b, _)| s < *b) {
                *best = Some((s, *current));
            }
        }
        return;
    }
    for f in (1..=remaining.min(n_elements[axis])).filter(|f| remaining % f == 0) {
        current[axis] = f;
        search(axis + 1, remaining / f, n_elements, current, best);
    }
}

/// Number of ranks per axis for `n_workers` processes over `n_elements_global`.
///
/// Among all ordered factorizations with at least one element per rank and
/// axis, the one with the smallest largest local box wins, then the one with
/// the smallest interface area; remaining ties keep the lexicographically
/// first factorization.
pub fn balance_ranks<const D: usize>(
    n_elements_global: &[usize; D],
    n_workers: usize,
) -> Result<[usize; D], DecompError> {
    let () = Dim::<D>::CHECK;
    if let Some(axis) = n_elements_global.iter().position(|&n| n == 0) {
        return Err(DecompError::EmptyDomain { axis });
    }
    let mut best = None;
    if n_workers > 0 {
        search(0, n_workers, n_elements_global, &mut [1; D], &mut best);
    }
    let (score, n_ranks) = best.ok_or_else(|| DecompError::NoBalancedFactorization {
        n_workers,
        n_elements_global: n_elements_global.to_vec(),
    })?;
    log::debug!(
        "balanced {n_workers} worker(s) over {n_elements_global:?} as {n_ranks:?} \
         (largest box {}, interface {})",
        score.0,
        score.1
    );
    Ok(n_ranks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_domain_gets_square_grid() {
        assert_eq!(balance_ranks(&[4, 4], 4).unwrap(), [2, 2]);
        assert_eq!(balance_ranks(&[10], 2).unwrap(), [2]);
        assert_eq!(balance_ranks(&[8, 8, 8], 8).unwrap(), [2, 2, 2]);
    }

    #[test]
    fn elongated_domain_splits_long_axis() {
        assert_eq!(balance_ranks(&[100, 2], 4).unwrap(), [4, 1]);
        assert_eq!(balance_ranks(&[2, 2, 60], 6).unwrap(), [1, 1, 6]);
    }

    #[test]
    fn prime_worker_count_uses_one_axis() {
        let n_ranks = balance_ranks(&[6, 6], 5).unwrap();
        assert_eq!(volume(&n_ranks), 5);
        assert!(n_ranks.contains(&1));
    }

    #[test]
    fn too_many_workers_is_rejected() {
        let err = balance_ranks(&[2, 1], 3).unwrap_err();
        assert!(matches!(err, DecompError::NoBalancedFactorization { n_workers: 3, .. }));
        assert!(matches!(
            balance_ranks(&[3, 0], 1),
            Err(DecompError::EmptyDomain { axis: 1 })
        ));
    }

    #[test]
    fn given_grid_must_match_worker_count() {
        let err = ProcessGrid::<2>::given([2, 3], 4, 0).unwrap_err();
        assert_eq!(
            err,
            DecompError::RankCountMismatch {
                n_ranks: vec![2, 3],
                product: 6,
                n_workers: 4
            }
        );
    }

    #[test]
    fn rank_numbers_map_to_coordinates() {
        let grid = ProcessGrid::<3>::given([2, 3, 2], 12, 7).unwrap();
        assert_eq!(grid.rank_coord(), &[1, 0, 1]);
        assert_eq!(grid.rank_no_of(&[1, 0, 1]), 7);
        assert!(grid.is_last_along(0));
        assert!(!grid.is_last_along(1));
        assert!(grid.is_last_along(2));
        for r in 0..12 {
            assert_eq!(grid.rank_no_of(&grid.coord_of(r)), r);
        }
    }

    #[test]
    fn blocks_cover_and_front_load_residual() {
        assert_eq!(block_sizes(10, 3), vec![4, 3, 3]);
        assert_eq!(
            (0..3).map(|i| block_begin(10, 3, i)).collect::<Vec<_>>(),
            vec![0, 4, 7]
        );
        assert_eq!(block_sizes(5, 5), vec![1; 5]);
    }
}
