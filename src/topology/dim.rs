//! Dimension helpers shared by the structured decomposition.
//!
//! Boxes are enumerated in row-major order with axis 0 varying fastest and
//! axis `D-1` outermost; linear indices follow the same convention.

/// Compile-time guard: only 1-, 2- and 3-dimensional meshes are supported.
pub struct Dim<const D: usize>;

impl<const D: usize> Dim<D> {
    pub const CHECK: () = assert!(D >= 1 && D <= 3, "structured meshes have 1, 2 or 3 axes");
}

/// Product of all extents.
#[inline]
pub fn volume<const D: usize>(extent: &[usize; D]) -> usize {
    extent.iter().product()
}

/// Linear row-major index of `idx` inside a box of size `extent`.
#[inline]
pub fn linear_index<const D: usize>(idx: &[usize; D], extent: &[usize; D]) -> usize {
    let mut linear = 0;
    for d in (0..D).rev() {
        linear = linear * extent[d] + idx[d];
    }
    linear
}

/// Inverse of [`linear_index`].
#[inline]
pub fn unravel_index<const D: usize>(mut linear: usize, extent: &[usize; D]) -> [usize; D] {
    let mut idx = [0; D];
    for d in 0..D {
        idx[d] = linear % extent[d];
        linear /= extent[d];
    }
    idx
}

/// Visit every multi-index of a box of size `extent` in canonical order.
pub fn for_each_in_box<const D: usize>(extent: &[usize; D], mut f: impl FnMut(&[usize; D])) {
    if extent.iter().any(|&n| n == 0) {
        return;
    }
    let mut idx = [0usize; D];
    loop {
        f(&idx);
        // odometer increment, axis 0 fastest
        let mut d = 0;
        loop {
            idx[d] += 1;
            if idx[d] < extent[d] {
                break;
            }
            idx[d] = 0;
            d += 1;
            if d == D {
                return;
            }
        }
    }
}
