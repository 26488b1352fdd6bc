//! Invariant checks for immutable index structures.
//!
//! Checks are cheap enough to run on every construction in debug builds; in
//! release builds they only run with the `strict-invariants` or
//! `check-invariants` feature.

use crate::decomp_error::DecompError;

/// Types that can validate their structural invariants.
pub trait DebugInvariants {
    /// Panic on a violated invariant when invariant checking is enabled.
    fn debug_assert_invariants(&self);
    /// Validate invariants and return the first violation.
    fn validate_invariants(&self) -> Result<(), DecompError>;
}

/// Check that `values` is a permutation of `0..values.len()`.
pub fn check_permutation(values: &[usize]) -> Result<(), DecompError> {
    let len = values.len();
    let mut seen = vec![false; len];
    for &v in values {
        match seen.get_mut(v) {
            Some(slot) if !*slot => *slot = true,
            _ => return Err(DecompError::IndexOutOfRange { index: v, len }),
        }
    }
    Ok(())
}

/// Run a fallible check and panic on error when invariant checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
