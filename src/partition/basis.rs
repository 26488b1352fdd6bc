//! Basis-geometry descriptor consumed by the DOF index builder.

use serde::{Deserialize, Serialize};

/// How a finite-element basis places nodes and DOFs on a structured grid.
///
/// `nodes_per_element_along_axis` is the number of nodes an element adds
/// along one axis (the shared node on the element boundary is counted once),
/// so an axis with `n` elements carries `n * nodes_per_element_along_axis + 1`
/// nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasisLayout {
    pub nodes_per_element_along_axis: usize,
    pub dofs_per_node: usize,
}

impl BasisLayout {
    pub const fn new(nodes_per_element_along_axis: usize, dofs_per_node: usize) -> Self {
        Self {
            nodes_per_element_along_axis,
            dofs_per_node,
        }
    }

    /// Linear Lagrange: one node per element and axis, one DOF per node.
    pub const fn lagrange_linear() -> Self {
        Self::new(1, 1)
    }

    /// Quadratic Lagrange: mid-edge nodes, one DOF per node.
    pub const fn lagrange_quadratic() -> Self {
        Self::new(2, 1)
    }

    /// Cubic Hermite in `dim` dimensions: a value plus `2^dim - 1` derivatives per node.
    pub const fn hermite_cubic(dim: usize) -> Self {
        Self::new(1, 1 << dim)
    }
}

impl Default for BasisLayout {
    fn default() -> Self {
        Self::lagrange_linear()
    }
}
