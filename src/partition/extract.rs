//! Extraction of the local part of a global, naturally ordered buffer.
//!
//! Global buffers (initial values, files, configuration) list nodes in
//! natural order with `n_components` values (or `dofs_per_node` DOFs) per
//! node. The extraction functions are pure and never truncate: a buffer that
//! ends before the highest required index is a [`DecompError::BufferTooSmall`].

use crate::decomp_error::DecompError;
use crate::partition::structured::StructuredPartition;

impl<const D: usize> StructuredPartition<D> {
    /// Values of the ghosted node box, box order, components interleaved.
    pub fn extract_local_nodes<T: Copy>(
        &self,
        buffer: &[T],
        n_components: usize,
    ) -> Result<Vec<T>, DecompError> {
        gather_nodes(&self.node_nos_global_natural(true), buffer, n_components)
    }

    /// Values of the owned node box, box order, components interleaved.
    pub fn extract_local_nodes_without_ghosts<T: Copy>(
        &self,
        buffer: &[T],
        n_components: usize,
    ) -> Result<Vec<T>, DecompError> {
        gather_nodes(&self.node_nos_global_natural(false), buffer, n_components)
    }

    /// Owned DOFs from a buffer in natural DOF order.
    ///
    /// The result is in local DOF numbering (the first
    /// `n_dofs_local_without_ghosts` entries of a local vector).
    pub fn extract_local_dofs_without_ghosts<T: Copy>(&self, buffer: &[T]) -> Result<Vec<T>, DecompError> {
        gather_nodes(
            &self.node_nos_global_natural(false),
            buffer,
            self.basis().dofs_per_node,
        )
    }

    /// Owned and ghost DOFs from a buffer in natural DOF order, placed at
    /// their local DOF numbers.
    pub fn extract_local_dofs_with_ghosts<T: Copy>(&self, buffer: &[T]) -> Result<Vec<T>, DecompError> {
        let dpn = self.basis().dofs_per_node;
        let in_box_order = gather_nodes(&self.node_nos_global_natural(true), buffer, dpn)?;
        let dof_nos_local = self.dof_nos_local(false);
        let mut local = in_box_order.clone();
        for (&value, &slot) in in_box_order.iter().zip(dof_nos_local) {
            local[slot] = value;
        }
        Ok(local)
    }
}

fn gather_nodes<T: Copy>(
    nodes: &[usize],
    buffer: &[T],
    n_components: usize,
) -> Result<Vec<T>, DecompError> {
    let required = nodes
        .iter()
        .max()
        .map_or(0, |&max| (max + 1) * n_components);
    if buffer.len() < required {
        return Err(DecompError::BufferTooSmall {
            required,
            len: buffer.len(),
        });
    }
    let mut out = Vec::with_capacity(nodes.len() * n_components);
    for &node in nodes {
        out.extend_from_slice(&buffer[node * n_components..(node + 1) * n_components]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_stay_interleaved() {
        let buffer = [0, 1, 10, 11, 20, 21, 30, 31];
        assert_eq!(gather_nodes(&[2, 0], &buffer, 2).unwrap(), vec![20, 21, 0, 1]);
        assert!(gather_nodes(&[1, 2], &buffer, 0).unwrap().is_empty());
    }

    #[test]
    fn short_buffer_is_an_error() {
        let buffer = [0.0_f64; 7];
        assert_eq!(
            gather_nodes(&[0, 3], &buffer, 2).unwrap_err(),
            DecompError::BufferTooSmall { required: 8, len: 7 }
        );
    }
}
