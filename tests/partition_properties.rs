mod util;

use mesh_decomp::partition::{BasisLayout, StructuredPartition};
use mesh_decomp::topology::dim::{for_each_in_box, linear_index, volume};
use mesh_decomp::topology::process_grid::balance_ranks;
use mesh_decomp::DebugInvariants;
use proptest::prelude::*;
use util::{discover, natural_buffer};

/// Every global element is owned by exactly one rank.
fn check_cover<const D: usize>(parts: &[StructuredPartition<D>]) {
    let n_global = *parts[0].n_elements_global();
    let mut hits = vec![0usize; volume(&n_global)];
    for p in parts {
        let begin = p.begin_element_global();
        for_each_in_box(p.n_elements_local(), |idx| {
            let global: [usize; D] = std::array::from_fn(|d| begin[d] + idx[d]);
            hits[linear_index(&global, &n_global)] += 1;
        });
    }
    assert!(hits.iter().all(|&h| h == 1), "element hits {hits:?}");
}

fn check_node_layers<const D: usize>(parts: &[StructuredPartition<D>]) {
    for p in parts {
        assert!(p.validate_invariants().is_ok());
        for d in 0..D {
            let full = p.has_full_number_of_nodes()[d];
            assert_eq!(full, p.rank_coord()[d] + 1 == p.n_ranks()[d]);
            let extra = p.n_nodes_local_with_ghosts()[d] - p.n_nodes_local_without_ghosts()[d];
            assert_eq!(extra, usize::from(!full));
        }
    }
}

fn check_ghost_ownership<const D: usize>(parts: &[StructuredPartition<D>]) {
    let n_dofs_global = parts[0].n_dofs_global();
    let owned: usize = parts.iter().map(|p| p.n_dofs_local_without_ghosts()).sum();
    assert_eq!(owned, n_dofs_global);
    assert_eq!(
        n_dofs_global,
        parts[0].n_nodes_global_total() * parts[0].basis().dofs_per_node
    );
    for p in parts {
        let own = p.begin_dof_global()..p.begin_dof_global() + p.n_dofs_local_without_ghosts();
        for &g in p.ghost_dof_global_nos() {
            assert!(!own.contains(&g), "ghost {g} inside owned range {own:?}");
            let owners = parts
                .iter()
                .filter(|q| (q.begin_dof_global()..q.begin_dof_global() + q.n_dofs_local_without_ghosts()).contains(&g))
                .count();
            assert_eq!(owners, 1);
        }
    }
}

/// Extracting every partition's ghosted node box reproduces the global buffer.
fn check_node_round_trip<const D: usize>(parts: &[StructuredPartition<D>], n_components: usize) {
    let buffer = natural_buffer(parts[0].n_nodes_global_total() * n_components);
    let mut rebuilt: Vec<Option<f64>> = vec![None; buffer.len()];
    for p in parts {
        let local = p.extract_local_nodes(&buffer, n_components).unwrap();
        let nodes = p.node_nos_global_natural(true);
        assert_eq!(local.len(), nodes.len() * n_components);
        for (i, &node) in nodes.iter().enumerate() {
            for k in 0..n_components {
                let value = local[i * n_components + k];
                let slot = &mut rebuilt[node * n_components + k];
                if let Some(prev) = *slot {
                    assert_eq!(prev, value, "shared node {node} disagrees");
                }
                *slot = Some(value);
            }
        }
    }
    let rebuilt: Vec<f64> = rebuilt.into_iter().map(|v| v.expect("node not covered")).collect();
    assert_eq!(rebuilt, buffer);
}

/// Local DOF vectors placed through the mapping agree on every global DOF.
fn check_mapping_consistency<const D: usize>(parts: &[StructuredPartition<D>]) {
    let dpn = parts[0].basis().dofs_per_node;
    let buffer = natural_buffer(parts[0].n_nodes_global_total() * dpn);
    let mut contiguous: Vec<Option<f64>> = vec![None; parts[0].n_dofs_global()];
    let mut counts = vec![0usize; parts[0].n_dofs_global()];
    for p in parts {
        let local = p.extract_local_dofs_with_ghosts(&buffer).unwrap();
        let owned = p.extract_local_dofs_without_ghosts(&buffer).unwrap();
        assert_eq!(&local[..owned.len()], owned.as_slice());

        let mapping = p.mapping().unwrap();
        assert_eq!(mapping.len(), local.len());
        for (i, &value) in local.iter().enumerate() {
            let g = mapping.apply(i).unwrap();
            if let Some(prev) = contiguous[g] {
                assert_eq!(prev, value, "global dof {g} disagrees");
            }
            contiguous[g] = Some(value);
        }
        mapping
            .scatter_add_to_global(&vec![1usize; local.len()], &mut counts)
            .unwrap();
    }
    assert!(contiguous.iter().all(Option::is_some));
    let stored: usize = parts.iter().map(|p| p.n_dofs_local_with_ghosts()).sum();
    assert_eq!(counts.iter().sum::<usize>(), stored);
    assert!(counts.iter().all(|&c| c >= 1));
}

fn check_all<const D: usize>(parts: &[StructuredPartition<D>]) {
    check_cover(parts);
    check_node_layers(parts);
    check_ghost_ownership(parts);
    check_node_round_trip(parts, 2);
    check_mapping_consistency(parts);
}

fn basis_preset() -> impl Strategy<Value = BasisLayout> {
    prop::sample::select(vec![
        BasisLayout::lagrange_linear(),
        BasisLayout::lagrange_quadratic(),
        BasisLayout::new(1, 2),
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn one_d_partitions(n in 1usize..20, workers in 1usize..6, basis in basis_preset()) {
        prop_assume!(balance_ranks(&[n], workers).is_ok());
        check_all(&discover(workers, [n], basis));
    }

    #[test]
    fn two_d_partitions(nx in 1usize..6, ny in 1usize..6, workers in 1usize..5, basis in basis_preset()) {
        prop_assume!(balance_ranks(&[nx, ny], workers).is_ok());
        check_all(&discover(workers, [nx, ny], basis));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn three_d_partitions(nx in 1usize..4, ny in 1usize..4, nz in 1usize..4, workers in 1usize..9) {
        prop_assume!(balance_ranks(&[nx, ny, nz], workers).is_ok());
        check_all(&discover(workers, [nx, ny, nz], BasisLayout::lagrange_linear()));
    }
}

#[test]
fn hermite_three_d_two_ranks() {
    check_all(&discover(2, [2, 2, 2], BasisLayout::hermite_cubic(3)));
}
