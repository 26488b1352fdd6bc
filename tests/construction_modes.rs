mod util;

use mesh_decomp::algs::communicator::Communicator;
use mesh_decomp::data::global_map::InMemoryBackend;
use mesh_decomp::decomp_error::DecompError;
use mesh_decomp::partition::{
    BasisLayout, ExtentMode, PartitionInput, PartitionLayout, PartitionSettings, StructuredPartition,
};
use mesh_decomp::topology::BlockDiscovery;
use util::{run_ranks, structured_on_ranks};

#[test]
fn layout_round_trip_through_given_mode() {
    let results = run_ranks(4, |comm| {
        let basis = BasisLayout::lagrange_quadratic();
        let backend = InMemoryBackend::new(&comm);
        let discovered = StructuredPartition::new(
            &PartitionInput::Discover {
                n_elements_global: [5, 3],
                n_ranks: None,
            },
            basis,
            &comm,
            &BlockDiscovery,
            &backend,
        )
        .unwrap();

        let json = serde_json::to_string(&discovered.layout()).unwrap();
        let layout: PartitionLayout = serde_json::from_str(&json).unwrap();
        let given = StructuredPartition::new(
            &layout.into_input::<2>().unwrap(),
            basis,
            &comm,
            &BlockDiscovery,
            &backend,
        )
        .unwrap();
        (discovered, given)
    });
    for (discovered, given) in &results {
        assert_eq!(discovered.mode(), ExtentMode::Discovered);
        assert_eq!(given.mode(), ExtentMode::Given);
        assert_eq!(discovered.dof_index_set(), given.dof_index_set());
        assert_eq!(discovered.local_sizes_on_ranks(), given.local_sizes_on_ranks());
    }
}

#[test]
fn local_sizes_mode_derives_begins() {
    let sizes = [2, 5, 1];
    let parts = run_ranks(3, |comm| {
        let input = PartitionInput::LocalSizes {
            n_elements_local: [sizes[comm.rank()]],
            n_ranks: [3],
        };
        StructuredPartition::new(
            &input,
            BasisLayout::lagrange_linear(),
            &comm,
            &BlockDiscovery,
            &InMemoryBackend::new(&comm),
        )
        .unwrap()
    });
    let begins: Vec<_> = parts.iter().map(|p| p.begin_element_global()[0]).collect();
    assert_eq!(begins, vec![0, 2, 7]);
    let full: Vec<_> = parts.iter().map(|p| p.has_full_number_of_nodes()[0]).collect();
    assert_eq!(full, vec![false, false, true]);
    for p in &parts {
        assert_eq!(p.n_elements_global(), &[8]);
        assert_eq!(p.n_dofs_global(), 9);
        assert_eq!(p.mode(), ExtentMode::LocalSizes);
    }
    assert_eq!(parts[1].ghost_dof_global_nos(), &[7]);
}

#[test]
fn given_sizes_that_miss_the_domain_are_rejected() {
    let errors = run_ranks(2, |comm| {
        let (local, begin) = if comm.rank() == 0 { (5, 0) } else { (4, 5) };
        StructuredPartition::new(
            &PartitionInput::Given {
                n_elements_global: [10],
                n_elements_local: [local],
                begin_element_global: [begin],
                n_ranks: [2],
            },
            BasisLayout::lagrange_linear(),
            &comm,
            &BlockDiscovery,
            &InMemoryBackend::new(&comm),
        )
        .unwrap_err()
    });
    for err in errors {
        assert!(matches!(err, DecompError::CoverViolation { axis: 0, .. }), "{err}");
    }
}

#[test]
fn given_begins_must_match_the_prefix() {
    let errors = run_ranks(2, |comm| {
        let begin = if comm.rank() == 0 { 1 } else { 4 };
        StructuredPartition::new(
            &PartitionInput::Given {
                n_elements_global: [10],
                n_elements_local: [5],
                begin_element_global: [begin],
                n_ranks: [2],
            },
            BasisLayout::lagrange_linear(),
            &comm,
            &BlockDiscovery,
            &InMemoryBackend::new(&comm),
        )
        .unwrap_err()
    });
    for err in errors {
        assert!(matches!(err, DecompError::CoverViolation { axis: 0, .. }), "{err}");
    }
}

#[test]
fn one_rank_outside_the_domain_fails_every_rank() {
    let errors = run_ranks(2, |comm| {
        let begin = if comm.rank() == 0 { 0 } else { 6 };
        StructuredPartition::new(
            &PartitionInput::Given {
                n_elements_global: [10],
                n_elements_local: [5],
                begin_element_global: [begin],
                n_ranks: [2],
            },
            BasisLayout::lagrange_linear(),
            &comm,
            &BlockDiscovery,
            &InMemoryBackend::new(&comm),
        )
        .unwrap_err()
    });
    for err in errors {
        assert_eq!(
            err,
            DecompError::PartitionExceedsDomain {
                axis: 0,
                begin: 6,
                n_local: 5,
                n_global: 10
            }
        );
    }
}

#[test]
fn one_rank_with_an_empty_domain_fails_every_rank() {
    let errors = run_ranks(2, |comm| {
        let n_global = if comm.rank() == 1 { 0 } else { 10 };
        StructuredPartition::new(
            &PartitionInput::Given {
                n_elements_global: [n_global, 4],
                n_elements_local: [5, 4],
                begin_element_global: [5 * comm.rank(), 0],
                n_ranks: [2, 1],
            },
            BasisLayout::lagrange_linear(),
            &comm,
            &BlockDiscovery,
            &InMemoryBackend::new(&comm),
        )
        .unwrap_err()
    });
    for err in errors {
        assert_eq!(err, DecompError::EmptyDomain { axis: 0 });
    }
}

#[test]
fn one_empty_local_size_fails_every_rank() {
    let errors = run_ranks(3, |comm| {
        let n = if comm.rank() == 1 { 0 } else { 3 };
        StructuredPartition::new(
            &PartitionInput::LocalSizes {
                n_elements_local: [n],
                n_ranks: [3],
            },
            BasisLayout::lagrange_linear(),
            &comm,
            &BlockDiscovery,
            &InMemoryBackend::new(&comm),
        )
        .unwrap_err()
    });
    for err in errors {
        assert_eq!(err, DecompError::EmptyPartition { rank: 1, axis: 0 });
    }
}

#[test]
fn inconsistent_slab_is_rejected() {
    let errors = run_ranks(4, |comm| {
        let nx = if comm.rank() == 2 { 3 } else { 2 };
        StructuredPartition::new(
            &PartitionInput::LocalSizes {
                n_elements_local: [nx, 2],
                n_ranks: [2, 2],
            },
            BasisLayout::lagrange_linear(),
            &comm,
            &BlockDiscovery,
            &InMemoryBackend::new(&comm),
        )
        .unwrap_err()
    });
    for err in errors {
        assert!(matches!(err, DecompError::CoverViolation { axis: 0, .. }), "{err}");
    }
}

#[test]
fn configuration_errors_are_reported_on_every_rank() {
    let mismatched = structured_on_ranks(
        2,
        PartitionInput::Given {
            n_elements_global: [6],
            n_elements_local: [3],
            begin_element_global: [0],
            n_ranks: [3],
        },
        BasisLayout::lagrange_linear(),
    );
    for r in mismatched {
        assert!(matches!(r, Err(DecompError::RankCountMismatch { product: 3, n_workers: 2, .. })));
    }

    let too_many_ranks = structured_on_ranks(
        3,
        PartitionInput::Discover {
            n_elements_global: [2],
            n_ranks: None,
        },
        BasisLayout::lagrange_linear(),
    );
    for r in too_many_ranks {
        assert!(matches!(r, Err(DecompError::NoBalancedFactorization { n_workers: 3, .. })));
    }

    let settings = PartitionSettings {
        n_elements_global: vec![4, 4],
        ..Default::default()
    };
    assert!(matches!(
        settings.into_input::<1>(),
        Err(DecompError::DimensionMismatch { expected: 1, got: 2, .. })
    ));
}
