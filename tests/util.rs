#![allow(dead_code)]
use mesh_decomp::algs::communicator::ThreadComm;
use mesh_decomp::data::global_map::InMemoryBackend;
use mesh_decomp::decomp_error::DecompError;
use mesh_decomp::partition::{BasisLayout, PartitionInput, StructuredPartition};
use mesh_decomp::topology::BlockDiscovery;

/// Run `f` once per rank of a fresh `ThreadComm` group, one thread per rank.
/// Results are indexed by rank.
pub fn run_ranks<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(ThreadComm) -> R + Sync,
{
    let comms = ThreadComm::group(n);
    std::thread::scope(|s| {
        let f = &f;
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| s.spawn(move || f(comm)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank thread panicked"))
            .collect()
    })
}

/// Build a structured partition on every rank of an `n`-rank group.
pub fn structured_on_ranks<const D: usize>(
    n: usize,
    input: PartitionInput<D>,
    basis: BasisLayout,
) -> Vec<Result<StructuredPartition<D>, DecompError>> {
    run_ranks(n, |comm| {
        StructuredPartition::new(&input, basis, &comm, &BlockDiscovery, &InMemoryBackend::new(&comm))
    })
}

/// Discover-mode partitions of `n_elements_global` over `n` ranks; panics on error.
pub fn discover<const D: usize>(
    n: usize,
    n_elements_global: [usize; D],
    basis: BasisLayout,
) -> Vec<StructuredPartition<D>> {
    structured_on_ranks(
        n,
        PartitionInput::Discover {
            n_elements_global,
            n_ranks: None,
        },
        basis,
    )
    .into_iter()
    .map(|r| r.expect("partition construction failed"))
    .collect()
}

/// Global buffer in natural order where every value encodes its own index.
pub fn natural_buffer(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64 * 0.5 + 1.0).collect()
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}
