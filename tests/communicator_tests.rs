mod util;

use std::time::Duration;

use mesh_decomp::algs::communicator::{CommTag, Communicator, ThreadComm, Wait};
use mesh_decomp::algs::sub_comm::SubComm;
use mesh_decomp::decomp_error::DecompError;
use util::run_ranks;

#[test]
fn thread_round_trip() {
    let tag = CommTag::new(0x1000);
    let comms = ThreadComm::group(2);
    comms[0].isend(1, tag.as_u16(), b"hello");
    let mut buf = [0u8; 5];
    let got = comms[1].irecv(0, tag.as_u16(), &mut buf).wait().unwrap();
    assert_eq!(&got, b"hello");
}

#[test]
fn collectives_over_a_rank_subset() {
    let results = run_ranks(4, |comm| {
        let parent_rank = comm.rank();
        SubComm::new(&comm, vec![0, 2, 3]).unwrap().map(|sub| {
            let gathered = sub.allgather_sizes(&[parent_rank]).unwrap();
            let scan = sub.exscan_sum(parent_rank).unwrap();
            let total = sub.allreduce_sum(1).unwrap();
            sub.barrier().unwrap();
            (sub.rank(), gathered, scan, total)
        })
    });
    assert_eq!(results[1], None);
    assert_eq!(results[0], Some((0, vec![0, 2, 3], 0, 3)));
    assert_eq!(results[2], Some((1, vec![0, 2, 3], 0, 3)));
    assert_eq!(results[3], Some((2, vec![0, 2, 3], 2, 3)));
}

#[test]
fn missing_peer_times_out() {
    let comm = ThreadComm::group(2)
        .into_iter()
        .next()
        .unwrap()
        .with_timeout(Duration::from_millis(50));
    let err = comm.allreduce_sum(1).unwrap_err();
    assert!(matches!(err, DecompError::CommError { neighbor: 1, .. }), "{err}");
}
