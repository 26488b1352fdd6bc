//! Thin façade over in-process (thread) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees). The
//! decomposition only needs a handful of synchronous collectives
//! (all-gather, exclusive scan, all-reduce, barrier); they have default
//! implementations on top of point-to-point messages so that every backend,
//! including rank-subset views, gets them for free. Backends with native
//! collectives (MPI) override them.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};

use crate::algs::wire::{cast_slice, decode_sizes, encode_sizes};
use crate::decomp_error::DecompError;

/// Typed message tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    /// Tag used by the default collective implementations.
    pub const COLLECTIVE: CommTag = CommTag(0x5100);

    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Communication interface used by every partition constructor.
///
/// All collectives are synchronous: every rank of the communicator must
/// call them in the same order with the same message shape.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// Rank of this process inside the communicator.
    fn rank(&self) -> usize;
    /// Number of ranks in the communicator.
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Gather `send` from every rank into `recv` (rank-major, equal chunks).
    fn allgather(&self, send: &[u8], recv: &mut [u8]) -> Result<(), DecompError> {
        let size = self.size().max(1);
        let me = self.rank();
        let n = send.len();
        if recv.len() != n * size {
            return Err(DecompError::CollectiveMismatch(format!(
                "allgather receive buffer holds {} bytes, expected {} ({size} ranks x {n})",
                recv.len(),
                n * size
            )));
        }
        let tag = CommTag::COLLECTIVE.as_u16();

        // sends first: backends with blocking receives must not deadlock
        let sends: Vec<_> = (0..size)
            .filter(|&peer| peer != me)
            .map(|peer| self.isend(peer, tag, send))
            .collect();
        let mut pending = Vec::with_capacity(size.saturating_sub(1));
        for peer in (0..size).filter(|&peer| peer != me) {
            let slot = &mut recv[peer * n..(peer + 1) * n];
            pending.push((peer, self.irecv(peer, tag, slot)));
        }
        recv[me * n..(me + 1) * n].copy_from_slice(send);

        let mut maybe_err = None;
        for (peer, handle) in pending {
            match handle.wait() {
                Some(data) if data.len() == n => {
                    recv[peer * n..(peer + 1) * n].copy_from_slice(&data);
                }
                Some(data) if maybe_err.is_none() => {
                    maybe_err = Some(DecompError::CommError {
                        neighbor: peer,
                        reason: format!("expected {n} bytes in allgather, got {}", data.len()),
                    });
                }
                None if maybe_err.is_none() => {
                    maybe_err = Some(DecompError::CommError {
                        neighbor: peer,
                        reason: "no data received in allgather".into(),
                    });
                }
                _ => {}
            }
        }
        for send in sends {
            let _ = send.wait();
        }
        match maybe_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Gather `values` from every rank; the result is rank-major.
    fn allgather_sizes(&self, values: &[usize]) -> Result<Vec<usize>, DecompError> {
        let wire = encode_sizes(values);
        let send = cast_slice(&wire);
        let mut recv = vec![0u8; send.len() * self.size().max(1)];
        self.allgather(send, &mut recv)?;
        decode_sizes(&recv)
    }

    /// Sum of `value` over all ranks below this one.
    fn exscan_sum(&self, value: usize) -> Result<usize, DecompError> {
        let all = self.allgather_sizes(&[value])?;
        Ok(all[..self.rank()].iter().sum())
    }

    /// Sum of `value` over all ranks.
    fn allreduce_sum(&self, value: usize) -> Result<usize, DecompError> {
        Ok(self.allgather_sizes(&[value])?.iter().sum())
    }

    fn barrier(&self) -> Result<(), DecompError> {
        self.allgather(&[], &mut []).map(|_| ())
    }
}

/// Compile-time no-op comm for pure serial runs and unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
}

// --- ThreadComm: one thread per rank inside a single process ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct Mailbox {
    slots: DashMap<Key, VecDeque<Bytes>>,
    lock: Mutex<()>,
    ready: Condvar,
}

impl Mailbox {
    fn post(&self, key: Key, data: Bytes) {
        self.slots.entry(key).or_default().push_back(data);
        let _guard = self.lock.lock();
        self.ready.notify_all();
    }

    fn pop(&self, key: &Key) -> Option<Bytes> {
        self.slots.get_mut(key).and_then(|mut queue| queue.pop_front())
    }

    fn take(&self, key: Key, timeout: Duration) -> Option<Bytes> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock();
        loop {
            if let Some(data) = self.pop(&key) {
                return Some(data);
            }
            if self.ready.wait_until(&mut guard, deadline).timed_out() {
                return self.pop(&key);
            }
        }
    }
}

/// Receive handle of a [`ThreadComm`]; the message is taken on `wait`.
pub struct ThreadRecvHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    timeout: Duration,
}

impl Wait for ThreadRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let data = self.mailbox.take(self.key, self.timeout);
        if data.is_none() {
            log::warn!(
                "ThreadComm: rank {} timed out waiting for rank {} (tag {:#x})",
                self.key.1,
                self.key.0,
                self.key.2
            );
        }
        data.map(|bytes| bytes.to_vec())
    }
}

/// In-process communicator: every rank is a thread, messages travel through
/// a mailbox shared by the ranks of one group only.
///
/// Messages between a pair of ranks with the same tag are delivered in FIFO
/// order. A receive that sees no message within the timeout yields no data,
/// which the collectives report as [`DecompError::CommError`].
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
    timeout: Duration,
}

impl ThreadComm {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create the communicators of a group of `size` ranks, indexed by rank.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
                timeout: Self::DEFAULT_TIMEOUT,
            })
            .collect()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = ThreadRecvHandle;

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        self.mailbox
            .post((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {
        ThreadRecvHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
            timeout: self.timeout,
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::collective::SystemOperation;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// MPI communicator. The caller initializes MPI (`mpi::initialize()`)
    /// and keeps the universe alive for as long as this value is used.
    pub struct MpiComm {
        comm: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn world() -> Self {
            Self::from_communicator(SimpleCommunicator::world())
        }

        pub fn from_communicator(comm: SimpleCommunicator) -> Self {
            let rank = comm.rank() as usize;
            let size = comm.size() as usize;
            Self { comm, rank, size }
        }
    }

    /// Receives are completed eagerly inside `irecv`; post sends first.
    pub struct MpiRecvHandle(Option<Vec<u8>>);

    impl Wait for MpiRecvHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiRecvHandle;

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.comm
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag));
        }

        fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> MpiRecvHandle {
            let (data, _status) = self
                .comm
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(i32::from(tag));
            MpiRecvHandle(Some(data))
        }

        fn allgather(&self, send: &[u8], recv: &mut [u8]) -> Result<(), DecompError> {
            if recv.len() != send.len() * self.size {
                return Err(DecompError::CollectiveMismatch(format!(
                    "allgather receive buffer holds {} bytes, expected {}",
                    recv.len(),
                    send.len() * self.size
                )));
            }
            self.comm.all_gather_into(send, recv);
            Ok(())
        }

        fn exscan_sum(&self, value: usize) -> Result<usize, DecompError> {
            let mut out = 0u64;
            self.comm
                .exclusive_scan_into(&(value as u64), &mut out, SystemOperation::sum());
            // MPI leaves rank 0's exclusive scan result undefined
            Ok(if self.rank == 0 { 0 } else { out as usize })
        }

        fn allreduce_sum(&self, value: usize) -> Result<usize, DecompError> {
            let mut out = 0u64;
            self.comm
                .all_reduce_into(&(value as u64), &mut out, SystemOperation::sum());
            Ok(out as usize)
        }

        fn barrier(&self) -> Result<(), DecompError> {
            self.comm.barrier();
            Ok(())
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
