//! Rank-subset view of a parent communicator.
//!
//! A [`SubComm`] renumbers a sorted subset of the parent's ranks as
//! `0..members.len()` and routes every message through the parent. Its
//! collectives are the default point-to-point ones, so they only involve the
//! members of the subset.

use crate::algs::communicator::{Communicator, Wait};
use crate::decomp_error::DecompError;

#[derive(Debug)]
pub struct SubComm<'a, C: Communicator> {
    parent: &'a C,
    members: Vec<usize>,
    rank: usize,
}

impl<'a, C: Communicator> SubComm<'a, C> {
    /// Build the view for the calling rank.
    ///
    /// Returns `Ok(None)` when the calling rank is not a member. `members`
    /// must be non-empty, strictly increasing and inside the parent.
    pub fn new(parent: &'a C, members: Vec<usize>) -> Result<Option<Self>, DecompError> {
        validate_members(&members, parent.size())?;
        Ok(members
            .binary_search(&parent.rank())
            .ok()
            .map(|rank| SubComm {
                parent,
                members,
                rank,
            }))
    }

    /// Parent ranks of the members, indexed by subset rank.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// Parent rank of subset rank `peer`.
    pub fn parent_rank(&self, peer: usize) -> Result<usize, DecompError> {
        self.members
            .get(peer)
            .copied()
            .ok_or(DecompError::IndexOutOfRange {
                index: peer,
                len: self.members.len(),
            })
    }

    fn route(&self, peer: usize) -> Option<usize> {
        match self.parent_rank(peer) {
            Ok(parent) => Some(parent),
            Err(err) => {
                log::error!("subset rank {}: message not routed: {err}", self.rank);
                None
            }
        }
    }
}

/// Handle of a message routed through a [`SubComm`]. A message to a peer
/// outside the subset is never posted and its handle yields `None`.
#[derive(Debug)]
pub struct SubHandle<H>(Option<H>);

impl<H: Wait> Wait for SubHandle<H> {
    fn wait(self) -> Option<Vec<u8>> {
        self.0.and_then(Wait::wait)
    }
}

pub(crate) fn validate_members(members: &[usize], parent_size: usize) -> Result<(), DecompError> {
    if members.is_empty() {
        return Err(DecompError::InvalidRankSubset("subset is empty".into()));
    }
    if let Some(w) = members.windows(2).find(|w| w[0] >= w[1]) {
        return Err(DecompError::InvalidRankSubset(format!(
            "ranks must be strictly increasing, found {} before {}",
            w[0], w[1]
        )));
    }
    if let Some(&last) = members.last() {
        if last >= parent_size {
            return Err(DecompError::InvalidRankSubset(format!(
                "rank {last} outside a communicator of size {parent_size}"
            )));
        }
    }
    Ok(())
}

impl<C: Communicator> Communicator for SubComm<'_, C> {
    type SendHandle = SubHandle<C::SendHandle>;
    type RecvHandle = SubHandle<C::RecvHandle>;

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.members.len()
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        SubHandle(self.route(peer).map(|parent| self.parent.isend(parent, tag, buf)))
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        SubHandle(self.route(peer).map(|parent| self.parent.irecv(parent, tag, buf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, ThreadComm};

    #[test]
    fn subset_validation() {
        let comm = NoComm;
        assert!(matches!(
            SubComm::new(&comm, vec![]),
            Err(DecompError::InvalidRankSubset(_))
        ));
        assert!(matches!(
            SubComm::new(&comm, vec![0, 0]),
            Err(DecompError::InvalidRankSubset(_))
        ));
        assert!(matches!(
            SubComm::new(&comm, vec![1]),
            Err(DecompError::InvalidRankSubset(_))
        ));
        let sub = SubComm::new(&comm, vec![0]).unwrap().unwrap();
        assert_eq!((sub.rank(), sub.size()), (0, 1));
    }

    #[test]
    fn peers_outside_the_subset_are_not_routed() {
        let comms = ThreadComm::group(3);
        let sub = SubComm::new(&comms[2], vec![0, 2]).unwrap().unwrap();
        assert_eq!(sub.parent_rank(1).unwrap(), 2);
        assert_eq!(
            sub.parent_rank(2).unwrap_err(),
            DecompError::IndexOutOfRange { index: 2, len: 2 }
        );
        assert_eq!(sub.isend(5, 7, b"lost").wait(), None);
        assert_eq!(sub.irecv(5, 7, &mut []).wait(), None);
    }

    #[test]
    fn collectives_only_involve_members() {
        let comms = ThreadComm::group(4);
        let results: Vec<Option<(usize, Vec<usize>)>> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let sub = SubComm::new(comm, vec![1, 3]).unwrap()?;
                        let gathered = sub.allgather_sizes(&[comm.rank() * 100]).unwrap();
                        Some((sub.rank(), gathered))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0], None);
        assert_eq!(results[2], None);
        assert_eq!(results[1], Some((0, vec![100, 300])));
        assert_eq!(results[3], Some((1, vec![100, 300])));
    }
}
