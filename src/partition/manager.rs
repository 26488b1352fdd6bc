//! Entry point for creating partitions.
//!
//! A [`PartitionManager`] is an explicit context object: it owns the
//! communicator and the topology-discovery service and remembers an optional
//! rank subset that applies to the next created partition only. Ranks
//! outside that subset take no part in the construction and get `None`.

use log::info;

use crate::algs::communicator::Communicator;
use crate::algs::sub_comm::{validate_members, SubComm};
use crate::data::global_map::InMemoryBackend;
use crate::decomp_error::DecompError;
use crate::partition::basis::BasisLayout;
use crate::partition::extent::PartitionInput;
use crate::partition::flat::FlatPartition;
use crate::partition::settings::PartitionSettings;
use crate::partition::structured::StructuredPartition;
use crate::topology::discovery::{BlockDiscovery, TopologyDiscovery};

#[derive(Debug)]
pub struct PartitionManager<C, T = BlockDiscovery> {
    comm: C,
    discovery: T,
    next_rank_subset: Option<Vec<usize>>,
}

impl<C: Communicator> PartitionManager<C> {
    pub fn new(comm: C) -> Self {
        Self::with_discovery(comm, BlockDiscovery)
    }
}

impl<C: Communicator, T: TopologyDiscovery> PartitionManager<C, T> {
    pub fn with_discovery(comm: C, discovery: T) -> Self {
        Self {
            comm,
            discovery,
            next_rank_subset: None,
        }
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    /// Number of ranks of the full communicator.
    pub fn n_ranks_comm_world(&self) -> usize {
        self.comm.size()
    }

    /// Rank of this process in the full communicator.
    pub fn rank_no_comm_world(&self) -> usize {
        self.comm.rank()
    }

    /// Restrict the next created partition to `ranks` (sorted, distinct).
    pub fn set_rank_subset_for_next_created_mesh(&mut self, ranks: Vec<usize>) -> Result<(), DecompError> {
        validate_members(&ranks, self.comm.size())?;
        info!("next partition is restricted to ranks {ranks:?}");
        self.next_rank_subset = Some(ranks);
        Ok(())
    }

    /// Rank subset waiting for the next created partition, if any.
    pub fn pending_rank_subset(&self) -> Option<&[usize]> {
        self.next_rank_subset.as_deref()
    }

    /// Split `0..global_size` into contiguous blocks.
    pub fn create_partitioning_flat(&mut self, global_size: usize) -> Result<Option<FlatPartition>, DecompError> {
        info!("creating flat partition of {global_size} entries");
        match self.next_rank_subset.take() {
            None => FlatPartition::new(global_size, &self.comm, &InMemoryBackend::new(&self.comm)).map(Some),
            Some(members) => match SubComm::new(&self.comm, members)? {
                None => {
                    info!("rank {} is not part of the flat partition", self.comm.rank());
                    Ok(None)
                }
                Some(sub) => FlatPartition::new(global_size, &sub, &InMemoryBackend::new(&sub)).map(Some),
            },
        }
    }

    /// Discover mode: the process grid is balanced unless `n_ranks` is given.
    pub fn create_partitioning_structured_global<const D: usize>(
        &mut self,
        n_elements_global: [usize; D],
        n_ranks: Option<[usize; D]>,
        basis: BasisLayout,
    ) -> Result<Option<StructuredPartition<D>>, DecompError> {
        self.create_structured(
            PartitionInput::Discover {
                n_elements_global,
                n_ranks,
            },
            basis,
        )
    }

    /// Given mode: every rank supplies its complete element box.
    pub fn create_partitioning_structured_given<const D: usize>(
        &mut self,
        n_elements_global: [usize; D],
        n_elements_local: [usize; D],
        begin_element_global: [usize; D],
        n_ranks: [usize; D],
        basis: BasisLayout,
    ) -> Result<Option<StructuredPartition<D>>, DecompError> {
        self.create_structured(
            PartitionInput::Given {
                n_elements_global,
                n_elements_local,
                begin_element_global,
                n_ranks,
            },
            basis,
        )
    }

    /// Local-sizes mode: global counts and begins follow from the sizes of all ranks.
    pub fn create_partitioning_structured_local<const D: usize>(
        &mut self,
        n_elements_local: [usize; D],
        n_ranks: [usize; D],
        basis: BasisLayout,
    ) -> Result<Option<StructuredPartition<D>>, DecompError> {
        self.create_structured(
            PartitionInput::LocalSizes {
                n_elements_local,
                n_ranks,
            },
            basis,
        )
    }

    pub fn create_from_settings<const D: usize>(
        &mut self,
        settings: &PartitionSettings,
    ) -> Result<Option<StructuredPartition<D>>, DecompError> {
        let input = settings.into_input::<D>()?;
        self.create_structured(input, settings.basis)
    }

    fn create_structured<const D: usize>(
        &mut self,
        input: PartitionInput<D>,
        basis: BasisLayout,
    ) -> Result<Option<StructuredPartition<D>>, DecompError> {
        info!("creating {D}-D structured partition from {input:?}");
        match self.next_rank_subset.take() {
            None => StructuredPartition::new(
                &input,
                basis,
                &self.comm,
                &self.discovery,
                &InMemoryBackend::new(&self.comm),
            )
            .map(Some),
            Some(members) => match SubComm::new(&self.comm, members)? {
                None => {
                    info!("rank {} is not part of the structured partition", self.comm.rank());
                    Ok(None)
                }
                Some(sub) => StructuredPartition::new(
                    &input,
                    basis,
                    &sub,
                    &self.discovery,
                    &InMemoryBackend::new(&sub),
                )
                .map(Some),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    #[test]
    fn serial_manager_creates_every_kind() {
        let mut manager = PartitionManager::new(NoComm);
        assert_eq!(manager.n_ranks_comm_world(), 1);
        assert_eq!(manager.rank_no_comm_world(), 0);

        let flat = manager.create_partitioning_flat(5).unwrap().unwrap();
        assert_eq!(flat.local_size(), 5);

        let global = manager
            .create_partitioning_structured_global([3, 3], None, BasisLayout::lagrange_linear())
            .unwrap()
            .unwrap();
        let given = manager
            .create_partitioning_structured_given([3, 3], [3, 3], [0, 0], [1, 1], BasisLayout::lagrange_linear())
            .unwrap()
            .unwrap();
        let local = manager
            .create_partitioning_structured_local([3, 3], [1, 1], BasisLayout::lagrange_linear())
            .unwrap()
            .unwrap();
        assert_eq!(global.dof_index_set(), given.dof_index_set());
        assert_eq!(global.dof_index_set(), local.dof_index_set());
    }

    #[test]
    fn subset_applies_to_next_partition_only() {
        let mut manager = PartitionManager::new(NoComm);
        assert!(matches!(
            manager.set_rank_subset_for_next_created_mesh(vec![1]),
            Err(DecompError::InvalidRankSubset(_))
        ));
        manager.set_rank_subset_for_next_created_mesh(vec![0]).unwrap();
        assert_eq!(manager.pending_rank_subset(), Some(&[0][..]));
        assert!(manager.create_partitioning_flat(3).unwrap().is_some());
        assert_eq!(manager.pending_rank_subset(), None);
    }
}
