//! Communication plumbing: communicator backends, rank subsets and the wire format.

pub mod communicator;
pub mod sub_comm;
pub mod wire;

pub use communicator::{CommTag, Communicator, NoComm, ThreadComm, Wait};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
pub use sub_comm::{SubComm, SubHandle};
