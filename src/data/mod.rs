//! Index mappings handed to the distributed-vector backend.

pub mod global_map;

pub use global_map::{DistributedBackend, InMemoryBackend, LocalToGlobalMapping};
