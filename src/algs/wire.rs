//! Fixed little-endian wire encoding for the counts and indices exchanged by
//! the decomposition collectives.

use bytemuck::{Pod, Zeroable};

use crate::decomp_error::DecompError;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// One `usize` value carried on the wire as a little-endian `u64`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct WireU64 {
    pub v_le: u64,
}

impl WireU64 {
    pub fn new(v: usize) -> Self {
        Self {
            v_le: (v as u64).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u64::from_le(self.v_le) as usize
    }
}

/// Encode a slice of sizes into their wire representation.
pub fn encode_sizes(values: &[usize]) -> Vec<WireU64> {
    values.iter().map(|&v| WireU64::new(v)).collect()
}

/// Decode a raw byte buffer holding `WireU64` records.
pub fn decode_sizes(raw: &[u8]) -> Result<Vec<usize>, DecompError> {
    let width = std::mem::size_of::<WireU64>();
    if raw.len() % width != 0 {
        return Err(DecompError::CollectiveMismatch(format!(
            "received {} bytes, not a multiple of the {width}-byte record",
            raw.len()
        )));
    }
    // chunks instead of a direct cast: the received Vec<u8> is not 8-aligned
    Ok(raw
        .chunks_exact(width)
        .map(|chunk| {
            let mut le = [0u8; 8];
            le.copy_from_slice(chunk);
            u64::from_le_bytes(le) as usize
        })
        .collect())
}
