//! # Fixed-Stride Array Payloads
//!
//! An `ARRAY`-flagged element's payload is laid out as a 4-byte stride
//! prefix followed by `n` elements of exactly that many bytes each:
//!
//! ```text
//! +----------+------------+------------+-----+
//! | stride:4 | slot[0]:s  | slot[1]:s  | ... |
//! +----------+------------+------------+-----+
//! ```
//!
//! so `payload.len() == 4 + n * stride`. The stride is stored little-
//! endian; this is a Rust-internal memory layout, not a wire format (the
//! engine specifies none), so endianness only needs to be consistent
//! with itself.

pub const STRIDE_PREFIX_LEN: usize = 4;

/// Builds a fresh array payload from a stride and initial slot data.
pub fn build_payload(stride: u32, data: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(STRIDE_PREFIX_LEN + data.len());
    payload.extend_from_slice(&stride.to_le_bytes());
    payload.extend_from_slice(data);
    payload
}

/// Reads the stride prefix out of an array payload. Returns `0` if the
/// payload is too short to hold one (caller treats `0` as invalid).
pub fn read_stride(payload: &[u8]) -> u32 {
    if payload.len() < STRIDE_PREFIX_LEN {
        return 0;
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&payload[..STRIDE_PREFIX_LEN]);
    u32::from_le_bytes(buf)
}

/// Number of complete slots in the payload for a given stride.
pub fn slot_count(payload: &[u8], stride: u32) -> usize {
    if stride == 0 || payload.len() < STRIDE_PREFIX_LEN {
        return 0;
    }
    (payload.len() - STRIDE_PREFIX_LEN) / stride as usize
}

fn slot_range(index: u32, stride: u32) -> std::ops::Range<usize> {
    let start = STRIDE_PREFIX_LEN + stride as usize * index as usize;
    start..start + stride as usize
}

/// Borrows slot `index`. Caller must have already checked bounds via
/// [`slot_count`].
pub fn slot(payload: &[u8], index: u32, stride: u32) -> &[u8] {
    &payload[slot_range(index, stride)]
}

/// Mutably borrows slot `index`. Caller must have already checked bounds
/// via [`slot_count`].
pub fn slot_mut(payload: &mut [u8], index: u32, stride: u32) -> &mut [u8] {
    &mut payload[slot_range(index, stride)]
}
