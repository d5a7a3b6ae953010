//! Payload masking (RFC 6455 section 5.3).
//!
//! Masking is a byte-wise XOR with a 4-byte key that cycles by `index % 4`.
//! Applying the same key twice restores the original bytes.

/// Unmask or mask `data` in place.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    let mut chunks = data.chunks_exact_mut(4);
    let key = u32::from_ne_bytes(mask);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ key;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    // chunks_exact leaves the tail starting at a multiple of 4, so the key
    // index restarts at 0.
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i];
    }
}
