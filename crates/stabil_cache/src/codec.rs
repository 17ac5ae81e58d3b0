//! Fixed-width binary packing of checksum sequences.
//!
//! A blob is the concatenation of one 4-byte little-endian unsigned integer per
//! checksum, in input order, with no header, separator, or terminator. The
//! width is pinned here and never derived from a platform integer size.

use stabil_common::Checksum;

use crate::error::CacheError;

/// Bytes per encoded checksum.
pub const CHECKSUM_WIDTH: usize = 4;

/// Packs `checksums` into a blob of exactly `4 * checksums.len()` bytes.
pub fn encode(checksums: &[Checksum]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(checksums.len() * CHECKSUM_WIDTH);
    for checksum in checksums {
        blob.extend_from_slice(&checksum.as_raw().to_le_bytes());
    }
    blob
}

/// Unpacks a blob produced by [`encode`].
///
/// Fails with [`CacheError::CorruptData`] if the length is not a multiple of
/// [`CHECKSUM_WIDTH`].
pub fn decode(blob: &[u8]) -> Result<Vec<Checksum>, CacheError> {
    if blob.len() % CHECKSUM_WIDTH != 0 {
        return Err(CacheError::CorruptData {
            reason: format!(
                "checksum blob of {} bytes is not a multiple of {CHECKSUM_WIDTH}",
                blob.len()
            ),
        });
    }
    Ok(blob
        .chunks_exact(CHECKSUM_WIDTH)
        .map(|c| Checksum::from_raw(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
        .collect())
}
