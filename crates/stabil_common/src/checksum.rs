//! Block checksums: the unit of content identity inside a file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Content hash of one block's normalized text, a value in `[0, 2^32)`.
///
/// A block is identified by its content, not its position: two blocks with
/// the same normalized text in the same file share one checksum, and moving a
/// block without editing it keeps its checksum.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(u32);

impl Checksum {
    /// Computes the checksum of already-normalized block text using XXH32.
    pub fn of_text(text: &str) -> Self {
        Self(xxhash_rust::xxh32::xxh32(text.as_bytes(), 0))
    }

    /// Creates a checksum from a raw value (decoded blobs, tests).
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for Checksum {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_checksum() {
        assert_eq!(Checksum::of_text("x = 1"), Checksum::of_text("x = 1"));
    }

    #[test]
    fn different_text_differs() {
        assert_ne!(Checksum::of_text("x = 1"), Checksum::of_text("x = 2"));
    }

    #[test]
    fn raw_roundtrip_covers_full_range() {
        for raw in [0u32, 1, 123_456, u32::MAX] {
            assert_eq!(Checksum::from_raw(raw).as_raw(), raw);
        }
    }

    #[test]
    fn display_is_fixed_width_hex() {
        assert_eq!(Checksum::from_raw(255).to_string(), "000000ff");
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&Checksum::from_raw(42)).unwrap();
        assert_eq!(json, "42");
        let back: Checksum = serde_json::from_str("4294967295").unwrap();
        assert_eq!(back.as_raw(), u32::MAX);
    }
}
