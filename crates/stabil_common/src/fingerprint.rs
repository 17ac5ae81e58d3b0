//! Aliases for the per-file checksum sequences exchanged between crates.

use std::collections::BTreeMap;

use crate::checksum::Checksum;

/// Checksums of every block of a file as currently observed, in block-discovery order.
pub type FileFingerprint = Vec<Checksum>;

/// Files identified as changed, mapped to their new fingerprints.
///
/// Any file absent from a `Delta` is treated as definitely unchanged.
pub type Delta = BTreeMap<String, FileFingerprint>;
