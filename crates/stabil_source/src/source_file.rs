//! A tracked source file with its precomputed block table.

use std::collections::BTreeSet;

use stabil_common::{Checksum, ContentHash, FileFingerprint};

use crate::blocks::{split_blocks, Block, BlockPolicy};

/// A source file loaded for fingerprinting.
///
/// Stores the file's content along with the block table computed under the
/// tree's [`BlockPolicy`], so executed lines can be resolved to block
/// checksums without re-splitting the text.
pub struct SourceFile {
    /// Path relative to the tree root, `/`-separated.
    pub path: String,
    /// The full text content of the file.
    pub content: String,
    /// Hash of the raw file bytes for change detection.
    pub content_hash: ContentHash,
    /// Blocks in discovery order.
    blocks: Vec<Block>,
}

impl SourceFile {
    /// Creates a new `SourceFile`, hashing the content and splitting it into blocks.
    pub fn new(path: impl Into<String>, content: String, policy: BlockPolicy) -> Self {
        let content_hash = ContentHash::from_bytes(content.as_bytes());
        Self::with_hash(path, content, content_hash, policy)
    }

    /// Creates a `SourceFile` whose raw-byte hash was already computed.
    pub(crate) fn with_hash(
        path: impl Into<String>,
        content: String,
        content_hash: ContentHash,
        policy: BlockPolicy,
    ) -> Self {
        let blocks = split_blocks(&content, policy);
        Self {
            path: path.into(),
            content,
            content_hash,
            blocks,
        }
    }

    /// Returns the block table.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Returns the checksums of all blocks, in discovery order.
    pub fn fingerprint(&self) -> FileFingerprint {
        self.blocks.iter().map(|b| b.checksum).collect()
    }

    /// Resolves executed line numbers to the checksums of the blocks containing them.
    ///
    /// Each block touched by at least one executed line contributes its checksum
    /// once, in discovery order. Lines that fall outside every block (blank lines,
    /// positions past the end of the file) resolve to nothing.
    pub fn checksums_for_lines(&self, lines: &BTreeSet<u32>) -> Vec<Checksum> {
        self.blocks
            .iter()
            .filter(|b| lines.range(b.start_line..=b.end_line).next().is_some())
            .map(|b| b.checksum)
            .collect()
    }
}
