//! Splitting source text into checksummed blocks.
//!
//! A block is the smallest unit of source that gets its own checksum. Blocks
//! are identified by their normalized text: trailing whitespace is dropped
//! from every line and blank lines are skipped before hashing, so neither
//! changes a block's checksum.

use serde::{Deserialize, Serialize};
use stabil_common::Checksum;

/// How a file's lines are grouped into blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockPolicy {
    /// Every non-blank line is its own block.
    Line,
    /// A line with no indentation opens a block; indented lines, and lines
    /// starting with a closing bracket, continue it.
    #[default]
    Indent,
}

/// One block of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// First line of the block (1-indexed).
    pub start_line: u32,
    /// Last non-blank line of the block (1-indexed, inclusive).
    pub end_line: u32,
    /// Checksum of the block's normalized text.
    pub checksum: Checksum,
}

impl Block {
    /// Returns `true` if `line` falls inside this block's line range.
    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// Splits `content` into blocks according to `policy`, in discovery order.
pub fn split_blocks(content: &str, policy: BlockPolicy) -> Vec<Block> {
    let mut builder = BlockBuilder::default();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        let line = raw.trim_end();
        if line.is_empty() {
            continue;
        }
        let opens = match policy {
            BlockPolicy::Line => true,
            BlockPolicy::Indent => opens_block(line),
        };
        if opens {
            builder.close();
        }
        builder.push(line_no, line);
    }

    builder.close();
    builder.blocks
}

/// Whether a non-blank, right-trimmed line starts a new block under [`BlockPolicy::Indent`].
fn opens_block(line: &str) -> bool {
    match line.chars().next() {
        Some(c) if c.is_whitespace() => false,
        Some('}' | ')' | ']') => false,
        Some(_) => true,
        None => false,
    }
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    open: Option<OpenBlock>,
}

struct OpenBlock {
    start_line: u32,
    end_line: u32,
    text: String,
}

impl BlockBuilder {
    fn push(&mut self, line_no: u32, line: &str) {
        match &mut self.open {
            Some(open) => {
                open.text.push('\n');
                open.text.push_str(line);
                open.end_line = line_no;
            }
            None => {
                self.open = Some(OpenBlock {
                    start_line: line_no,
                    end_line: line_no,
                    text: line.to_string(),
                });
            }
        }
    }

    fn close(&mut self) {
        if let Some(open) = self.open.take() {
            self.blocks.push(Block {
                start_line: open.start_line,
                end_line: open.end_line,
                checksum: Checksum::of_text(&open.text),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = "import os\n\ndef test_a():\n    return 0\n\ndef test_b():\n    x = 1\n    return x\n";

    fn ranges(blocks: &[Block]) -> Vec<(u32, u32)> {
        blocks.iter().map(|b| (b.start_line, b.end_line)).collect()
    }

    #[test]
    fn indent_policy_groups_bodies() {
        let blocks = split_blocks(MODULE, BlockPolicy::Indent);
        assert_eq!(ranges(&blocks), vec![(1, 1), (3, 4), (6, 8)]);
    }

    #[test]
    fn line_policy_one_block_per_line() {
        let blocks = split_blocks(MODULE, BlockPolicy::Line);
        assert_eq!(
            ranges(&blocks),
            vec![(1, 1), (3, 3), (4, 4), (6, 6), (7, 7), (8, 8)]
        );
    }

    #[test]
    fn empty_content_has_no_blocks() {
        assert!(split_blocks("", BlockPolicy::Indent).is_empty());
        assert!(split_blocks("\n\n   \n", BlockPolicy::Line).is_empty());
    }

    #[test]
    fn leading_indented_lines_form_own_block() {
        let blocks = split_blocks("    stray\n    more\ntop\n", BlockPolicy::Indent);
        assert_eq!(ranges(&blocks), vec![(1, 2), (3, 3)]);
    }

    #[test]
    fn closing_bracket_continues_block() {
        let src = "fn a() {\n    1\n}\nfn b() {\n    2\n}\n";
        let blocks = split_blocks(src, BlockPolicy::Indent);
        assert_eq!(ranges(&blocks), vec![(1, 3), (4, 6)]);
    }

    #[test]
    fn trailing_whitespace_and_blank_lines_ignored() {
        let a = split_blocks("def f():\n    return 1\n", BlockPolicy::Indent);
        let b = split_blocks("def f():   \n\n    return 1  \n", BlockPolicy::Indent);
        assert_eq!(a[0].checksum, b[0].checksum);
    }

    #[test]
    fn edit_changes_only_that_block() {
        let before = split_blocks(MODULE, BlockPolicy::Indent);
        let edited = MODULE.replace("x = 1", "x = 2");
        let after = split_blocks(&edited, BlockPolicy::Indent);
        assert_eq!(before[0].checksum, after[0].checksum);
        assert_eq!(before[1].checksum, after[1].checksum);
        assert_ne!(before[2].checksum, after[2].checksum);
    }

    #[test]
    fn reordering_keeps_checksums() {
        let swapped = "import os\n\ndef test_b():\n    x = 1\n    return x\n\ndef test_a():\n    return 0\n";
        let mut before: Vec<_> = split_blocks(MODULE, BlockPolicy::Indent)
            .iter()
            .map(|b| b.checksum)
            .collect();
        let mut after: Vec<_> = split_blocks(swapped, BlockPolicy::Indent)
            .iter()
            .map(|b| b.checksum)
            .collect();
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn contains_line_is_inclusive() {
        let block = Block {
            start_line: 3,
            end_line: 5,
            checksum: Checksum::from_raw(1),
        };
        assert!(!block.contains_line(2));
        assert!(block.contains_line(3));
        assert!(block.contains_line(5));
        assert!(!block.contains_line(6));
    }

    #[test]
    fn crlf_line_endings_match_lf() {
        let lf = split_blocks("def f():\n    return 1\n", BlockPolicy::Indent);
        let crlf = split_blocks("def f():\r\n    return 1\r\n", BlockPolicy::Indent);
        assert_eq!(lf, crlf);
    }
}
