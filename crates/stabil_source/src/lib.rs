//! Source text handling: block splitting and mtime-assisted change detection.
//!
//! The [`blocks`] module splits a file into content-identified blocks, each
//! with its own [`Checksum`](stabil_common::Checksum). A [`SourceFile`] holds
//! the resulting block table so executed line numbers can be resolved to the
//! blocks they fall in. The [`SourceTree`] caches one `(mtime, checksum)`
//! record per tracked file and reports only the files whose content moved.

#![warn(missing_docs)]

pub mod blocks;
pub mod error;
pub mod source_file;
pub mod source_tree;

pub use blocks::{split_blocks, Block, BlockPolicy};
pub use error::SourceError;
pub use source_file::SourceFile;
pub use source_tree::{mtime_nanos, relative_path, FileRecord, SourceTree};
