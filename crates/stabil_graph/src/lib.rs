//! The per-node dependency graph and the stability partition computed over it.
//!
//! [`NodesData`] maps each test node to the block checksums, per file, that
//! the node executed. Given a [`Delta`](stabil_common::Delta) of changed files,
//! [`stable`] decides which nodes are proven unaffected. A node survives a
//! change to a file it depends on as long as every checksum it recorded for
//! that file still exists somewhere in the file's new fingerprint.

#![warn(missing_docs)]

pub mod flip;
pub mod nodes;
pub mod stability;

pub use flip::{flip_dictionary, node_data_to_test_files};
pub use nodes::{NodeFingerprint, NodeId, NodesData};
pub use stability::{is_affected, stable, Stability};
