//! The stable/unstable partition of nodes and files for a change delta.
//!
//! [`stable`] is a pure function of the dependency graph and the delta: no
//! I/O, no hidden state. A node is affected by a changed file only if some
//! checksum it recorded for that file no longer appears anywhere in the file's
//! new fingerprint. Comparing by set membership rather than by position means
//! unrelated edits and reordering inside a file leave dependents stable.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use stabil_common::{Checksum, Delta};

use crate::nodes::{NodeFingerprint, NodeId, NodesData};

/// Result of [`stable`]: the nodes and files proven unaffected by a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stability {
    /// Nodes whose every recorded checksum still exists.
    pub stable_nodes: BTreeSet<NodeId>,
    /// Files not in the delta whose every dependent node is stable.
    pub stable_files: BTreeSet<String>,
}

impl Stability {
    /// Known nodes that are not stable. Together with `stable_nodes` this
    /// covers every node in `nodes`, and the two sets never overlap.
    pub fn unstable_nodes(&self, nodes: &NodesData) -> BTreeSet<NodeId> {
        nodes
            .iter()
            .map(|(id, _)| id)
            .filter(|id| !self.stable_nodes.contains(*id))
            .cloned()
            .collect()
    }

    /// Files that are changed themselves or touched by an unstable node.
    pub fn unstable_files(&self, nodes: &NodesData, delta: &Delta) -> BTreeSet<String> {
        nodes
            .files()
            .into_iter()
            .chain(delta.keys().cloned())
            .filter(|file| !self.stable_files.contains(file))
            .collect()
    }
}

/// Partitions `nodes` into stable and unstable given the changed files in `delta`.
///
/// Files absent from `delta` are treated as unchanged and never destabilize a
/// node. A node with an empty fingerprint is always stable. Nodes unknown to
/// `nodes` are outside this function's scope; callers must treat them as
/// must-run.
pub fn stable(nodes: &NodesData, delta: &Delta) -> Stability {
    let new_sets = checksum_sets(delta);

    let stable_nodes: BTreeSet<NodeId> = nodes
        .iter()
        .filter(|(_, fingerprint)| !affected_by(fingerprint, &new_sets))
        .map(|(id, _)| id.clone())
        .collect();

    let stable_files = nodes
        .test_files()
        .into_iter()
        .filter(|(file, dependents)| {
            !delta.contains_key(file) && dependents.iter().all(|n| stable_nodes.contains(n))
        })
        .map(|(file, _)| file)
        .collect();

    Stability {
        stable_nodes,
        stable_files,
    }
}

/// Returns `true` if some checksum `fingerprint` recorded for a changed file
/// is missing from that file's new fingerprint.
pub fn is_affected(fingerprint: &NodeFingerprint, delta: &Delta) -> bool {
    affected_by(fingerprint, &checksum_sets(delta))
}

fn checksum_sets(delta: &Delta) -> HashMap<&str, HashSet<Checksum>> {
    delta
        .iter()
        .map(|(file, checksums)| (file.as_str(), checksums.iter().copied().collect()))
        .collect()
}

fn affected_by(fingerprint: &NodeFingerprint, new_sets: &HashMap<&str, HashSet<Checksum>>) -> bool {
    fingerprint.iter().any(|(file, old)| match new_sets.get(file) {
        Some(new) => !old.iter().all(|c| new.contains(c)),
        None => false,
    })
}
