//! Transpositions of the dependency graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::nodes::{NodeId, NodesData};

/// Swaps the two outer keys of a nested map.
///
/// `node -> (file -> checksums)` becomes `file -> (node -> checksums)`. Inner
/// values are carried through unchanged. Outer entries with an empty inner map
/// have nothing to contribute and do not appear in the result.
pub fn flip_dictionary<K1, K2, V, M>(
    outer: impl IntoIterator<Item = (K1, M)>,
) -> BTreeMap<K2, BTreeMap<K1, V>>
where
    K1: Ord + Clone,
    K2: Ord,
    M: IntoIterator<Item = (K2, V)>,
{
    let mut flipped: BTreeMap<K2, BTreeMap<K1, V>> = BTreeMap::new();
    for (k1, inner) in outer {
        for (k2, value) in inner {
            flipped.entry(k2).or_default().insert(k1.clone(), value);
        }
    }
    flipped
}

/// Reverse index: every file mapped to the set of nodes that touched it.
///
/// A node counts as touching a file whenever the file is a key of its
/// fingerprint, regardless of the checksums recorded.
pub fn node_data_to_test_files(nodes: &NodesData) -> BTreeMap<String, BTreeSet<NodeId>> {
    let mut index: BTreeMap<String, BTreeSet<NodeId>> = BTreeMap::new();
    for (id, fingerprint) in nodes.iter() {
        for file in fingerprint.files() {
            index.entry(file.to_string()).or_default().insert(id.clone());
        }
    }
    index
}
