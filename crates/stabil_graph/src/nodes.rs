//! Typed dependency records: what each test node executed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use stabil_common::Checksum;

use crate::flip::{flip_dictionary, node_data_to_test_files};

/// Stable string identifier of one executable test case.
pub type NodeId = String;

/// The block checksums one node depended on, keyed by file.
///
/// Keys are the files the node actually touched during execution. Checksum
/// lists are kept exactly as recorded: neither sorted nor deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeFingerprint {
    files: BTreeMap<String, Vec<Checksum>>,
}

impl NodeFingerprint {
    /// Creates an empty fingerprint (a node that touched no tracked file).
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the checksums depended on in `file`, replacing any previous entry.
    pub fn insert(&mut self, file: impl Into<String>, checksums: Vec<Checksum>) {
        self.files.insert(file.into(), checksums);
    }

    /// Returns the checksums recorded for `file`.
    pub fn get(&self, file: &str) -> Option<&[Checksum]> {
        self.files.get(file).map(Vec::as_slice)
    }

    /// Returns `true` if the node touched `file`.
    pub fn depends_on(&self, file: &str) -> bool {
        self.files.contains_key(file)
    }

    /// Iterates over `(file, checksums)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Checksum])> {
        self.files.iter().map(|(f, c)| (f.as_str(), c.as_slice()))
    }

    /// Iterates over the files the node touched.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Number of files touched.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if the node touched no file.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Returns the underlying `file -> checksums` map.
    pub fn as_map(&self) -> &BTreeMap<String, Vec<Checksum>> {
        &self.files
    }
}

impl<F, I, C> FromIterator<(F, I)> for NodeFingerprint
where
    F: Into<String>,
    I: IntoIterator<Item = C>,
    C: Into<Checksum>,
{
    fn from_iter<T: IntoIterator<Item = (F, I)>>(iter: T) -> Self {
        let files = iter
            .into_iter()
            .map(|(f, cs)| (f.into(), cs.into_iter().map(Into::into).collect()))
            .collect();
        Self { files }
    }
}

/// The full dependency graph: one [`NodeFingerprint`] per known node.
///
/// Loaded once per session, amended one node at a time as nodes complete,
/// and persisted at session end by the cache layer.
///
/// Every file a node references must be tracked by the source-tree cache.
/// This type does not check that; the cache layer's session tracks each file
/// it records and treats any untracked reference it loads as changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodesData {
    nodes: BTreeMap<NodeId, NodeFingerprint>,
}

impl NodesData {
    /// Creates an empty graph (cold start).
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the fingerprint of `id`, returning the previous one.
    pub fn insert(
        &mut self,
        id: impl Into<NodeId>,
        fingerprint: NodeFingerprint,
    ) -> Option<NodeFingerprint> {
        self.nodes.insert(id.into(), fingerprint)
    }

    /// Forgets a node.
    pub fn remove(&mut self, id: &str) -> Option<NodeFingerprint> {
        self.nodes.remove(id)
    }

    /// Returns the fingerprint of `id`.
    pub fn get(&self, id: &str) -> Option<&NodeFingerprint> {
        self.nodes.get(id)
    }

    /// Returns `true` if `id` has a recorded fingerprint.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of known nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no node is known.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over `(node id, fingerprint)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeFingerprint)> {
        self.nodes.iter()
    }

    /// Returns every known node id.
    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    /// Returns every file referenced by at least one node.
    pub fn files(&self) -> BTreeSet<String> {
        self.nodes
            .values()
            .flat_map(|fp| fp.files().map(str::to_string))
            .collect()
    }

    /// Drops every node whose id is not in `collected`, returning the dropped ids.
    pub fn retain(&mut self, collected: &BTreeSet<NodeId>) -> Vec<NodeId> {
        let dropped: Vec<NodeId> = self
            .nodes
            .keys()
            .filter(|id| !collected.contains(*id))
            .cloned()
            .collect();
        for id in &dropped {
            self.nodes.remove(id);
        }
        dropped
    }

    /// Transposes the graph to `file -> (node -> checksums)`.
    pub fn flip(&self) -> BTreeMap<String, BTreeMap<NodeId, Vec<Checksum>>> {
        flip_dictionary(self.nodes.iter().map(|(id, fp)| {
            (
                id.clone(),
                fp.iter().map(|(f, cs)| (f.to_string(), cs.to_vec())),
            )
        }))
    }

    /// Reverse index `file -> nodes touching it`.
    pub fn test_files(&self) -> BTreeMap<String, BTreeSet<NodeId>> {
        node_data_to_test_files(self)
    }
}

impl<N: Into<NodeId>> FromIterator<(N, NodeFingerprint)> for NodesData {
    fn from_iter<T: IntoIterator<Item = (N, NodeFingerprint)>>(iter: T) -> Self {
        Self {
            nodes: iter.into_iter().map(|(id, fp)| (id.into(), fp)).collect(),
        }
    }
}
