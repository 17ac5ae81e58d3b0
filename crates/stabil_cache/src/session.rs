//! Session lifecycle: load, determine stability, record, flush.
//!
//! A [`Session`] owns the data file for the duration of one run. It loads the
//! dependency graph and the source-tree cache for one environment, computes
//! which nodes can be skipped, records fresh fingerprints for the nodes that
//! ran, and writes everything back in a single transaction on [`Session::flush`].
//! Dropping a session without flushing persists nothing.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;
use stabil_common::{Delta, FileFingerprint};
use stabil_graph::{stable, NodeFingerprint, NodeId, NodesData, Stability};
use stabil_source::{
    mtime_nanos, relative_path, BlockPolicy, FileRecord, SourceError, SourceFile, SourceTree,
};
use tracing::{debug, info, warn};

use crate::collector::ExecutedLines;
use crate::error::CacheError;
use crate::store::{Snapshot, Store};

/// Default data file name, created at the project root.
pub const DEFAULT_DATA_FILE: &str = ".stabildata";

/// Default environment label.
pub const DEFAULT_ENVIRONMENT: &str = "default";

const VERSION_ATTRIBUTE: &str = "stabil_version";
const POLICY_ATTRIBUTE: &str = "block_policy";

/// Where and how a session keeps its data.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Project root; every file key is relative to it.
    pub root: PathBuf,
    /// Location of the data file.
    pub data_path: PathBuf,
    /// Label isolating this run's records from other environments.
    pub environment: String,
    /// How source files are split into blocks.
    pub block_policy: BlockPolicy,
    /// Root-relative directories whose files are fingerprinted. Empty means the whole root.
    pub track_dirs: Vec<PathBuf>,
}

impl SessionConfig {
    /// Default configuration for a project rooted at `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            data_path: root.join(DEFAULT_DATA_FILE),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            block_policy: BlockPolicy::default(),
            track_dirs: Vec::new(),
        }
    }

    /// Returns `true` if the root-relative file `rel` lies in a tracked directory.
    pub fn tracks(&self, rel: &str) -> bool {
        if self.track_dirs.is_empty() {
            return true;
        }
        let rel = Path::new(rel);
        self.track_dirs.iter().any(|dir| {
            dir.as_os_str().is_empty() || dir == Path::new(".") || rel.starts_with(dir)
        })
    }
}

/// Outcome of [`Session::select`] over a collected node list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    /// Nodes that must run: unstable or never recorded. Collection order.
    pub run: Vec<NodeId>,
    /// Nodes proven stable and safe to skip. Collection order.
    pub deselected: Vec<NodeId>,
}

/// One run's view of the persisted data.
pub struct Session {
    config: SessionConfig,
    /// `config.root` with symlinks resolved, when it exists.
    canonical_root: Option<PathBuf>,
    store: Store,
    nodes: NodesData,
    tree: SourceTree,
    /// Source records as loaded, for restoring changes that still need a rerun.
    baseline: BTreeMap<String, FileRecord>,
    changed: Delta,
    stability: Stability,
    determined: bool,
    recorded: BTreeSet<NodeId>,
    /// Block tables read this session, re-read whenever the file's mtime moves.
    files: HashMap<String, SourceFile>,
}

impl Session {
    /// Opens the data file and loads the configured environment.
    ///
    /// Fail-safe: an unreadable data file is deleted and recreated, a failed
    /// load or a store written by another version or block policy starts
    /// from an empty graph. Only failure to create a fresh data file is
    /// reported as an error.
    pub fn open(config: SessionConfig) -> Result<Self, CacheError> {
        let mut store = open_store(&config.data_path)?;
        let expected = expected_attributes(config.block_policy)?;

        let snapshot = match store.load(&config.environment) {
            Ok(snapshot) if is_compatible(&snapshot, &expected) => snapshot,
            Ok(_) => {
                warn!(
                    environment = %config.environment,
                    "stored data written by another version or block policy, starting fresh"
                );
                Snapshot::default()
            }
            Err(e) => {
                warn!(environment = %config.environment, error = %e, "cannot load stored data, starting fresh");
                Snapshot::default()
            }
        };

        info!(
            environment = %config.environment,
            nodes = snapshot.nodes.len(),
            files = snapshot.records.len(),
            "session opened"
        );

        let tree = SourceTree::with_records(
            &config.root,
            config.block_policy,
            snapshot.records.clone(),
        );
        let canonical_root = std::fs::canonicalize(&config.root).ok();
        Ok(Self {
            config,
            canonical_root,
            store,
            nodes: snapshot.nodes,
            tree,
            baseline: snapshot.records,
            changed: Delta::new(),
            stability: Stability::default(),
            determined: false,
            recorded: BTreeSet::new(),
            files: HashMap::new(),
        })
    }

    /// Detects changed files and partitions the known nodes.
    ///
    /// Files some node depends on but the cache does not track are
    /// fingerprinted now and treated as changed, so a node never stays stable
    /// against a file nobody is watching.
    ///
    /// Runs once per session; later calls return the first result, amended by
    /// any change [`Session::record_node`] notices while re-reading files.
    pub fn determine_stable(&mut self) -> &Stability {
        if self.determined {
            return &self.stability;
        }
        let mut delta = self.tree.get_changed_files();

        for file in self.nodes.files() {
            if self.tree.is_tracked(&file) || delta.contains_key(&file) {
                continue;
            }
            let fingerprint = match self.tree.track(&file) {
                Ok(source) => {
                    let fingerprint = source.fingerprint();
                    self.files.insert(file.clone(), source);
                    fingerprint
                }
                Err(e) => {
                    debug!(file = %file, error = %e, "untracked dependency unavailable");
                    FileFingerprint::new()
                }
            };
            delta.insert(file, fingerprint);
        }

        self.stability = stable(&self.nodes, &delta);
        self.changed = delta;
        self.determined = true;

        info!(
            changed = self.changed.len(),
            stable_nodes = self.stability.stable_nodes.len(),
            unstable_nodes = self.nodes.len() - self.stability.stable_nodes.len(),
            stable_files = self.stability.stable_files.len(),
            "stability determined"
        );
        &self.stability
    }

    /// Returns the configuration this session was opened with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the dependency graph, including nodes recorded this session.
    pub fn nodes(&self) -> &NodesData {
        &self.nodes
    }

    /// Returns the source-tree cache.
    pub fn tree(&self) -> &SourceTree {
        &self.tree
    }

    /// Returns the last stability result; empty before [`Session::determine_stable`].
    pub fn stability(&self) -> &Stability {
        &self.stability
    }

    /// Nodes proven unaffected by the current changes.
    pub fn stable_nodes(&self) -> &BTreeSet<NodeId> {
        &self.stability.stable_nodes
    }

    /// Files whose every dependent is stable.
    pub fn stable_files(&self) -> &BTreeSet<String> {
        &self.stability.stable_files
    }

    /// Known nodes that must rerun.
    pub fn unstable_nodes(&self) -> BTreeSet<NodeId> {
        self.stability.unstable_nodes(&self.nodes)
    }

    /// Files changed themselves or touched by an unstable node.
    pub fn unstable_files(&self) -> BTreeSet<String> {
        self.stability.unstable_files(&self.nodes, &self.changed)
    }

    /// Files whose content changed since the data was last flushed.
    pub fn changed_files(&self) -> &Delta {
        &self.changed
    }

    /// Splits `collected` into nodes that must run and nodes safe to skip.
    ///
    /// Nodes never recorded always run. Determines stability first if that
    /// has not happened yet this session.
    pub fn select<I, S>(&mut self, collected: I) -> Selection
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        if !self.determined {
            self.determine_stable();
        }
        let mut selection = Selection::default();
        for id in collected {
            let id = id.into();
            if self.stability.stable_nodes.contains(&id) {
                selection.deselected.push(id);
            } else {
                selection.run.push(id);
            }
        }
        debug!(
            run = selection.run.len(),
            deselected = selection.deselected.len(),
            "selection computed"
        );
        selection
    }

    /// Forgets every node not in `collected`, returning the ids removed.
    pub fn retain(&mut self, collected: &BTreeSet<NodeId>) -> Vec<NodeId> {
        let dropped = self.nodes.retain(collected);
        if !dropped.is_empty() {
            info!(count = dropped.len(), "forgot nodes no longer collected");
        }
        dropped
    }

    /// Records the fingerprint of a node from the lines it executed.
    ///
    /// Paths outside the root or outside the tracked directories are ignored.
    /// A file that vanished mid-run is skipped. The node's previous record, if
    /// any, is replaced. Determines stability first if that has not happened
    /// yet this session, so changes other nodes still depend on stay pending.
    pub fn record_node(
        &mut self,
        id: &str,
        executed: &ExecutedLines,
    ) -> Result<NodeFingerprint, CacheError> {
        if !self.determined {
            self.determine_stable();
        }
        let mut fingerprint = NodeFingerprint::new();
        let mut under_root = false;
        for (path, lines) in executed {
            let Some(rel) = self.resolve_path(path) else {
                continue;
            };
            under_root = true;
            if !self.config.tracks(&rel) {
                continue;
            }
            let Some(file) = self.source_file(&rel)? else {
                continue;
            };
            fingerprint.insert(rel, file.checksums_for_lines(lines));
        }

        if !executed.is_empty() && !under_root {
            warn!(
                node = %id,
                paths = executed.len(),
                root = %self.config.root.display(),
                "no executed path lies under the project root"
            );
        }
        debug!(node = %id, files = fingerprint.len(), "recorded node");
        self.nodes.insert(id, fingerprint.clone());
        self.recorded.insert(id.to_string());
        Ok(fingerprint)
    }

    /// Expresses an executed path relative to the root, resolving symlinks
    /// when the path as given does not lie under it.
    fn resolve_path(&self, path: &Path) -> Option<String> {
        relative_path(&self.config.root, path).or_else(|| {
            let full = if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.config.root.join(path)
            };
            let real = std::fs::canonicalize(full).ok()?;
            relative_path(&self.config.root, &real)
                .or_else(|| relative_path(self.canonical_root.as_deref()?, &real))
        })
    }

    fn source_file(&mut self, rel: &str) -> Result<Option<&SourceFile>, CacheError> {
        let fresh = match (self.files.contains_key(rel), self.tree.record(rel)) {
            (true, Some(record)) => {
                current_mtime(&self.config.root.join(rel)) == Some(record.mtime)
            }
            _ => false,
        };
        if !fresh {
            let previous = self.tree.record(rel).copied();
            match self.tree.track(rel) {
                Ok(file) => {
                    if previous.is_some_and(|p| p.checksum != file.content_hash) {
                        self.note_change(rel, file.fingerprint());
                    }
                    self.files.insert(rel.to_string(), file);
                }
                Err(SourceError::MissingSource { .. }) => {
                    debug!(file = %rel, "executed file vanished, skipping");
                    self.files.remove(rel);
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(self.files.get(rel))
    }

    /// Folds a change seen after stability was determined into the delta.
    ///
    /// Nodes recorded earlier this session against the old content no longer
    /// count as rerun, so the change stays pending for them too.
    fn note_change(&mut self, rel: &str, fingerprint: FileFingerprint) {
        debug!(file = %rel, "file changed during the session");
        self.changed.insert(rel.to_string(), fingerprint);
        self.stability = stable(&self.nodes, &self.changed);
        let stability = &self.stability;
        self.recorded.retain(|id| stability.stable_nodes.contains(id));
    }

    /// Persists the graph and the source cache in one transaction.
    ///
    /// A changed file that still has an unstable dependent which did not
    /// rerun keeps its previous cache record, so the change is seen again
    /// next session. Cache records no node references are dropped.
    pub fn flush(&mut self) -> Result<(), CacheError> {
        let pending: Vec<String> = self
            .changed
            .keys()
            .filter(|file| self.has_pending_dependent(file))
            .cloned()
            .collect();
        for file in &pending {
            debug!(file = %file, "change still pending for unrun nodes");
            match self.baseline.get(file) {
                Some(record) => self.tree.set_record(file, *record),
                None => {
                    self.tree.untrack(file);
                }
            }
        }

        let referenced = self.nodes.files();
        self.tree.retain(|file| referenced.contains(file));

        let snapshot = Snapshot {
            nodes: self.nodes.clone(),
            records: self.tree.records().clone(),
            attributes: expected_attributes(self.config.block_policy)?,
        };
        self.store.flush(&self.config.environment, &snapshot)?;

        info!(
            environment = %self.config.environment,
            nodes = snapshot.nodes.len(),
            files = snapshot.records.len(),
            pending = pending.len(),
            "session data flushed"
        );
        Ok(())
    }

    fn has_pending_dependent(&self, file: &str) -> bool {
        self.nodes.iter().any(|(id, fingerprint)| {
            fingerprint.depends_on(file)
                && !self.recorded.contains(id)
                && !self.stability.stable_nodes.contains(id)
        })
    }
}

fn current_mtime(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(mtime_nanos(modified))
}

fn open_store(path: &Path) -> Result<Store, CacheError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    match Store::open(path) {
        Ok(store) => Ok(store),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "data file unusable, recreating");
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(CacheError::Io {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
            Store::open(path)
        }
    }
}

fn expected_attributes(policy: BlockPolicy) -> Result<BTreeMap<String, String>, CacheError> {
    Ok(BTreeMap::from([
        (
            VERSION_ATTRIBUTE.to_string(),
            to_json(&env!("CARGO_PKG_VERSION"))?,
        ),
        (POLICY_ATTRIBUTE.to_string(), to_json(&policy)?),
    ]))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CacheError> {
    serde_json::to_string(value).map_err(|e| CacheError::Serialization {
        reason: e.to_string(),
    })
}

/// An empty store is compatible with anything; otherwise every expected
/// attribute must match exactly.
fn is_compatible(snapshot: &Snapshot, expected: &BTreeMap<String, String>) -> bool {
    if snapshot.nodes.is_empty() && snapshot.records.is_empty() {
        return true;
    }
    expected
        .iter()
        .all(|(name, value)| snapshot.attributes.get(name) == Some(value))
}
