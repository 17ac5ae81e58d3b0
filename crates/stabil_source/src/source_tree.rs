//! Mtime-assisted detection of tracked files whose content changed.
//!
//! The modification time is only a hint that lets unchanged files skip
//! rehashing. The content hash decides: a touched-but-identical file updates
//! its cached mtime and is not reported.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use stabil_common::{ContentHash, Delta, FileFingerprint};
use tracing::{debug, warn};

use crate::blocks::BlockPolicy;
use crate::error::SourceError;
use crate::source_file::SourceFile;

/// Cached change-detection state for one tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Last seen modification time, nanoseconds since the Unix epoch.
    pub mtime: i64,
    /// Hash of the file's raw bytes when it was last read.
    pub checksum: ContentHash,
}

/// Per-file outcome of comparing the filesystem against a cached record.
enum FileState {
    /// Same mtime; nothing was read.
    Unchanged,
    /// New mtime, same content.
    Touched { mtime: i64 },
    /// Content changed.
    Changed {
        record: FileRecord,
        fingerprint: FileFingerprint,
    },
    /// The file no longer exists.
    Vanished,
    /// The file exists but could not be read this time.
    Unreadable,
}

/// The change-detection cache: one [`FileRecord`] per tracked file.
///
/// Keys are paths relative to the tree root, `/`-separated. Records are
/// mutated in place by [`get_changed_files`](SourceTree::get_changed_files)
/// and [`track`](SourceTree::track); the owning session persists them.
pub struct SourceTree {
    root: PathBuf,
    policy: BlockPolicy,
    records: BTreeMap<String, FileRecord>,
}

impl SourceTree {
    /// Creates an empty tree rooted at `root`.
    pub fn new(root: &Path, policy: BlockPolicy) -> Self {
        Self::with_records(root, policy, BTreeMap::new())
    }

    /// Creates a tree with previously persisted records.
    pub fn with_records(
        root: &Path,
        policy: BlockPolicy,
        records: BTreeMap<String, FileRecord>,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            policy,
            records,
        }
    }

    /// Returns the root directory all keys are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the block policy used when fingerprinting files.
    pub fn policy(&self) -> BlockPolicy {
        self.policy
    }

    /// Returns all cached records.
    pub fn records(&self) -> &BTreeMap<String, FileRecord> {
        &self.records
    }

    /// Returns the cached record for one file.
    pub fn record(&self, path: &str) -> Option<&FileRecord> {
        self.records.get(path)
    }

    /// Returns `true` if `path` is under tracking.
    pub fn is_tracked(&self, path: &str) -> bool {
        self.records.contains_key(path)
    }

    /// Overwrites the cached record for one file.
    pub fn set_record(&mut self, path: &str, record: FileRecord) {
        self.records.insert(path.to_string(), record);
    }

    /// Stops tracking a file, returning its last record.
    pub fn untrack(&mut self, path: &str) -> Option<FileRecord> {
        self.records.remove(path)
    }

    /// Keeps only the records whose path satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.records.retain(|path, _| keep(path));
    }

    /// Reads a tracked (or trackable) file and computes its block table.
    ///
    /// Fails with [`SourceError::MissingSource`] if the file is absent.
    pub fn get_file(&self, path: &str) -> Result<SourceFile, SourceError> {
        let full = self.root.join(path);
        let bytes = std::fs::read(&full).map_err(|e| SourceError::from_io(full.clone(), e))?;
        Ok(self.source_file(path, &bytes))
    }

    /// Starts tracking `path`, recording its current mtime and content hash.
    ///
    /// Returns the file so callers can resolve positions against the exact
    /// content that was recorded.
    pub fn track(&mut self, path: &str) -> Result<SourceFile, SourceError> {
        let full = self.root.join(path);
        let mtime = read_mtime(&full).map_err(|e| SourceError::from_io(full.clone(), e))?;
        let file = self.get_file(path)?;
        self.records.insert(
            path.to_string(),
            FileRecord {
                mtime,
                checksum: file.content_hash,
            },
        );
        Ok(file)
    }

    /// Reports every tracked file whose content differs from its cached checksum.
    ///
    /// Files with an unchanged mtime are skipped without any read. Files whose
    /// mtime moved but whose content hash matches only get their cached mtime
    /// updated. A vanished file is reported with an empty fingerprint and
    /// dropped from the cache; an unreadable one is reported the same way but
    /// keeps its record so it is retried next time.
    pub fn get_changed_files(&mut self) -> Delta {
        let states: Vec<(String, FileState)> = self
            .records
            .par_iter()
            .map(|(path, cached)| (path.clone(), self.inspect(path, cached)))
            .collect();

        let mut changed = Delta::new();
        for (path, state) in states {
            match state {
                FileState::Unchanged => {}
                FileState::Touched { mtime } => {
                    debug!(file = %path, "mtime moved, content unchanged");
                    if let Some(record) = self.records.get_mut(&path) {
                        record.mtime = mtime;
                    }
                }
                FileState::Changed {
                    record,
                    fingerprint,
                } => {
                    debug!(file = %path, blocks = fingerprint.len(), "content changed");
                    self.records.insert(path.clone(), record);
                    changed.insert(path, fingerprint);
                }
                FileState::Vanished => {
                    debug!(file = %path, "tracked file vanished");
                    self.records.remove(&path);
                    changed.insert(path, FileFingerprint::new());
                }
                FileState::Unreadable => {
                    changed.insert(path, FileFingerprint::new());
                }
            }
        }
        changed
    }

    fn inspect(&self, path: &str, cached: &FileRecord) -> FileState {
        let full = self.root.join(path);
        let mtime = match read_mtime(&full) {
            Ok(mtime) => mtime,
            Err(e) => return io_state(&full, e),
        };
        if mtime == cached.mtime {
            return FileState::Unchanged;
        }
        let bytes = match std::fs::read(&full) {
            Ok(bytes) => bytes,
            Err(e) => return io_state(&full, e),
        };
        let checksum = ContentHash::from_bytes(&bytes);
        if checksum == cached.checksum {
            return FileState::Touched { mtime };
        }
        let file = self.source_file(path, &bytes);
        FileState::Changed {
            record: FileRecord { mtime, checksum },
            fingerprint: file.fingerprint(),
        }
    }

    fn source_file(&self, path: &str, bytes: &[u8]) -> SourceFile {
        let content = String::from_utf8_lossy(bytes).into_owned();
        SourceFile::with_hash(path, content, ContentHash::from_bytes(bytes), self.policy)
    }
}

fn io_state(full: &Path, err: std::io::Error) -> FileState {
    if err.kind() == std::io::ErrorKind::NotFound {
        FileState::Vanished
    } else {
        warn!(file = %full.display(), error = %err, "cannot read tracked file");
        FileState::Unreadable
    }
}

fn read_mtime(path: &Path) -> std::io::Result<i64> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(mtime_nanos(modified))
}

/// Converts a filesystem timestamp to signed nanoseconds since the Unix epoch.
pub fn mtime_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_nanos()).map_or(i64::MIN, |n| -n),
    }
}

/// Expresses `path` as a `/`-separated key relative to `root`.
///
/// Relative inputs are taken as already relative to `root`. Returns `None`
/// for paths outside `root` or containing `..`.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = if path.is_absolute() {
        path.strip_prefix(root).ok()?
    } else {
        path
    };
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_str()?.to_string()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
