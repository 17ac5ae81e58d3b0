//! SQLite-backed persistence of the dependency graph and source-tree cache.
//!
//! Every table is scoped by an environment label so several environments can
//! share one data file without seeing each other's records. A whole
//! environment is read inside one transaction and written inside one
//! transaction, so a crash never leaves a node half old and half new.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use stabil_common::ContentHash;
use stabil_graph::{NodeFingerprint, NodeId, NodesData};
use stabil_source::FileRecord;
use tracing::{debug, warn};

use crate::codec;
use crate::error::CacheError;

/// Layout version stored in `PRAGMA user_version`. Increment on any table change.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS attribute (
    environment TEXT NOT NULL,
    name        TEXT NOT NULL,
    value       TEXT NOT NULL,
    PRIMARY KEY (environment, name)
);
CREATE TABLE IF NOT EXISTS node (
    environment TEXT NOT NULL,
    node_id     TEXT NOT NULL,
    PRIMARY KEY (environment, node_id)
);
CREATE TABLE IF NOT EXISTS node_fingerprint (
    environment TEXT NOT NULL,
    node_id     TEXT NOT NULL,
    file        TEXT NOT NULL,
    checksums   BLOB NOT NULL,
    PRIMARY KEY (environment, node_id, file)
);
CREATE TABLE IF NOT EXISTS source_record (
    environment TEXT NOT NULL,
    file        TEXT NOT NULL,
    mtime       INTEGER NOT NULL,
    checksum    BLOB NOT NULL,
    PRIMARY KEY (environment, file)
);
";

const DROP_SQL: &str = "
DROP TABLE IF EXISTS attribute;
DROP TABLE IF EXISTS node;
DROP TABLE IF EXISTS node_fingerprint;
DROP TABLE IF EXISTS source_record;
";

/// Everything persisted for one environment.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// The dependency graph.
    pub nodes: NodesData,
    /// The source-tree cache records.
    pub records: BTreeMap<String, FileRecord>,
    /// Small opaque attributes, JSON-encoded.
    pub attributes: BTreeMap<String, String>,
}

/// Handle on the data file.
///
/// Owned exclusively by one session; no concurrent writer is assumed.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Opens (or creates) the data file at `path`.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        let mut store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates a store that lives only in memory (tests, dry runs).
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn, path: None };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the data file path, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn initialize(&mut self) -> Result<(), CacheError> {
        self.conn.execute_batch("PRAGMA synchronous = NORMAL;")?;

        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version != 0 && version != SCHEMA_VERSION {
            let mismatch = CacheError::SchemaMismatch {
                expected: SCHEMA_VERSION.to_string(),
                actual: version.to_string(),
            };
            warn!(error = %mismatch, "discarding stored data");
            self.conn.execute_batch(DROP_SQL)?;
        }

        self.conn.execute_batch(SCHEMA_SQL)?;
        self.conn
            .execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
        Ok(())
    }

    /// Reads everything stored for `environment` inside one transaction.
    ///
    /// A node whose checksum blob fails to decode is dropped with a warning,
    /// leaving it unknown (and therefore must-run) rather than failing the load.
    /// A source record with a malformed checksum is dropped the same way.
    pub fn load(&mut self, environment: &str) -> Result<Snapshot, CacheError> {
        let tx = self.conn.transaction()?;
        let snapshot = read_snapshot(&tx, environment)?;
        tx.commit()?;
        debug!(
            environment,
            nodes = snapshot.nodes.len(),
            files = snapshot.records.len(),
            "loaded stored data"
        );
        Ok(snapshot)
    }

    /// Replaces everything stored for `environment` inside one transaction.
    ///
    /// Either the whole snapshot becomes visible or, on any error, none of it does.
    pub fn flush(&mut self, environment: &str, snapshot: &Snapshot) -> Result<(), CacheError> {
        let tx = self.conn.transaction()?;
        write_snapshot(&tx, environment, snapshot)?;
        tx.commit()?;
        debug!(
            environment,
            nodes = snapshot.nodes.len(),
            files = snapshot.records.len(),
            "flushed data"
        );
        Ok(())
    }

    /// Stores one attribute as JSON.
    pub fn write_attribute<T: Serialize>(
        &self,
        environment: &str,
        name: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_string(value).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        self.conn.execute(
            "INSERT OR REPLACE INTO attribute (environment, name, value) VALUES (?1, ?2, ?3)",
            params![environment, name, json],
        )?;
        Ok(())
    }

    /// Reads one attribute, returning `None` if it was never written.
    pub fn read_attribute<T: DeserializeOwned>(
        &self,
        environment: &str,
        name: &str,
    ) -> Result<Option<T>, CacheError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM attribute WHERE environment = ?1 AND name = ?2",
                params![environment, name],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| {
            serde_json::from_str(&j).map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })
        })
        .transpose()
    }
}

fn read_snapshot(tx: &Transaction<'_>, environment: &str) -> Result<Snapshot, CacheError> {
    let mut fingerprints: BTreeMap<NodeId, NodeFingerprint> = BTreeMap::new();
    {
        let mut stmt = tx.prepare("SELECT node_id FROM node WHERE environment = ?1")?;
        let rows = stmt.query_map(params![environment], |row| row.get::<_, String>(0))?;
        for id in rows {
            fingerprints.insert(id?, NodeFingerprint::new());
        }
    }

    let mut corrupt: BTreeSet<NodeId> = BTreeSet::new();
    {
        let mut stmt = tx.prepare(
            "SELECT node_id, file, checksums FROM node_fingerprint WHERE environment = ?1",
        )?;
        let mut rows = stmt.query(params![environment])?;
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let file: String = row.get(1)?;
            let blob: Vec<u8> = row.get(2)?;
            match codec::decode(&blob) {
                Ok(checksums) => fingerprints.entry(id).or_default().insert(file, checksums),
                Err(e) => {
                    warn!(node = %id, file = %file, error = %e, "dropping corrupt node record");
                    corrupt.insert(id);
                }
            }
        }
    }
    let nodes: NodesData = fingerprints
        .into_iter()
        .filter(|(id, _)| !corrupt.contains(id))
        .collect();

    let mut records = BTreeMap::new();
    {
        let mut stmt = tx.prepare(
            "SELECT file, mtime, checksum FROM source_record WHERE environment = ?1",
        )?;
        let mut rows = stmt.query(params![environment])?;
        while let Some(row) = rows.next()? {
            let file: String = row.get(0)?;
            let mtime: i64 = row.get(1)?;
            let raw: Vec<u8> = row.get(2)?;
            match ContentHash::from_slice(&raw) {
                Some(checksum) => {
                    records.insert(file, FileRecord { mtime, checksum });
                }
                None => warn!(file = %file, bytes = raw.len(), "dropping corrupt source record"),
            }
        }
    }

    let mut attributes = BTreeMap::new();
    {
        let mut stmt = tx.prepare("SELECT name, value FROM attribute WHERE environment = ?1")?;
        let rows = stmt.query_map(params![environment], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for pair in rows {
            let (name, value) = pair?;
            attributes.insert(name, value);
        }
    }

    Ok(Snapshot {
        nodes,
        records,
        attributes,
    })
}

fn write_snapshot(
    tx: &Transaction<'_>,
    environment: &str,
    snapshot: &Snapshot,
) -> Result<(), CacheError> {
    for table in ["node", "node_fingerprint", "source_record", "attribute"] {
        tx.execute(
            &format!("DELETE FROM {table} WHERE environment = ?1"),
            params![environment],
        )?;
    }

    let mut node_stmt = tx.prepare("INSERT INTO node (environment, node_id) VALUES (?1, ?2)")?;
    let mut fp_stmt = tx.prepare(
        "INSERT INTO node_fingerprint (environment, node_id, file, checksums)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (id, fingerprint) in snapshot.nodes.iter() {
        node_stmt.execute(params![environment, id])?;
        for (file, checksums) in fingerprint.iter() {
            fp_stmt.execute(params![environment, id, file, codec::encode(checksums)])?;
        }
    }

    let mut record_stmt = tx.prepare(
        "INSERT INTO source_record (environment, file, mtime, checksum) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (file, record) in &snapshot.records {
        record_stmt.execute(params![
            environment,
            file,
            record.mtime,
            record.checksum.as_bytes().as_slice()
        ])?;
    }

    let mut attr_stmt =
        tx.prepare("INSERT INTO attribute (environment, name, value) VALUES (?1, ?2, ?3)")?;
    for (name, value) in &snapshot.attributes {
        attr_stmt.execute(params![environment, name, value])?;
    }
    Ok(())
}
