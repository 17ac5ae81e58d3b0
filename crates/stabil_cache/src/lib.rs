//! Persistence and session lifecycle for the change-impact engine.
//!
//! This crate stores the dependency graph and the source-tree cache in an
//! embedded SQLite file, packs checksum sequences into fixed-width blobs, and
//! ties loading, stability computation, per-node recording, and the final
//! atomic flush together in a [`Session`]. A [`Collector`] adapts any
//! line-level [`Tracer`] to the session.

#![warn(missing_docs)]

pub mod codec;
pub mod collector;
pub mod error;
pub mod session;
pub mod store;

pub use collector::{Collector, ExecutedLines, NodeOutcome, Tracer};
pub use error::CacheError;
pub use session::{Selection, Session, SessionConfig, DEFAULT_DATA_FILE, DEFAULT_ENVIRONMENT};
pub use store::{Snapshot, Store, SCHEMA_VERSION};
