//! Adapter between a line-level execution tracer and a [`Session`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use stabil_graph::{NodeFingerprint, NodeId};
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::session::Session;

/// Executed line numbers (1-based) per file, absolute or root-relative.
pub type ExecutedLines = BTreeMap<PathBuf, BTreeSet<u32>>;

/// A source of per-node execution traces.
///
/// Implementations collect every line executed between `start` and `stop`.
pub trait Tracer {
    /// Clears any previous trace and begins collecting.
    fn start(&mut self);

    /// Stops collecting and returns what executed since `start`.
    fn stop(&mut self) -> ExecutedLines;
}

/// How a node's execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// The node ran to completion, pass or fail.
    Completed,
    /// The run was cancelled mid-node; its trace is incomplete.
    Interrupted,
}

/// Drives a [`Tracer`] around each node and records the result.
pub struct Collector<T> {
    tracer: T,
    current: Option<NodeId>,
}

impl<T: Tracer> Collector<T> {
    /// Wraps `tracer`.
    pub fn new(tracer: T) -> Self {
        Self {
            tracer,
            current: None,
        }
    }

    /// Returns the node currently being traced.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Starts tracing node `id`.
    ///
    /// A node still open from a previous `begin` is discarded as if interrupted.
    pub fn begin(&mut self, id: impl Into<NodeId>) {
        if let Some(previous) = self.current.take() {
            warn!(node = %previous, "node never finished, discarding its trace");
            self.tracer.stop();
        }
        self.tracer.start();
        self.current = Some(id.into());
    }

    /// Stops tracing the current node and records it if it completed.
    ///
    /// Returns the recorded fingerprint, or `None` when there was no open node
    /// or the node was interrupted. An interrupted node keeps whatever record
    /// it had before.
    pub fn finish(
        &mut self,
        session: &mut Session,
        outcome: NodeOutcome,
    ) -> Result<Option<NodeFingerprint>, CacheError> {
        let Some(id) = self.current.take() else {
            return Ok(None);
        };
        let executed = self.tracer.stop();
        match outcome {
            NodeOutcome::Completed => session.record_node(&id, &executed).map(Some),
            NodeOutcome::Interrupted => {
                debug!(node = %id, "node interrupted, trace discarded");
                Ok(None)
            }
        }
    }

    /// Returns the wrapped tracer.
    pub fn into_inner(self) -> T {
        self.tracer
    }
}
