//! `stabil record`: store fingerprints from an execution trace file.
//!
//! The trace is a JSON object mapping each node id to the lines it executed:
//!
//! ```json
//! { "tests/test_a.py::test_a": { "tests/test_a.py": [1, 2, 4], "src/lib.py": [10] } }
//! ```
//!
//! File paths may be absolute or relative to the project root.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use stabil_cache::{ExecutedLines, Session};

use crate::project::open_session;
use crate::{GlobalArgs, RecordArgs};

/// Executed lines per node, as read from a trace file.
pub type TraceFile = BTreeMap<String, BTreeMap<PathBuf, Vec<u32>>>;

/// Reads and parses a trace file.
pub fn read_trace(path: &Path) -> Result<TraceFile, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read trace {}: {e}", path.display()))?;
    let trace = serde_json::from_str(&content)
        .map_err(|e| format!("invalid trace {}: {e}", path.display()))?;
    Ok(trace)
}

/// Records every node in `trace` and flushes.
///
/// Stability is determined first so changes still pending for nodes absent
/// from the trace survive the flush.
pub fn record(session: &mut Session, trace: TraceFile) -> Result<usize, Box<dyn std::error::Error>> {
    session.determine_stable();
    let count = trace.len();
    for (id, files) in trace {
        let executed: ExecutedLines = files
            .into_iter()
            .map(|(path, lines)| (path, lines.into_iter().collect()))
            .collect();
        session.record_node(&id, &executed)?;
    }
    session.flush()?;
    Ok(count)
}

/// Runs the `stabil record` command.
pub fn run(args: &RecordArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let trace = read_trace(&args.trace)?;
    let mut session = open_session(global)?;
    let count = record(&mut session, trace)?;
    if !global.quiet {
        eprintln!("recorded {count} nodes");
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stabil_cache::SessionConfig;

    #[test]
    fn trace_is_recorded_and_flushed() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.py"), "def test_a():\n    return 0\n").unwrap();
        let trace_path = tmp.path().join("trace.json");
        std::fs::write(&trace_path, r#"{"a.py::test_a": {"a.py": [1, 2]}}"#).unwrap();

        let config = SessionConfig::new(tmp.path());
        {
            let mut session = Session::open(config.clone()).unwrap();
            let count = record(&mut session, read_trace(&trace_path).unwrap()).unwrap();
            assert_eq!(count, 1);
        }
        let mut session = Session::open(config).unwrap();
        let selection = session.select(["a.py::test_a"]);
        assert_eq!(selection.deselected, vec!["a.py::test_a"]);
    }

    #[test]
    fn malformed_trace_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let trace_path = tmp.path().join("trace.json");
        std::fs::write(&trace_path, r#"{"n": ["not", "a", "map"]}"#).unwrap();
        let err = read_trace(&trace_path).unwrap_err();
        assert!(err.to_string().contains("invalid trace"));
    }

    #[test]
    fn missing_trace_errors() {
        let err = read_trace(Path::new("/nonexistent/trace.json")).unwrap_err();
        assert!(err.to_string().contains("cannot read trace"));
    }
}
