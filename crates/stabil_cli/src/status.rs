//! `stabil status`: report what changed and what can be skipped.

use serde::Serialize;
use stabil_cache::Session;

use crate::project::open_session;
use crate::{GlobalArgs, ReportFormat, StatusArgs};

/// Summary of one stability determination.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Files whose content changed since the last flush.
    pub changed_files: Vec<String>,
    /// Nodes safe to skip.
    pub stable_nodes: usize,
    /// Known nodes that must rerun, by id.
    pub unstable_nodes: Vec<String>,
    /// Files whose every dependent is stable.
    pub stable_files: usize,
    /// Files changed or touched by an unstable node.
    pub unstable_files: Vec<String>,
}

impl StatusReport {
    /// Determines stability for `session` and summarizes it.
    pub fn build(session: &mut Session) -> Self {
        session.determine_stable();
        Self {
            changed_files: session.changed_files().keys().cloned().collect(),
            stable_nodes: session.stable_nodes().len(),
            unstable_nodes: session.unstable_nodes().into_iter().collect(),
            stable_files: session.stable_files().len(),
            unstable_files: session.unstable_files().into_iter().collect(),
        }
    }

    /// Renders the report for a terminal.
    pub fn render_text(&self, verbose: bool) -> String {
        let changed = if self.changed_files.is_empty() {
            "none".to_string()
        } else {
            self.changed_files.join(", ")
        };
        let mut out = format!(
            "changed files: {changed}, skipping collection of {} files\n\
             nodes: {} stable, {} unstable\n",
            self.stable_files,
            self.stable_nodes,
            self.unstable_nodes.len()
        );
        if verbose {
            for id in &self.unstable_nodes {
                out.push_str(&format!("  must run: {id}\n"));
            }
        }
        out
    }
}

/// Runs the `stabil status` command. Read-only: nothing is flushed.
pub fn run(args: &StatusArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut session = open_session(global)?;
    let report = StatusReport::build(&mut session);
    match args.format {
        ReportFormat::Text => print!("{}", report.render_text(global.verbose)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stabil_cache::SessionConfig;
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn report_after_edit() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.py");
        std::fs::write(&a, "def test_a():\n    return 0\n").unwrap();
        let config = SessionConfig::new(tmp.path());
        {
            let mut session = Session::open(config.clone()).unwrap();
            let executed = BTreeMap::from([(a.clone(), BTreeSet::from([1, 2]))]);
            session.record_node("a.py::test_a", &executed).unwrap();
            session.flush().unwrap();
        }
        std::fs::write(&a, "def test_a():\n    return 1\n").unwrap();
        let file = std::fs::File::options().write(true).open(&a).unwrap();
        file.set_modified(std::time::UNIX_EPOCH).unwrap();

        let mut session = Session::open(config).unwrap();
        let report = StatusReport::build(&mut session);
        assert_eq!(report.changed_files, vec!["a.py"]);
        assert_eq!(report.unstable_nodes, vec!["a.py::test_a"]);
        assert_eq!(report.stable_nodes, 0);

        let text = report.render_text(true);
        assert!(text.starts_with("changed files: a.py, skipping collection of 0 files"));
        assert!(text.contains("must run: a.py::test_a"));
    }

    #[test]
    fn empty_report_text() {
        let report = StatusReport {
            changed_files: vec![],
            stable_nodes: 3,
            unstable_nodes: vec![],
            stable_files: 2,
            unstable_files: vec![],
        };
        assert_eq!(
            report.render_text(false),
            "changed files: none, skipping collection of 2 files\nnodes: 3 stable, 0 unstable\n"
        );
    }
}
