//! `stabil files`: reverse index from files to the nodes that depend on them.

use std::collections::{BTreeMap, BTreeSet};

use stabil_graph::{node_data_to_test_files, NodeId};

use crate::project::open_session;
use crate::{FilesArgs, GlobalArgs, ReportFormat};

/// Renders the index one file per line, dependents indented below it.
pub fn render_text(index: &BTreeMap<String, BTreeSet<NodeId>>) -> String {
    let mut out = String::new();
    for (file, nodes) in index {
        out.push_str(&format!("{file} ({} nodes)\n", nodes.len()));
        for node in nodes {
            out.push_str(&format!("  {node}\n"));
        }
    }
    out
}

/// Runs the `stabil files` command.
pub fn run(args: &FilesArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let session = open_session(global)?;
    let index = node_data_to_test_files(session.nodes());
    match args.format {
        ReportFormat::Text => print!("{}", render_text(&index)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&index)?),
    }
    Ok(0)
}
