//! `stabil select`: filter a collected node list down to what must run.

use std::collections::BTreeSet;

use stabil_cache::{Selection, Session};

use crate::project::open_session;
use crate::{GlobalArgs, SelectArgs};

/// Computes the selection, optionally forgetting nodes that were not collected.
///
/// Pruning changes the stored graph, so it flushes; a plain selection does not.
pub fn select(
    session: &mut Session,
    ids: &[String],
    prune: bool,
) -> Result<Selection, Box<dyn std::error::Error>> {
    let selection = session.select(ids.iter().cloned());
    if prune {
        let collected: BTreeSet<String> = ids.iter().cloned().collect();
        session.retain(&collected);
        session.flush()?;
    }
    Ok(selection)
}

/// Runs the `stabil select` command, printing one id per line to stdout.
pub fn run(args: &SelectArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut session = open_session(global)?;
    let selection = select(&mut session, &args.ids, args.prune)?;
    for id in &selection.run {
        println!("{id}");
    }
    if !global.quiet {
        eprintln!(
            "selected {} of {} nodes ({} deselected)",
            selection.run.len(),
            args.ids.len(),
            selection.deselected.len()
        );
    }
    Ok(0)
}
