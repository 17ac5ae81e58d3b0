//! Multi-session workflows over a real data file: record, edit, reselect.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use stabil_cache::{Collector, ExecutedLines, NodeOutcome, Session, SessionConfig, Tracer};

const MODULE: &str = "\
def helper():
    return 1

def test_a():
    assert helper() == 1

def test_b():
    assert helper() + 1 == 2
";

const TEST_A: &[u32] = &[1, 2, 4, 5];
const TEST_B: &[u32] = &[1, 2, 7, 8];

fn set_mtime(path: &Path, secs: u64) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

fn rewrite(path: &Path, content: &str, secs: u64) {
    std::fs::write(path, content).unwrap();
    set_mtime(path, secs);
}

fn trace(path: &Path, lines: &[u32]) -> ExecutedLines {
    BTreeMap::from([(path.to_path_buf(), lines.iter().copied().collect())])
}

fn project() -> (tempfile::TempDir, SessionConfig) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("test_m.py"), MODULE).unwrap();
    let config = SessionConfig::new(dir.path());
    (dir, config)
}

/// Records both nodes in a first session and flushes.
fn record_all(dir: &Path, config: &SessionConfig) {
    let module = dir.join("test_m.py");
    let mut session = Session::open(config.clone()).unwrap();
    let selection = session.select(["test_m.py::test_a", "test_m.py::test_b"]);
    assert_eq!(selection.run.len(), 2);
    session
        .record_node("test_m.py::test_a", &trace(&module, TEST_A))
        .unwrap();
    session
        .record_node("test_m.py::test_b", &trace(&module, TEST_B))
        .unwrap();
    session.flush().unwrap();
}

fn run_ids(config: &SessionConfig) -> Vec<String> {
    let mut session = Session::open(config.clone()).unwrap();
    session
        .select(["test_m.py::test_a", "test_m.py::test_b"])
        .run
}

#[test]
fn nothing_changed_deselects_everything() {
    let (dir, config) = project();
    record_all(dir.path(), &config);
    assert!(run_ids(&config).is_empty());
}

#[test]
fn touch_without_edit_deselects_everything() {
    let (dir, config) = project();
    record_all(dir.path(), &config);
    set_mtime(&dir.path().join("test_m.py"), 1_424_880_936);
    assert!(run_ids(&config).is_empty());
}

#[test]
fn edit_inside_one_test_selects_only_it() {
    let (dir, config) = project();
    record_all(dir.path(), &config);
    rewrite(
        &dir.path().join("test_m.py"),
        &MODULE.replace("helper() + 1 == 2", "helper() + 2 == 3"),
        10_000,
    );
    assert_eq!(run_ids(&config), vec!["test_m.py::test_b".to_string()]);
}

#[test]
fn edit_in_shared_helper_selects_both() {
    let (dir, config) = project();
    record_all(dir.path(), &config);
    rewrite(
        &dir.path().join("test_m.py"),
        &MODULE.replace("return 1", "return 1  # same"),
        10_000,
    );
    assert_eq!(run_ids(&config).len(), 2);
}

#[test]
fn whitespace_only_edit_deselects_everything() {
    let (dir, config) = project();
    record_all(dir.path(), &config);
    rewrite(
        &dir.path().join("test_m.py"),
        &MODULE.replace("\n\ndef test_b", "\n\n\n\ndef test_b"),
        10_000,
    );
    assert!(run_ids(&config).is_empty());
}

#[test]
fn partial_rerun_keeps_the_rest_selected() {
    let (dir, config) = project();
    record_all(dir.path(), &config);
    let module = dir.path().join("test_m.py");
    rewrite(&module, &MODULE.replace("return 1", "return 2"), 10_000);

    // Only test_a reruns before the session ends.
    {
        let mut session = Session::open(config.clone()).unwrap();
        let selection = session.select(["test_m.py::test_a", "test_m.py::test_b"]);
        assert_eq!(selection.run.len(), 2);
        session
            .record_node("test_m.py::test_a", &trace(&module, TEST_A))
            .unwrap();
        session.flush().unwrap();
    }

    assert_eq!(run_ids(&config), vec!["test_m.py::test_b".to_string()]);

    // Once test_b reruns too, the change is fully absorbed.
    {
        let mut session = Session::open(config.clone()).unwrap();
        session.select(["test_m.py::test_b"]);
        session
            .record_node("test_m.py::test_b", &trace(&module, TEST_B))
            .unwrap();
        session.flush().unwrap();
    }
    assert!(run_ids(&config).is_empty());
}

#[test]
fn record_without_selection_keeps_other_changes_pending() {
    let (dir, config) = project();
    record_all(dir.path(), &config);
    let module = dir.path().join("test_m.py");
    rewrite(
        &module,
        &MODULE.replace("helper() + 1 == 2", "helper() + 2 == 3"),
        10_000,
    );

    {
        let mut session = Session::open(config.clone()).unwrap();
        session
            .record_node("test_m.py::test_a", &trace(&module, TEST_A))
            .unwrap();
        session.flush().unwrap();
    }

    assert_eq!(run_ids(&config), vec!["test_m.py::test_b".to_string()]);
}

#[test]
fn collector_flow_without_selection_keeps_other_changes_pending() {
    let (dir, config) = project();
    record_all(dir.path(), &config);
    let module = dir.path().join("test_m.py");
    rewrite(
        &module,
        &MODULE.replace("helper() + 1 == 2", "helper() + 2 == 3"),
        10_000,
    );

    {
        let mut session = Session::open(config.clone()).unwrap();
        let mut collector = Collector::new(Replay(vec![trace(&module, TEST_A)]));
        collector.begin("test_m.py::test_a");
        collector
            .finish(&mut session, NodeOutcome::Completed)
            .unwrap();
        session.flush().unwrap();
    }

    assert_eq!(run_ids(&config), vec!["test_m.py::test_b".to_string()]);
}

#[test]
fn edit_between_selection_and_record_stays_pending() {
    let (dir, config) = project();
    record_all(dir.path(), &config);
    let module = dir.path().join("test_m.py");

    {
        let mut session = Session::open(config.clone()).unwrap();
        let selection = session.select(["test_m.py::test_a", "test_m.py::test_b"]);
        assert!(selection.run.is_empty());

        rewrite(
            &module,
            &MODULE.replace("helper() + 1 == 2", "helper() + 2 == 3"),
            10_000,
        );
        session
            .record_node("test_m.py::test_a", &trace(&module, TEST_A))
            .unwrap();
        assert!(session.changed_files().contains_key("test_m.py"));
        session.flush().unwrap();
    }

    assert_eq!(run_ids(&config), vec!["test_m.py::test_b".to_string()]);
}

#[test]
fn full_rerun_absorbs_change() {
    let (dir, config) = project();
    record_all(dir.path(), &config);
    rewrite(
        &dir.path().join("test_m.py"),
        &MODULE.replace("return 1", "return 2"),
        10_000,
    );
    record_all(dir.path(), &config);
    assert!(run_ids(&config).is_empty());
}

#[test]
fn deleted_dependency_selects_dependents() {
    let (dir, config) = project();
    let lib = dir.path().join("lib.py");
    std::fs::write(&lib, "VALUE = 1\n").unwrap();
    {
        let mut session = Session::open(config.clone()).unwrap();
        let mut executed = trace(&dir.path().join("test_m.py"), TEST_A);
        executed.insert(lib.clone(), BTreeSet::from([1]));
        session.record_node("test_m.py::test_a", &executed).unwrap();
        session
            .record_node("test_m.py::test_b", &trace(&dir.path().join("test_m.py"), TEST_B))
            .unwrap();
        session.flush().unwrap();
    }
    std::fs::remove_file(&lib).unwrap();

    let mut session = Session::open(config).unwrap();
    session.determine_stable();
    assert_eq!(session.changed_files().get("lib.py"), Some(&Vec::new()));
    let selection = session.select(["test_m.py::test_a", "test_m.py::test_b"]);
    assert_eq!(selection.run, vec!["test_m.py::test_a".to_string()]);
}

#[test]
fn environments_do_not_share_records() {
    let (dir, config) = project();
    record_all(dir.path(), &config);

    let mut other = config.clone();
    other.environment = "py312".to_string();
    assert_eq!(run_ids(&other).len(), 2);
    assert!(run_ids(&config).is_empty());
}

#[test]
fn pruned_nodes_are_forgotten() {
    let (dir, config) = project();
    record_all(dir.path(), &config);
    {
        let mut session = Session::open(config.clone()).unwrap();
        let dropped = session.retain(&BTreeSet::from(["test_m.py::test_a".to_string()]));
        assert_eq!(dropped, vec!["test_m.py::test_b".to_string()]);
        session.flush().unwrap();
    }
    assert_eq!(run_ids(&config), vec!["test_m.py::test_b".to_string()]);
}

struct Replay(Vec<ExecutedLines>);

impl Tracer for Replay {
    fn start(&mut self) {}

    fn stop(&mut self) -> ExecutedLines {
        self.0.pop().unwrap_or_default()
    }
}

#[test]
fn interrupted_node_stays_selected() {
    let (dir, config) = project();
    let module = dir.path().join("test_m.py");
    {
        let mut session = Session::open(config.clone()).unwrap();
        // Replay pops from the back: test_a gets TEST_A, test_b gets TEST_B.
        let mut collector = Collector::new(Replay(vec![
            trace(&module, TEST_B),
            trace(&module, TEST_A),
        ]));
        collector.begin("test_m.py::test_a");
        collector
            .finish(&mut session, NodeOutcome::Completed)
            .unwrap();
        collector.begin("test_m.py::test_b");
        collector
            .finish(&mut session, NodeOutcome::Interrupted)
            .unwrap();
        session.flush().unwrap();
    }
    assert_eq!(run_ids(&config), vec!["test_m.py::test_b".to_string()]);
}
