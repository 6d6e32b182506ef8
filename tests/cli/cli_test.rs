//! End-to-end tests of the fragsql subcommands.

use super::common::{run_fragsql, write_script};

const SCRIPT: &str = "CREATE TABLE orders (id INT, user_id INT, amount DOUBLE);\n\
                      CREATE TABLE totals (user_id INT, total DOUBLE);\n\
                      src := SELECT user_id, amount FROM orders;\n\
                      INSERT INTO totals ${src}";

#[test]
fn test_explain_prints_records() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), SCRIPT);
    let (code, stdout, stderr) =
        run_fragsql(dir.path(), &["explain", script.to_str().unwrap()], None);

    assert_eq!(code, 0, "stderr: {stderr}");
    let records: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0]["type"], "DDL");
    assert_eq!(records[2]["type"], "Sql Fragment");
    assert_eq!(records[3]["type"], "Modify DML");
    assert_eq!(records[3]["explainTrue"], true);
}

#[test]
fn test_graph_prints_last_statement_graph() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), SCRIPT);
    let (code, stdout, stderr) = run_fragsql(
        dir.path(),
        &["graph", script.to_str().unwrap(), "--parallelism", "2"],
        None,
    );

    assert_eq!(code, 0, "stderr: {stderr}");
    let graph: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let nodes = graph["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes[2]["pact"], "Data Sink");
    assert_eq!(nodes[2]["parallelism"], 2);
}

#[test]
fn test_exec_reads_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = run_fragsql(
        dir.path(),
        &["exec", "-"],
        Some("CREATE TABLE orders (id INT);\nSHOW TABLES"),
    );

    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("OK"));
    assert!(stdout.contains("orders"));
}

#[test]
fn test_fragments_lists_definitions() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), SCRIPT);
    let (code, stdout, stderr) =
        run_fragsql(dir.path(), &["fragments", script.to_str().unwrap()], None);

    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("fragmentName"));
    assert!(stdout.contains("SELECT user_id, amount FROM orders"));
}

#[test]
fn test_complete_prints_keywords() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_fragsql(dir.path(), &["complete", "SEL"], None);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "SELECT");
}

#[test]
fn test_no_fragments_flag() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_fragsql(
        dir.path(),
        &["--no-fragments", "exec", "-"],
        Some("tb := orders"),
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("Parse error"), "stderr: {stderr}");
}

#[test]
fn test_missing_script_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.sql");
    let (code, _, stderr) = run_fragsql(dir.path(), &["exec", missing.to_str().unwrap()], None);
    assert_eq!(code, 1);
    assert!(stderr.contains("Failed to read script"), "stderr: {stderr}");
}
