//! Execution graph integration tests.

use fragsql::config::Config;
use fragsql::engine::LocalEngine;
use fragsql::{FragmentEnvironment, FragsqlError};
use pretty_assertions::assert_eq;

fn env_with_parallelism(parallelism: u32) -> FragmentEnvironment<LocalEngine> {
    let mut config = Config::default();
    config.environment.parallelism = parallelism;
    let mut env = FragmentEnvironment::local(&config).unwrap();
    env.execute_script(
        "CREATE TABLE orders (id INT, user_id INT, amount DOUBLE);\n\
         CREATE TABLE totals (user_id INT, total DOUBLE)",
    )
    .unwrap();
    env
}

#[test]
fn test_graph_for_insert() {
    let mut env = env_with_parallelism(2);
    let graph = env
        .stream_graph("INSERT INTO totals SELECT user_id, amount FROM orders")
        .unwrap();

    let nodes = graph["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 3);

    assert_eq!(nodes[0]["id"], 1);
    assert_eq!(nodes[0]["pact"], "Data Source");
    assert!(nodes[0]["type"]
        .as_str()
        .unwrap()
        .starts_with("Source: TableSourceScan(table=[[default_catalog, default_database, orders]]"));
    assert_eq!(nodes[0]["contents"], format!("[1]:{}", nodes[0]["type"].as_str().unwrap()));

    assert_eq!(nodes[1]["pact"], "Operator");
    assert_eq!(nodes[1]["predecessors"][0]["id"], 1);
    assert_eq!(nodes[1]["predecessors"][0]["ship_strategy"], "FORWARD");
    assert_eq!(nodes[1]["predecessors"][0]["side"], "second");

    assert_eq!(nodes[2]["pact"], "Data Sink");
    for node in nodes {
        assert_eq!(node["parallelism"], 2);
    }
}

#[test]
fn test_graph_global_aggregate_runs_single() {
    let mut env = env_with_parallelism(4);
    env.execute_sql("CREATE TABLE grand (total DOUBLE)").unwrap();
    let graph = env
        .stream_graph("INSERT INTO grand SELECT SUM(amount) AS total FROM orders")
        .unwrap();
    let nodes = graph["nodes"].as_array().unwrap();
    assert_eq!(nodes[1]["predecessors"][0]["ship_strategy"], "GLOBAL");
    assert_eq!(nodes[1]["parallelism"], 1);
    assert_eq!(nodes[0]["parallelism"], 4);
}

#[test]
fn test_graph_uses_fragments() {
    let mut env = env_with_parallelism(1);
    env.execute_sql("src := SELECT user_id, amount FROM orders").unwrap();
    let graph = env.stream_graph("INSERT INTO totals ${src}").unwrap();
    assert_eq!(graph["nodes"].as_array().map(Vec::len), Some(3));
}

#[test]
fn test_graph_rejects_non_modify() {
    let mut env = env_with_parallelism(1);
    for sql in [
        "SELECT id FROM orders",
        "CREATE TABLE t (a INT)",
        "EXPLAIN INSERT INTO totals SELECT user_id, amount FROM orders",
    ] {
        let err = env.stream_graph(sql).unwrap_err();
        assert!(matches!(err, FragsqlError::Unsupported(_)), "{sql}: {err}");
    }
}

#[test]
fn test_graph_rejects_multiple_statements() {
    let mut env = env_with_parallelism(1);
    let err = env
        .stream_graph(
            "INSERT INTO totals SELECT user_id, amount FROM orders; \
             INSERT INTO totals SELECT user_id, amount FROM orders",
        )
        .unwrap_err();
    assert!(matches!(err, FragsqlError::Unsupported(_)));
}

#[test]
fn test_graph_for_fragment_definition() {
    let mut env = env_with_parallelism(1);
    let err = env.stream_graph("src := orders").unwrap_err();
    assert_eq!(err.to_string(), "Fragment error: This is a sql fragment.");
}

#[test]
fn test_graph_for_update_is_unsupported() {
    let mut env = env_with_parallelism(1);
    let err = env
        .stream_graph("UPDATE orders SET amount = 0 WHERE id = 1")
        .unwrap_err();
    assert!(matches!(err, FragsqlError::Unsupported(_)));
}
