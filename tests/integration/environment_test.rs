//! Fragment environment integration tests.
//!
//! Tests fragment expansion and the per-entry-point fragment outcomes.

use super::shop_env;
use fragsql::engine::{ColumnInfo, FunctionKind, TableSource, Value};
use fragsql::FragsqlError;
use pretty_assertions::assert_eq;

#[test]
fn test_fragment_definition_is_ok_for_execute() {
    let mut env = shop_env();
    let result = env.execute_sql("tb := orders").unwrap();
    assert!(result.is_ok_sentinel());
    assert_eq!(env.fragments().get("tb"), Some("orders"));
}

#[test]
fn test_fragment_definition_is_error_for_update_and_query() {
    let mut env = shop_env();
    assert!(matches!(
        env.sql_update("tb := orders"),
        Err(FragsqlError::Fragment(_))
    ));
    assert!(matches!(
        env.sql_query("tb := orders"),
        Err(FragsqlError::Fragment(_))
    ));
    // The definition still took effect.
    assert_eq!(env.fragments().get("tb"), Some("orders"));
}

#[test]
fn test_query_uses_expanded_fragment() {
    let mut env = shop_env();
    env.execute_sql("tb := orders").unwrap();
    env.execute_sql("cols := id, amount").unwrap();

    let table = env.sql_query("SELECT ${cols} FROM ${tb}").unwrap();
    assert_eq!(
        table.columns,
        vec![ColumnInfo::new("id", "INT"), ColumnInfo::new("amount", "DOUBLE")]
    );
    assert!(matches!(&table.source, TableSource::Query(sql) if sql == "SELECT id, amount FROM orders"));
}

#[test]
fn test_definition_and_statement_in_one_submission() {
    let mut env = shop_env();
    let result = env
        .execute_sql("tb := orders; SELECT id FROM ${tb}")
        .unwrap();
    assert_eq!(result.column_names(), vec!["id"]);
}

#[test]
fn test_show_fragments_lists_definitions() {
    let mut env = shop_env();
    env.execute_sql("b := totals").unwrap();
    env.execute_sql("a := orders").unwrap();

    let result = env.execute_sql("SHOW FRAGMENTS").unwrap();
    assert_eq!(result.column_names(), vec!["fragmentName", "fragmentSql"]);
    assert_eq!(
        result.rows,
        vec![
            vec![Value::from("a"), Value::from("orders")],
            vec![Value::from("b"), Value::from("totals")],
        ]
    );

    let table = env.sql_query("show fragments").unwrap();
    assert_eq!(table.rows().map(<[_]>::len), Some(2));
}

#[test]
fn test_undefined_fragment_rejected_by_engine() {
    let mut env = shop_env();
    let err = env.execute_sql("SELECT * FROM ${missing}").unwrap_err();
    assert!(matches!(err, FragsqlError::Parse(_)), "got {err}");
}

#[test]
fn test_illegal_definition() {
    let mut env = shop_env();
    let err = env.execute_sql("tb :=").unwrap_err();
    assert_eq!(err.to_string(), "Fragment error: Illegal variable definition.");
}

#[test]
fn test_disabled_substitution_bypasses_fragments() {
    let mut env = shop_env();
    env.execute_sql("tb := orders").unwrap();
    env.un_use_sql_fragment();

    assert!(env.execute_sql("SELECT * FROM ${tb}").is_err());
    assert!(env.execute_sql("other := orders").is_err());
    assert!(env.sql_query("SHOW FRAGMENTS").is_err());
    assert!(env.fragments().get("other").is_none());

    env.use_sql_fragment();
    let result = env.execute_sql("SELECT id FROM ${tb}").unwrap();
    assert_eq!(result.column_names(), vec!["id"]);
}

#[test]
fn test_completion_hints_after_expansion() {
    let mut env = shop_env();
    env.execute_sql("tb := orders").unwrap();
    assert!(env.completion_hints("x := y", 2).unwrap().is_empty());
    assert_eq!(
        env.completion_hints("SELECT * FROM tot", 17).unwrap(),
        vec!["totals"]
    );
}

#[test]
fn test_execute_script_stops_at_first_error() {
    let mut env = shop_env();
    let err = env
        .execute_script("CREATE TABLE a (x INT);\nSELECT * FROM ghosts;\nCREATE TABLE b (x INT)")
        .unwrap_err();
    assert!(matches!(err, FragsqlError::Validation(_)));

    let shown = env.execute_sql("SHOW TABLES").unwrap();
    let names: Vec<String> = shown.rows.iter().map(|r| r[0].to_display_string()).collect();
    assert_eq!(names, vec!["a", "orders", "totals"]);
}

#[test]
fn test_insert_result_reports_sink() {
    let mut env = shop_env();
    env.execute_sql("agg := SELECT user_id, SUM(amount) AS total FROM orders GROUP BY user_id")
        .unwrap();
    let result = env.execute_sql("INSERT INTO totals ${agg}").unwrap();
    assert_eq!(
        result.column_names(),
        vec!["default_catalog.default_database.totals"]
    );
    assert_eq!(result.rows, vec![vec![Value::Int(-1)]]);
}

#[test]
fn test_commented_definition_is_registered() {
    let mut env = shop_env();
    let result = env
        .execute_sql("-- it's a note\ntb := orders;\nSELECT * FROM ${tb}")
        .unwrap();
    assert_eq!(result.column_names(), vec!["id", "user_id", "amount"]);
    assert_eq!(env.fragments().get("tb"), Some("orders"));
}

#[test]
fn test_rejected_submission_defines_nothing() {
    let mut env = shop_env();
    let err = env.execute_sql("x := orders; := y").unwrap_err();
    assert!(matches!(err, FragsqlError::Fragment(_)));
    assert!(env.fragments().get("x").is_none());
}

#[test]
fn test_sql_update_forwards_expanded_listing() {
    let mut env = shop_env();
    // The engine only sees the listing command and acknowledges it.
    env.sql_update("x := users; SHOW FRAGMENTS").unwrap();
    assert_eq!(env.fragments().get("x"), Some("users"));
}

#[test]
fn test_registered_aggregate_feeds_sink() {
    let mut env = shop_env();
    env.register_function("weighted_avg", FunctionKind::Aggregate, "DOUBLE").unwrap();
    let result = env
        .execute_sql(
            "INSERT INTO totals SELECT user_id, weighted_avg(amount) FROM orders GROUP BY user_id",
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(-1)]]);

    let plan = env
        .explain_sql(
            "SELECT user_id, weighted_avg(amount) AS w FROM orders GROUP BY user_id",
            &[],
        )
        .unwrap();
    assert!(plan.contains("GroupAggregate(groupBy=[user_id]"), "{plan}");
}

#[test]
fn test_crlf_script_explains_each_statement() {
    let mut env = shop_env();
    let records = env.explain_script(
        "tb := orders;\r\nSELECT id FROM ${tb} ORDER BY id LIMIT 3 OFFSET 1",
        &[],
    );
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.is_success()), "{records:?}");
    let plan = records[1].explain.as_deref().unwrap_or_default();
    assert!(plan.contains("LogicalSort(sort=[id ASC], offset=[1], fetch=[3])"), "{plan}");
}
