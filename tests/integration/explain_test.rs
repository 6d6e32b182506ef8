//! Explain integration tests.
//!
//! Tests explain text, explain records and script explanation.

use super::shop_env;
use fragsql::engine::ExplainDetail;
use fragsql::explain::StatementKind;
use fragsql::FragsqlError;
use pretty_assertions::assert_eq;

#[test]
fn test_explain_sql_text() {
    let mut env = shop_env();
    let plan = env
        .explain_sql("SELECT id FROM orders WHERE amount > 10", &[])
        .unwrap();
    assert!(plan.contains("== Abstract Syntax Tree =="));
    assert!(plan.contains("LogicalFilter(condition=[amount > 10])"));
    assert!(plan.contains("== Optimized Physical Plan =="));
    assert!(plan.contains("Calc(where=[amount > 10])"));
    assert!(!plan.contains("== Physical Execution Plan =="));
}

#[test]
fn test_explain_sql_fragment() {
    let mut env = shop_env();
    assert_eq!(
        env.explain_sql("tb := orders", &[]).unwrap(),
        "This is a sql fragment."
    );
}

#[test]
fn test_explain_details() {
    let mut env = shop_env();
    let plan = env
        .explain_sql(
            "SELECT user_id, COUNT(*) AS cnt FROM orders GROUP BY user_id",
            &[
                ExplainDetail::EstimatedCost,
                ExplainDetail::ChangelogMode,
                ExplainDetail::JsonExecutionPlan,
            ],
        )
        .unwrap();
    assert!(plan.contains("changelogMode=[I,UB,UA]"));
    assert!(plan.contains("rowcount = "));
    assert!(plan.contains("== Physical Execution Plan =="));
    assert!(plan.contains("\"ship_strategy\": \"HASH\""));
}

#[test]
fn test_record_for_query_and_insert() {
    let mut env = shop_env();
    let record = env
        .explain_sql_record("SELECT id FROM orders", &[])
        .unwrap();
    assert_eq!(record.kind, Some(StatementKind::QueryDml));
    assert!(record.is_success());

    let record = env
        .explain_sql_record("INSERT INTO totals SELECT user_id, amount FROM orders", &[])
        .unwrap();
    assert_eq!(record.kind, Some(StatementKind::ModifyDml));
    let explain = record.explain.unwrap();
    assert!(explain.contains("LogicalSink(table=[default_catalog.default_database.totals]"));
}

#[test]
fn test_record_for_explain_statement() {
    let mut env = shop_env();
    let record = env
        .explain_sql_record("EXPLAIN SELECT id FROM orders", &[])
        .unwrap();
    assert_eq!(record.kind, Some(StatementKind::ExplainDml));
    assert!(record.explain.unwrap().contains("LogicalProject(id=[id])"));
}

#[test]
fn test_record_for_ddl_is_not_explained() {
    let mut env = shop_env();
    let record = env
        .explain_sql_record("CREATE TABLE clicks (url VARCHAR, ts BIGINT)", &[])
        .unwrap();
    assert_eq!(record.kind, Some(StatementKind::Ddl));
    assert!(record.parse_true);
    assert!(record.explain_true);
    let explain = record.explain.unwrap();
    assert!(explain.starts_with("CREATE TABLE clicks"));
    assert!(!explain.contains("=="));

    // Explaining a definition does not run it.
    assert!(env.sql_query("SELECT * FROM clicks").is_err());
}

#[test]
fn test_record_for_fragment() {
    let mut env = shop_env();
    let record = env.explain_sql_record("tb := orders", &[]).unwrap();
    assert_eq!(record.kind, Some(StatementKind::SqlFragment));
    assert_eq!(record.explain.as_deref(), Some("tb := orders"));
    assert!(record.is_success());
}

#[test]
fn test_multiple_statements_rejected() {
    let mut env = shop_env();
    for sql in [
        "SELECT id FROM orders; SELECT id FROM orders",
        "CREATE TABLE a (x INT); CREATE TABLE b (x INT)",
    ] {
        let err = env.explain_sql_record(sql, &[]).unwrap_err();
        assert!(matches!(err, FragsqlError::Unsupported(_)), "got {err}");
        assert!(env.explain_sql(sql, &[]).is_err());
    }
}

#[test]
fn test_explain_script() {
    let mut env = shop_env();
    let records = env.explain_script(
        "CREATE TABLE clicks (url VARCHAR, ts BIGINT);\n\
         src := clicks;\n\
         INSERT INTO clicks SELECT url, ts FROM ${src};\n\
         SELECT nope FROM clicks;\n\
         SELEC 1",
        &[],
    );

    let kinds: Vec<Option<StatementKind>> = records.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            Some(StatementKind::Ddl),
            Some(StatementKind::SqlFragment),
            Some(StatementKind::ModifyDml),
            None,
            None
        ]
    );
    let indexes: Vec<usize> = records.iter().map(|r| r.index).collect();
    assert_eq!(indexes, vec![1, 2, 3, 4, 5]);

    assert!(records[0].is_success());
    assert!(records[2].is_success());
    assert!(records[3].error.as_deref().unwrap().contains("nope"));
    assert!(records[3].parse_true);
    assert!(!records[4].parse_true);
}

#[test]
fn test_record_json_shape() {
    let mut env = shop_env();
    let record = env.explain_sql_record("SELECT id FROM orders", &[]).unwrap();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["type"], "Query DML");
    assert_eq!(json["parseTrue"], true);
    assert_eq!(json["explainTrue"], true);
    assert_eq!(json["sql"], "SELECT id FROM orders");
}
