//! Configuration integration tests.
//!
//! Tests building environments from config files.

use fragsql::config::Config;
use fragsql::engine::TableEngine;
use fragsql::{FragmentEnvironment, FragsqlError};
use std::io::Write;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_environment_from_config_file() {
    let file = write_config(
        r#"
[environment]
parallelism = 3
default_database = "shop"

[fragments]
tb = "orders"
"#,
    );
    let config = Config::load_from_file(file.path()).unwrap();
    let mut env = FragmentEnvironment::local(&config).unwrap();

    assert_eq!(env.engine().parallelism(), 3);
    assert_eq!(env.fragments().get("tb"), Some("orders"));

    env.execute_sql("CREATE TABLE ${tb} (id INT)").unwrap();
    assert_eq!(env.engine().catalog().default_database(), "shop");
    assert_eq!(env.engine().catalog().object_names(), vec!["orders"]);
}

#[test]
fn test_fragments_disabled_in_config() {
    let file = write_config("[environment]\nuse_sql_fragment = false\n");
    let config = Config::load_from_file(file.path()).unwrap();
    let mut env = FragmentEnvironment::local(&config).unwrap();
    assert!(!env.is_using_sql_fragment());
    assert!(env.execute_sql("tb := orders").is_err());
}

#[test]
fn test_unknown_dialect_rejected() {
    let file = write_config("[environment]\ndialect = \"cobol\"\n");
    let config = Config::load_from_file(file.path()).unwrap();
    assert!(matches!(
        FragmentEnvironment::local(&config),
        Err(FragsqlError::Config(_))
    ));
}

#[test]
fn test_custom_statement_separator() {
    let file = write_config("[environment]\nstatement_separator = \"\\n/\\n\"\n");
    let config = Config::load_from_file(file.path()).unwrap();
    let mut env = FragmentEnvironment::local(&config).unwrap();
    let results = env
        .execute_script("CREATE TABLE a (x INT)\n/\nCREATE TABLE b (x INT)")
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(env.engine_mut().sql_query("SELECT x FROM b").is_ok());
}
