//! Mock table engine for testing.
//!
//! Classifies statements by their leading keyword and records every call
//! so tests can assert what reached the engine.

use std::cell::RefCell;

use super::{
    EngineOperation, ExplainDetail, FunctionKind, OperationKind, Table, TableEngine, TableResult,
};
use crate::error::{FragsqlError, Result};

/// A statement parsed by [`MockEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockOperation {
    pub kind: OperationKind,
    pub sql: String,
}

impl EngineOperation for MockOperation {
    fn kind(&self) -> OperationKind {
        self.kind
    }

    fn summary(&self) -> String {
        self.sql.clone()
    }
}

/// A mock engine that returns canned results and records calls.
#[derive(Debug)]
pub struct MockEngine {
    calls: RefCell<Vec<String>>,
    graph_json: Option<String>,
}

impl MockEngine {
    /// Creates a mock engine whose executor builds an empty stream graph.
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            graph_json: Some(r#"{"nodes":[]}"#.to_string()),
        }
    }

    /// Sets the JSON returned by `stream_graph_json`; `None` means the
    /// executor cannot build stream graphs.
    pub fn with_graph_json(mut self, json: Option<&str>) -> Self {
        self.graph_json = json.map(str::to_string);
        self
    }

    /// Calls received so far, formatted as `method: argument`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, method: &str, argument: &str) {
        self.calls.borrow_mut().push(format!("{method}: {argument}"));
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(sql: &str) -> OperationKind {
    let keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase();
    match keyword.as_str() {
        "INSERT" | "UPDATE" | "DELETE" => OperationKind::Modify,
        "SELECT" | "WITH" | "VALUES" => OperationKind::Query,
        "EXPLAIN" => OperationKind::Explain,
        _ => OperationKind::Other,
    }
}

impl TableEngine for MockEngine {
    type Operation = MockOperation;
    type Transformation = String;

    fn parse(&self, statement: &str) -> Result<Vec<MockOperation>> {
        self.record("parse", statement);
        if statement.contains("${") {
            return Err(FragsqlError::parse(format!(
                "Unresolved placeholder in: {statement}"
            )));
        }
        Ok(statement
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|sql| MockOperation {
                kind: classify(sql),
                sql: sql.to_string(),
            })
            .collect())
    }

    fn explain_sql(&self, statement: &str, details: &[ExplainDetail]) -> Result<String> {
        self.record("explain_sql", statement);
        Ok(format!("explained {statement} {details:?}"))
    }

    fn explain(&self, operations: &[MockOperation], details: &[ExplainDetail]) -> Result<String> {
        let summaries: Vec<String> = operations.iter().map(EngineOperation::summary).collect();
        self.record("explain", &summaries.join("; "));
        Ok(format!("plan of {} {details:?}", summaries.join("; ")))
    }

    fn completion_hints(&self, statement: &str, position: usize) -> Vec<String> {
        self.record("completion_hints", statement);
        vec![format!("hint@{position}")]
    }

    fn sql_query(&mut self, query: &str) -> Result<Table> {
        self.record("sql_query", query);
        Ok(Table::from_query(query, vec![]))
    }

    fn execute_sql(&mut self, statement: &str) -> Result<TableResult> {
        self.record("execute_sql", statement);
        Ok(TableResult::ok())
    }

    fn sql_update(&mut self, statement: &str) -> Result<()> {
        self.record("sql_update", statement);
        Ok(())
    }

    fn register_function(
        &mut self,
        name: &str,
        kind: FunctionKind,
        return_type: &str,
    ) -> Result<()> {
        self.record("register_function", &format!("{name} {kind:?} {return_type}"));
        Ok(())
    }

    fn translate(&self, operations: &[MockOperation]) -> Result<Vec<String>> {
        let summaries: Vec<String> = operations.iter().map(EngineOperation::summary).collect();
        self.record("translate", &summaries.join("; "));
        Ok(summaries)
    }

    fn stream_graph_json(&self, transformations: &[String]) -> Result<Option<String>> {
        self.record("stream_graph_json", &transformations.join("; "));
        Ok(self.graph_json.clone())
    }
}
