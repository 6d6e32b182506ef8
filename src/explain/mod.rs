//! Statement classification and explain records.
//!
//! Classifies parsed operations into the reporting buckets shown to users
//! and assembles [`SqlExplainResult`] records around the engine's explain
//! output.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{EngineOperation, ExplainDetail, OperationKind, TableEngine};
use crate::error::{FragsqlError, Result};

/// Reporting bucket of an explained statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    #[serde(rename = "Modify DML")]
    ModifyDml,
    #[serde(rename = "Explain DML")]
    ExplainDml,
    #[serde(rename = "Query DML")]
    QueryDml,
    #[serde(rename = "DDL")]
    Ddl,
    #[serde(rename = "Sql Fragment")]
    SqlFragment,
}

impl StatementKind {
    /// Returns true for statements that are forwarded to the engine's explain.
    pub fn is_explainable(&self) -> bool {
        matches!(self, Self::ModifyDml | Self::ExplainDml | Self::QueryDml)
    }
}

impl From<OperationKind> for StatementKind {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Modify => Self::ModifyDml,
            OperationKind::Explain => Self::ExplainDml,
            OperationKind::Query => Self::QueryDml,
            OperationKind::Other => Self::Ddl,
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModifyDml => write!(f, "Modify DML"),
            Self::ExplainDml => write!(f, "Explain DML"),
            Self::QueryDml => write!(f, "Query DML"),
            Self::Ddl => write!(f, "DDL"),
            Self::SqlFragment => write!(f, "Sql Fragment"),
        }
    }
}

/// Result envelope of one explain call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlExplainResult {
    /// 1-based position inside a script; 0 for single statements.
    pub index: usize,
    pub sql: String,
    #[serde(rename = "type")]
    pub kind: Option<StatementKind>,
    pub explain: Option<String>,
    pub error: Option<String>,
    pub parse_true: bool,
    pub explain_true: bool,
}

impl SqlExplainResult {
    /// Record for a submission that only defined fragments.
    pub fn fragment(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        Self {
            kind: Some(StatementKind::SqlFragment),
            explain: Some(sql.clone()),
            sql,
            parse_true: true,
            explain_true: true,
            ..Self::default()
        }
    }

    /// Record for a statement whose parse or explain step failed.
    pub fn failed(sql: impl Into<String>, error: &FragsqlError, parse_true: bool) -> Self {
        Self {
            sql: sql.into(),
            error: Some(error.to_string()),
            parse_true,
            ..Self::default()
        }
    }

    /// Returns the record with its script position set.
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Returns true if both parsing and explaining succeeded.
    pub fn is_success(&self) -> bool {
        self.parse_true && self.explain_true
    }
}

/// Classifies `operations` and explains the ones the engine can explain.
///
/// Exactly one operation is accepted. Definition statements are reported as
/// `DDL` with their summary as the explanation and never reach the engine.
pub fn explain_operations<E: TableEngine>(
    engine: &E,
    sql: &str,
    operations: Vec<E::Operation>,
    details: &[ExplainDetail],
) -> Result<SqlExplainResult> {
    if operations.len() != 1 {
        return Err(FragsqlError::unsupported(
            "Unsupported SQL query! explainSql() only accepts a single SQL query.",
        ));
    }

    let mut record = SqlExplainResult {
        sql: sql.to_string(),
        parse_true: true,
        ..SqlExplainResult::default()
    };

    let mut explainable = Vec::with_capacity(operations.len());
    for operation in operations {
        let kind = StatementKind::from(operation.kind());
        record.kind = Some(kind);
        if kind.is_explainable() {
            explainable.push(operation);
        } else {
            record.explain = Some(operation.summary());
        }
    }

    record.explain_true = true;
    if explainable.is_empty() {
        debug!("Definition statement is not forwarded to the engine explain");
        return Ok(record);
    }

    record.explain = Some(engine.explain(&explainable, details)?);
    Ok(record)
}
