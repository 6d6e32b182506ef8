//! Result and metadata types shared across the engine seam.
//!
//! These are the shapes every [`TableEngine`](super::TableEngine) hands back,
//! and the shapes the fragment registry produces when it answers a statement
//! itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a parsed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Writes data into a sink (INSERT, UPDATE, DELETE, MERGE).
    Modify,
    /// Produces rows (SELECT, VALUES, set operations).
    Query,
    /// An EXPLAIN statement.
    Explain,
    /// Anything else: catalog definitions, SET, USE, SHOW.
    Other,
}

/// Kind of a user-defined function registered with an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    /// One row in, one value out.
    Scalar,
    /// One row in, any number of rows out.
    Table,
    /// Many rows in, one value out per group.
    Aggregate,
    /// Many rows in, any number of rows out per group.
    TableAggregate,
}

impl FunctionKind {
    /// Returns true if calls of this kind fold a group of rows.
    pub fn is_aggregate(self) -> bool {
        matches!(self, Self::Aggregate | Self::TableAggregate)
    }
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar function"),
            Self::Table => write!(f, "table function"),
            Self::Aggregate => write!(f, "aggregate function"),
            Self::TableAggregate => write!(f, "table aggregate function"),
        }
    }
}

/// Extra detail a caller can ask the engine to include in explain output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExplainDetail {
    /// Row-count estimates per node.
    EstimatedCost,
    /// Changelog mode produced by each node.
    ChangelogMode,
    /// The physical execution plan as JSON.
    JsonExecutionPlan,
}

impl fmt::Display for ExplainDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EstimatedCost => write!(f, "ESTIMATED_COST"),
            Self::ChangelogMode => write!(f, "CHANGELOG_MODE"),
            Self::JsonExecutionPlan => write!(f, "JSON_EXECUTION_PLAN"),
        }
    }
}

/// How a statement completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultKind {
    /// The statement ran and has nothing further to report.
    Success,
    /// The statement ran and produced rows.
    SuccessWithContent,
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data.
pub type Row = Vec<Value>;

/// A single value in a result row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// Result of executing a single statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableResult {
    /// How the statement completed.
    pub kind: ResultKind,

    /// Column metadata for the rows.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data.
    pub rows: Vec<Row>,
}

impl TableResult {
    /// The canonical result of a statement that completed with nothing to
    /// report: a single `result` column holding `OK`.
    pub fn ok() -> Self {
        Self {
            kind: ResultKind::Success,
            columns: vec![ColumnInfo::new("result", "STRING")],
            rows: vec![vec![Value::from("OK")]],
        }
    }

    /// Creates a result carrying rows.
    pub fn with_content(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            kind: ResultKind::SuccessWithContent,
            columns,
            rows,
        }
    }

    /// Returns true if this is the canonical OK result.
    pub fn is_ok_sentinel(&self) -> bool {
        *self == Self::ok()
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Renders the result as an aligned plain-text table.
    pub fn to_pretty_string(&self) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.name.len()).collect();
        for row in &self.rows {
            for (i, value) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(value.to_display_string().len());
                }
            }
        }

        let border = widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+");
        let border = format!("+{border}+");

        let render_line = |cells: Vec<String>| {
            let padded = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!(" {cell:<width$} "))
                .collect::<Vec<_>>()
                .join("|");
            format!("|{padded}|")
        };

        let mut lines = vec![border.clone()];
        lines.push(render_line(
            self.columns.iter().map(|c| c.name.clone()).collect(),
        ));
        lines.push(border.clone());
        for row in &self.rows {
            lines.push(render_line(
                row.iter().map(Value::to_display_string).collect(),
            ));
        }
        lines.push(border);
        lines.push(format!("{} row(s) in set", self.rows.len()));
        lines.join("\n")
    }
}

/// Where the rows of a [`Table`] come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableSource {
    /// A validated query, planned by the engine and evaluated on execution.
    Query(String),
    /// Literal rows held in memory.
    Values(Vec<Row>),
}

/// A lazily evaluated table returned from a query entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Resolved output columns.
    pub columns: Vec<ColumnInfo>,

    /// Row source.
    pub source: TableSource,
}

impl Table {
    /// Creates a table backed by a query.
    pub fn from_query(sql: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            columns,
            source: TableSource::Query(sql.into()),
        }
    }

    /// Creates a table backed by literal rows.
    pub fn from_values(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            source: TableSource::Values(rows),
        }
    }

    /// Returns the literal rows, if this table is backed by values.
    pub fn rows(&self) -> Option<&[Row]> {
        match &self.source {
            TableSource::Values(rows) => Some(rows),
            TableSource::Query(_) => None,
        }
    }
}
