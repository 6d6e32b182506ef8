//! Engine abstraction layer for fragsql.
//!
//! Provides a trait-based interface to the underlying table-SQL engine, so
//! the fragment environment can decorate any engine that exposes the same
//! operation set.

mod catalog;
pub mod graph;
pub mod local;
pub mod mock;
mod plan;
mod types;

pub use catalog::{Catalog, CatalogObject, ObjectPath, UserFunction};
pub use graph::{StreamGraph, StreamNode, Transformation};
pub use local::{LocalEngine, LocalOperation};
pub use mock::{MockEngine, MockOperation};
pub use types::{
    ColumnInfo, ExplainDetail, FunctionKind, OperationKind, ResultKind, Row, Table, TableResult,
    TableSource, Value,
};

use crate::error::Result;

/// A single operation produced by an engine's parser.
pub trait EngineOperation {
    /// Returns the broad classification of this operation.
    fn kind(&self) -> OperationKind;

    /// Returns a short human-readable description of this operation.
    fn summary(&self) -> String;
}

/// Trait defining the interface of the underlying table-SQL engine.
///
/// All operations are synchronous; callers must serialize access to a
/// single engine instance.
pub trait TableEngine {
    /// Parsed operation type.
    type Operation: EngineOperation;

    /// Physical transformation type produced by [`TableEngine::translate`].
    type Transformation;

    /// Parses a statement into operations without executing it.
    fn parse(&self, statement: &str) -> Result<Vec<Self::Operation>>;

    /// Explains a statement given as SQL text.
    fn explain_sql(&self, statement: &str, details: &[ExplainDetail]) -> Result<String>;

    /// Explains already parsed operations.
    fn explain(&self, operations: &[Self::Operation], details: &[ExplainDetail])
        -> Result<String>;

    /// Returns completion candidates for the word ending at `position`.
    fn completion_hints(&self, statement: &str, position: usize) -> Vec<String>;

    /// Plans a query and returns it as a table.
    fn sql_query(&mut self, query: &str) -> Result<Table>;

    /// Executes a single statement.
    fn execute_sql(&mut self, statement: &str) -> Result<TableResult>;

    /// Executes a single statement that must not be a query.
    fn sql_update(&mut self, statement: &str) -> Result<()>;

    /// Registers a temporary system function, replacing any function of
    /// the same name.
    fn register_function(
        &mut self,
        name: &str,
        kind: FunctionKind,
        return_type: &str,
    ) -> Result<()>;

    /// Translates modify operations into physical transformations.
    fn translate(&self, operations: &[Self::Operation]) -> Result<Vec<Self::Transformation>>;

    /// Serializes the stream graph built from `transformations`.
    ///
    /// Returns `Ok(None)` when the engine's executor cannot build stream
    /// graphs.
    fn stream_graph_json(&self, transformations: &[Self::Transformation])
        -> Result<Option<String>>;
}
