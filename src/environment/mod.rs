//! Fragment-aware table environment.
//!
//! [`FragmentEnvironment`] decorates a [`TableEngine`]: each entry point
//! expands SQL fragments, answers the `SHOW FRAGMENTS` pseudo-command and
//! otherwise forwards the statement to the wrapped engine.

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::config::Config;
use crate::engine::{
    EngineOperation, ExplainDetail, FunctionKind, LocalEngine, OperationKind, Table, TableEngine,
    TableResult,
};
use crate::error::{FragsqlError, Result};
use crate::explain::{explain_operations, SqlExplainResult, StatementKind};
use crate::fragment::{check_show_fragments, FragmentRegistry};

/// Explain text returned for a submission that only defined fragments.
pub const FRAGMENT_EXPLAIN: &str = "This is a sql fragment.";

const SHOW_FRAGMENTS_EXPLAIN: &str = "'SHOW FRAGMENTS' can't be explained.";
const SINGLE_QUERY_ONLY: &str =
    "Unsupported SQL query! explainSql() only accepts a single SQL query.";

/// Outcome of fragment processing for one submission.
#[derive(Debug, PartialEq, Eq)]
enum Prepared {
    /// The submission only defined fragments.
    Fragment,
    /// The submission is the fragment-listing pseudo-command, carrying the
    /// expanded text for entry points that forward it.
    ShowFragments(String),
    Statement(String),
}

/// Table environment with SQL fragment support.
#[derive(Debug)]
pub struct FragmentEnvironment<E: TableEngine> {
    engine: E,
    fragments: FragmentRegistry,
    use_sql_fragment: bool,
    statement_separator: String,
}

impl FragmentEnvironment<LocalEngine> {
    /// Builds an environment over a [`LocalEngine`] configured from `config`.
    pub fn local(config: &Config) -> Result<Self> {
        let engine = LocalEngine::from_config(&config.environment)?;
        Self::with_config(engine, config)
    }
}

impl<E: TableEngine> FragmentEnvironment<E> {
    /// Wraps `engine` with fragment substitution enabled.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            fragments: FragmentRegistry::new(),
            use_sql_fragment: true,
            statement_separator: ";\n".to_string(),
        }
    }

    /// Wraps `engine` using the environment settings and fragments of `config`.
    pub fn with_config(engine: E, config: &Config) -> Result<Self> {
        config.environment.validate()?;
        let mut env = Self::new(engine);
        env.use_sql_fragment = config.environment.use_sql_fragment;
        env.statement_separator = config.environment.statement_separator.clone();
        for (name, sql) in &config.fragments {
            env.fragments.register(name, sql)?;
        }
        Ok(env)
    }

    /// Enables fragment substitution.
    pub fn use_sql_fragment(&mut self) {
        self.use_sql_fragment = true;
    }

    /// Disables fragment substitution. Statements then reach the engine
    /// unchanged.
    pub fn un_use_sql_fragment(&mut self) {
        self.use_sql_fragment = false;
    }

    pub fn is_using_sql_fragment(&self) -> bool {
        self.use_sql_fragment
    }

    pub fn fragments(&self) -> &FragmentRegistry {
        &self.fragments
    }

    pub fn fragments_mut(&mut self) -> &mut FragmentRegistry {
        &mut self.fragments
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Unwraps the environment, returning the engine.
    pub fn into_inner(self) -> E {
        self.engine
    }

    /// Returns true if `statement` is the fragment-listing pseudo-command.
    pub fn check_show_fragments(&self, statement: &str) -> bool {
        check_show_fragments(statement)
    }

    fn prepare(&mut self, statement: &str) -> Result<Prepared> {
        if !self.use_sql_fragment {
            return Ok(Prepared::Statement(statement.to_string()));
        }
        let expanded = self.fragments.parse_variable(statement)?;
        if expanded.is_empty() {
            debug!("Statement only defined sql fragments");
            return Ok(Prepared::Fragment);
        }
        if check_show_fragments(&expanded) {
            return Ok(Prepared::ShowFragments(expanded));
        }
        Ok(Prepared::Statement(expanded))
    }

    /// Explains a single statement as text.
    pub fn explain_sql(&mut self, statement: &str, details: &[ExplainDetail]) -> Result<String> {
        match self.prepare(statement)? {
            Prepared::Fragment => Ok(FRAGMENT_EXPLAIN.to_string()),
            Prepared::ShowFragments(_) => Err(FragsqlError::unsupported(SHOW_FRAGMENTS_EXPLAIN)),
            Prepared::Statement(sql) => {
                debug!(entry = "explain_sql", "Delegating statement to engine");
                self.engine.explain_sql(&sql, details)
            }
        }
    }

    /// Explains a single statement as a structured record.
    pub fn explain_sql_record(
        &mut self,
        statement: &str,
        details: &[ExplainDetail],
    ) -> Result<SqlExplainResult> {
        match self.prepare(statement)? {
            Prepared::Fragment => Ok(SqlExplainResult::fragment(statement)),
            Prepared::ShowFragments(_) => Err(FragsqlError::unsupported(SHOW_FRAGMENTS_EXPLAIN)),
            Prepared::Statement(sql) => {
                let operations = self.engine.parse(&sql)?;
                explain_operations(&self.engine, statement, operations, details)
            }
        }
    }

    /// Builds the execution graph of a single modify statement.
    ///
    /// A graph document that fails to parse is logged and replaced by an
    /// empty object.
    pub fn stream_graph(&mut self, statement: &str) -> Result<JsonValue> {
        let sql = match self.prepare(statement)? {
            Prepared::Fragment => return Err(FragsqlError::fragment(FRAGMENT_EXPLAIN)),
            Prepared::ShowFragments(_) => {
                return Err(FragsqlError::unsupported(SHOW_FRAGMENTS_EXPLAIN))
            }
            Prepared::Statement(sql) => sql,
        };

        let operations = self.engine.parse(&sql)?;
        if operations.len() != 1 {
            return Err(FragsqlError::unsupported(SINGLE_QUERY_ONLY));
        }
        if operations[0].kind() != OperationKind::Modify {
            return Err(FragsqlError::unsupported(format!(
                "Unsupported SQL query! Only modify statements have an execution graph: {}",
                operations[0].summary()
            )));
        }

        let transformations = self.engine.translate(&operations)?;
        let json = self
            .engine
            .stream_graph_json(&transformations)?
            .ok_or_else(|| {
                FragsqlError::unsupported(
                    "Unsupported SQL query! explainSql() need a single SQL to query.",
                )
            })?;

        match serde_json::from_str(&json) {
            Ok(document) => Ok(document),
            Err(e) => {
                warn!(error = %e, "Failed to parse stream graph JSON, returning an empty document");
                Ok(JsonValue::Object(serde_json::Map::new()))
            }
        }
    }

    /// Returns completion candidates for the word ending at `position`.
    pub fn completion_hints(&mut self, statement: &str, position: usize) -> Result<Vec<String>> {
        match self.prepare(statement)? {
            Prepared::Fragment => Ok(vec![]),
            Prepared::ShowFragments(sql) | Prepared::Statement(sql) => {
                Ok(self.engine.completion_hints(&sql, position))
            }
        }
    }

    /// Plans a query and returns it as a table.
    pub fn sql_query(&mut self, query: &str) -> Result<Table> {
        match self.prepare(query)? {
            Prepared::Fragment => Err(FragsqlError::fragment(
                "Unsupported SQL query! The SQL query parsed is null. \
                 If it's a sql fragment, please use execute_sql().",
            )),
            Prepared::ShowFragments(_) => Ok(self.fragments.fragments_table()),
            Prepared::Statement(sql) => {
                debug!(entry = "sql_query", "Delegating statement to engine");
                self.engine.sql_query(&sql)
            }
        }
    }

    /// Executes a single statement.
    pub fn execute_sql(&mut self, statement: &str) -> Result<TableResult> {
        match self.prepare(statement)? {
            Prepared::Fragment => Ok(TableResult::ok()),
            Prepared::ShowFragments(_) => Ok(self.fragments.fragments_result()),
            Prepared::Statement(sql) => {
                debug!(entry = "execute_sql", "Delegating statement to engine");
                self.engine.execute_sql(&sql)
            }
        }
    }

    /// Executes a single statement that must not be a query.
    pub fn sql_update(&mut self, statement: &str) -> Result<()> {
        let sql = match self.prepare(statement)? {
            Prepared::Fragment => {
                return Err(FragsqlError::fragment(
                    "Unsupported SQL update! The SQL update parsed is null. \
                     If it's a sql fragment, please use execute_sql().",
                ))
            }
            Prepared::ShowFragments(sql) | Prepared::Statement(sql) => sql,
        };
        debug!(entry = "sql_update", "Delegating statement to engine");
        self.engine.sql_update(&sql)
    }

    /// Registers a user-defined function with the engine's function catalog.
    pub fn register_function(
        &mut self,
        name: &str,
        kind: FunctionKind,
        return_type: &str,
    ) -> Result<()> {
        debug!(function = %name, kind = %kind, "Registering function");
        self.engine.register_function(name, kind, return_type)
    }

    /// Splits a script on the configured statement separator. CRLF line
    /// endings are read as LF.
    pub fn split_script(&self, script: &str) -> Vec<String> {
        let script = script.replace("\r\n", "\n");
        let separator = self.statement_separator.replace("\r\n", "\n");
        script
            .split(separator.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != ";")
            .map(str::to_string)
            .collect()
    }

    /// Explains every statement of a script.
    ///
    /// Definition statements are executed after being explained so later
    /// statements see their effect. Failures are recorded on the statement's
    /// record and never abort the script.
    pub fn explain_script(
        &mut self,
        script: &str,
        details: &[ExplainDetail],
    ) -> Vec<SqlExplainResult> {
        let statements = self.split_script(script);

        let mut records = Vec::with_capacity(statements.len());
        for (i, sql) in statements.iter().enumerate() {
            let index = i + 1;
            let record = match self.explain_sql_record(sql, details) {
                Ok(mut record) => {
                    if record.kind == Some(StatementKind::Ddl) {
                        if let Err(e) = self.execute_sql(sql) {
                            warn!(index, error = %e, "Failed to execute definition statement");
                            record.explain_true = false;
                            record.error = Some(e.to_string());
                        }
                    }
                    record.with_index(index)
                }
                Err(e) => {
                    warn!(index, error = %e, "Failed to explain statement");
                    let parse_true = !matches!(e, FragsqlError::Parse(_));
                    SqlExplainResult::failed(sql.as_str(), &e, parse_true).with_index(index)
                }
            };
            records.push(record);
        }
        records
    }

    /// Executes every statement of a script in order, stopping at the first
    /// error.
    pub fn execute_script(&mut self, script: &str) -> Result<Vec<TableResult>> {
        let statements = self.split_script(script);
        statements
            .iter()
            .map(|sql| self.execute_sql(sql))
            .collect()
    }
}
