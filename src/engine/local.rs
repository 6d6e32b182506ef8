//! Plan-only local engine.
//!
//! Parses SQL with sqlparser, keeps an in-memory catalog and plans queries
//! and INSERT statements against it. Definitions take effect; queries and
//! inserts are validated, explained and translated but never produce rows.

use sqlparser::ast::{ObjectType, Statement};
use sqlparser::dialect::{dialect_from_str, Dialect, GenericDialect};
use sqlparser::parser::Parser;
use tracing::{debug, info};

use super::catalog::{Catalog, CatalogObject, UserFunction};
use super::graph::{translate_plan, StreamGraph, Transformation};
use super::plan::{object_parts, PlanNode, PlanOp, Planner};
use super::{
    ColumnInfo, EngineOperation, ExplainDetail, FunctionKind, OperationKind, Table, TableEngine,
    TableResult, Value,
};
use crate::config::EnvironmentConfig;
use crate::error::{FragsqlError, Result};

/// SQL keywords offered by [`LocalEngine::completion_hints`].
const KEYWORDS: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CAST", "COUNT", "CREATE", "DELETE",
    "DESC", "DISTINCT", "DROP", "ELSE", "END", "EXCEPT", "EXISTS", "EXPLAIN", "FROM", "FULL",
    "GROUP", "HAVING", "IF", "IN", "INNER", "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "LEFT",
    "LIKE", "LIMIT", "NOT", "NULL", "ON", "OR", "ORDER", "OUTER", "RIGHT", "SELECT", "SET",
    "SHOW", "TABLE", "TABLES", "THEN", "UNION", "UPDATE", "VALUES", "VIEW", "WHEN", "WHERE",
    "WITH",
];

/// Keywords after which a catalog object name is expected.
const TABLE_CONTEXT: &[&str] = &["FROM", "JOIN", "INTO", "TABLE", "UPDATE", "VIEW"];

/// A statement parsed and validated by the local engine.
#[derive(Debug, Clone)]
pub struct LocalOperation {
    kind: OperationKind,
    statement: Statement,
    plan: Option<PlanNode>,
}

impl LocalOperation {
    /// The parsed statement.
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Result columns of a planned query or the input columns of a sink.
    pub fn columns(&self) -> Vec<ColumnInfo> {
        self.plan.as_ref().map(PlanNode::columns).unwrap_or_default()
    }

    fn plan(&self) -> Result<&PlanNode> {
        self.plan.as_ref().ok_or_else(|| {
            FragsqlError::unsupported(format!(
                "Statement has no executable plan: {}",
                self.statement
            ))
        })
    }
}

impl EngineOperation for LocalOperation {
    fn kind(&self) -> OperationKind {
        self.kind
    }

    fn summary(&self) -> String {
        self.statement.to_string()
    }
}

/// Local engine backed by an in-memory catalog.
#[derive(Debug)]
pub struct LocalEngine {
    dialect: Box<dyn Dialect>,
    catalog: Catalog,
    parallelism: u32,
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalEngine {
    /// Creates an engine with the generic dialect and default settings.
    pub fn new() -> Self {
        let defaults = EnvironmentConfig::default();
        Self {
            dialect: Box::new(GenericDialect {}),
            catalog: Catalog::new(defaults.default_catalog, defaults.default_database),
            parallelism: defaults.parallelism,
        }
    }

    /// Creates an engine from environment settings.
    pub fn from_config(config: &EnvironmentConfig) -> Result<Self> {
        let dialect = dialect_from_str(&config.dialect).ok_or_else(|| {
            FragsqlError::config(format!("Unknown SQL dialect '{}'", config.dialect))
        })?;
        if config.parallelism == 0 {
            return Err(FragsqlError::config("parallelism must be at least 1"));
        }
        Ok(Self {
            dialect,
            catalog: Catalog::new(&config.default_catalog, &config.default_database),
            parallelism: config.parallelism,
        })
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns the parallelism assigned to translated operators.
    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    fn to_operation(&self, statement: Statement) -> Result<LocalOperation> {
        let planner = Planner::new(&self.catalog);
        let (kind, plan) = match &statement {
            Statement::Query(_) => (OperationKind::Query, planner.plan_statement(&statement)?),
            Statement::Insert(_) => (OperationKind::Modify, planner.plan_statement(&statement)?),
            Statement::Update { .. } | Statement::Delete { .. } | Statement::Merge { .. } => {
                (OperationKind::Modify, None)
            }
            Statement::Explain { statement: inner, .. } => {
                (OperationKind::Explain, planner.plan_statement(inner)?)
            }
            _ => (OperationKind::Other, None),
        };
        Ok(LocalOperation {
            kind,
            statement,
            plan,
        })
    }

    /// Parses `sql` and requires exactly one operation.
    fn single(&self, sql: &str, method: &str) -> Result<LocalOperation> {
        let mut operations = self.parse(sql)?;
        if operations.len() != 1 {
            return Err(FragsqlError::unsupported(format!(
                "Unsupported SQL query! {method} only accepts a single SQL statement."
            )));
        }
        Ok(operations.remove(0))
    }

    fn explain_plans(&self, plans: &[&PlanNode], details: &[ExplainDetail]) -> Result<String> {
        let join = |render: &dyn Fn(&PlanNode) -> String| {
            plans
                .iter()
                .map(|plan| render(plan))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let mut out = String::from("== Abstract Syntax Tree ==\n");
        out.push_str(&join(&|plan: &PlanNode| plan.render_logical()));
        out.push_str("\n== Optimized Physical Plan ==\n");
        out.push_str(&join(&|plan: &PlanNode| plan.render_physical(details)));
        out.push_str("\n== Optimized Execution Plan ==\n");
        out.push_str(&join(&|plan: &PlanNode| plan.render_physical(&[])));

        if details.contains(&ExplainDetail::JsonExecutionPlan) {
            let mut next_id = 0;
            let mut transformations = Vec::new();
            for plan in plans {
                translate_plan(plan, self.parallelism, &mut next_id, &mut transformations);
            }
            out.push_str("\n== Physical Execution Plan ==\n");
            out.push_str(&StreamGraph::from_transformations(&transformations).to_json()?);
            out.push('\n');
        }
        Ok(out)
    }

    fn execute_operation(&mut self, operation: LocalOperation) -> Result<TableResult> {
        match operation.kind {
            OperationKind::Query => Ok(TableResult::with_content(operation.columns(), vec![])),
            OperationKind::Modify => {
                let plan = operation.plan()?;
                let sink = match &plan.op {
                    PlanOp::Sink { path, .. } => path.to_string(),
                    _ => return Err(FragsqlError::internal("modify plan without a sink")),
                };
                info!(sink = %sink, "Submitted insert");
                Ok(TableResult::with_content(
                    vec![ColumnInfo::new(sink, "BIGINT")],
                    vec![vec![Value::Int(-1)]],
                ))
            }
            OperationKind::Explain => {
                let text = self.explain_plans(&[operation.plan()?], &[])?;
                Ok(TableResult::with_content(
                    vec![ColumnInfo::new("result", "STRING")],
                    vec![vec![Value::String(text)]],
                ))
            }
            OperationKind::Other => self.execute_definition(operation.statement),
        }
    }

    fn execute_definition(&mut self, statement: Statement) -> Result<TableResult> {
        match statement {
            Statement::CreateTable(create) => {
                if create.columns.is_empty() {
                    return Err(FragsqlError::unsupported(
                        "CREATE TABLE requires an explicit column list",
                    ));
                }
                let path = self.catalog.qualify(&object_parts(&create.name))?;
                let object = CatalogObject::Table {
                    columns: create
                        .columns
                        .iter()
                        .map(|c| ColumnInfo::new(&c.name.value, c.data_type.to_string()))
                        .collect(),
                    options: create.with_options.iter().map(ToString::to_string).collect(),
                };
                if self.catalog.create(path.clone(), object, create.if_not_exists)? {
                    info!(table = %path, "Created table");
                }
                Ok(TableResult::ok())
            }
            Statement::CreateView {
                name,
                query,
                or_replace,
                if_not_exists,
                ..
            } => {
                let path = self.catalog.qualify(&object_parts(&name))?;
                let columns = Planner::new(&self.catalog)
                    .plan_statement(&Statement::Query(query.clone()))?
                    .map(|plan| plan.columns())
                    .unwrap_or_default();
                if or_replace {
                    self.catalog.drop(&path, false, true)?;
                }
                let object = CatalogObject::View {
                    columns,
                    query: query.to_string(),
                };
                if self.catalog.create(path.clone(), object, if_not_exists)? {
                    info!(view = %path, "Created view");
                }
                Ok(TableResult::ok())
            }
            Statement::Drop {
                object_type,
                if_exists,
                names,
                ..
            } => {
                let tables = match object_type {
                    ObjectType::Table => true,
                    ObjectType::View => false,
                    other => {
                        return Err(FragsqlError::unsupported(format!(
                            "DROP {other} is not supported"
                        )))
                    }
                };
                for name in &names {
                    let path = self.catalog.qualify(&object_parts(name))?;
                    if self.catalog.drop(&path, tables, if_exists)? {
                        info!(object = %path, "Dropped catalog object");
                    }
                }
                Ok(TableResult::ok())
            }
            Statement::ShowTables { .. } => Ok(TableResult::with_content(
                vec![ColumnInfo::new("table name", "STRING")],
                self.catalog
                    .object_names()
                    .into_iter()
                    .map(|name| vec![Value::String(name)])
                    .collect(),
            )),
            other => {
                debug!(statement = %other, "Acknowledged statement without catalog effect");
                Ok(TableResult::ok())
            }
        }
    }
}

impl TableEngine for LocalEngine {
    type Operation = LocalOperation;
    type Transformation = Transformation;

    fn parse(&self, statement: &str) -> Result<Vec<LocalOperation>> {
        Parser::parse_sql(self.dialect.as_ref(), statement)?
            .into_iter()
            .map(|s| self.to_operation(s))
            .collect()
    }

    fn explain_sql(&self, statement: &str, details: &[ExplainDetail]) -> Result<String> {
        let operation = self.single(statement, "explainSql()")?;
        if operation.kind == OperationKind::Other {
            return Err(FragsqlError::unsupported(format!(
                "Unsupported operation for explain: {}",
                operation.summary()
            )));
        }
        self.explain(std::slice::from_ref(&operation), details)
    }

    fn explain(&self, operations: &[LocalOperation], details: &[ExplainDetail]) -> Result<String> {
        let plans = operations
            .iter()
            .map(LocalOperation::plan)
            .collect::<Result<Vec<_>>>()?;
        self.explain_plans(&plans, details)
    }

    fn completion_hints(&self, statement: &str, position: usize) -> Vec<String> {
        let mut end = position.min(statement.len());
        while !statement.is_char_boundary(end) {
            end -= 1;
        }
        let before = &statement[..end];
        let word_start = before
            .char_indices()
            .rev()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let current = &before[word_start..];
        let previous = before[..word_start]
            .split_whitespace()
            .last()
            .map(str::to_uppercase);

        let objects = self.catalog.object_names();
        let functions = self.catalog.function_names();
        let candidates: Vec<&str> = match previous.as_deref() {
            Some(keyword) if TABLE_CONTEXT.contains(&keyword) => {
                objects.iter().map(String::as_str).collect()
            }
            _ => KEYWORDS
                .iter()
                .copied()
                .chain(objects.iter().map(String::as_str))
                .chain(functions.iter().map(String::as_str))
                .collect(),
        };

        let needle = current.to_lowercase();
        let mut hints: Vec<String> = candidates
            .into_iter()
            .filter(|c| c.to_lowercase().starts_with(&needle))
            .map(str::to_string)
            .collect();
        hints.sort();
        hints.dedup();
        hints
    }

    fn sql_query(&mut self, query: &str) -> Result<Table> {
        let operation = self.single(query, "sqlQuery()")?;
        if operation.kind != OperationKind::Query {
            return Err(FragsqlError::unsupported(
                "Unsupported SQL query! sqlQuery() only accepts SQL queries of type \
                 SELECT, UNION, INTERSECT, EXCEPT, VALUES, and ORDER_BY.",
            ));
        }
        Ok(Table::from_query(
            operation.statement.to_string(),
            operation.columns(),
        ))
    }

    fn execute_sql(&mut self, statement: &str) -> Result<TableResult> {
        let operation = self.single(statement, "executeSql()")?;
        debug!(kind = ?operation.kind, "Executing statement");
        self.execute_operation(operation)
    }

    fn sql_update(&mut self, statement: &str) -> Result<()> {
        let operation = self.single(statement, "sqlUpdate()")?;
        if matches!(operation.kind, OperationKind::Query | OperationKind::Explain) {
            return Err(FragsqlError::unsupported(
                "Unsupported SQL query! sqlUpdate() only accepts a single SQL statement of type \
                 INSERT, CREATE TABLE, DROP TABLE, CREATE VIEW, DROP VIEW.",
            ));
        }
        self.execute_operation(operation).map(|_| ())
    }

    fn register_function(
        &mut self,
        name: &str,
        kind: FunctionKind,
        return_type: &str,
    ) -> Result<()> {
        self.catalog.register_function(UserFunction {
            name: name.to_string(),
            kind,
            return_type: return_type.to_string(),
        })?;
        info!(function = %name, kind = %kind, "Registered function");
        Ok(())
    }

    fn translate(&self, operations: &[LocalOperation]) -> Result<Vec<Transformation>> {
        let mut next_id = 0;
        let mut transformations = Vec::new();
        for operation in operations {
            if operation.kind != OperationKind::Modify {
                return Err(FragsqlError::unsupported(format!(
                    "Only modify operations can be translated: {}",
                    operation.summary()
                )));
            }
            translate_plan(
                operation.plan()?,
                self.parallelism,
                &mut next_id,
                &mut transformations,
            );
        }
        Ok(transformations)
    }

    fn stream_graph_json(&self, transformations: &[Transformation]) -> Result<Option<String>> {
        StreamGraph::from_transformations(transformations)
            .to_json()
            .map(Some)
    }
}
