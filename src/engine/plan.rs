//! Logical planning for the local engine.
//!
//! Turns parsed queries and INSERT statements into a small relational plan,
//! resolving every table reference against the catalog on the way. The plan
//! is only ever explained or translated; nothing here evaluates rows.

use sqlparser::ast::{
    Expr, GroupByExpr, JoinConstraint, JoinOperator, ObjectName, OrderByExpr, Query, Select,
    SelectItem, SetExpr, SetOperator, SetQuantifier, Statement, TableFactor, TableWithJoins,
    Value as SqlValue,
};
use std::collections::HashMap;
use std::fmt::Write as _;

use super::catalog::{Catalog, CatalogObject, ObjectPath};
use super::{ColumnInfo, ExplainDetail};
use crate::error::{FragsqlError, Result};

/// Built-in aggregates; user-defined ones come from the catalog.
const AGGREGATE_FUNCTIONS: &[&str] = &[
    "COUNT",
    "SUM",
    "AVG",
    "MIN",
    "MAX",
    "COLLECT",
    "LISTAGG",
    "FIRST_VALUE",
    "LAST_VALUE",
];

/// Default row count assumed for a table without statistics.
const DEFAULT_SOURCE_ROWS: f64 = 1.0e8;

/// An output column of a plan node.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Table name or alias the column is visible under, if any.
    pub qualifier: Option<String>,
    pub name: String,
    pub data_type: String,
}

impl Field {
    fn to_column(&self) -> ColumnInfo {
        ColumnInfo::new(&self.name, &self.data_type)
    }
}

/// Relational operator of a plan node.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOp {
    Sink { path: ObjectPath, fields: Vec<String> },
    Project { exprs: Vec<(String, String)> },
    Filter { condition: String },
    Aggregate { group: Vec<String>, calls: Vec<(String, String)> },
    Join { kind: &'static str, condition: Option<String> },
    SetOp { kind: &'static str, all: bool },
    Sort {
        keys: Vec<String>,
        offset: Option<String>,
        fetch: Option<String>,
    },
    Values { tuples: Vec<Vec<String>> },
    TableScan { path: ObjectPath },
}

/// How rows move from an input into this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    Forward,
    Hash,
    Global,
}

/// A node of the logical plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    pub op: PlanOp,
    pub inputs: Vec<PlanNode>,
    pub fields: Vec<Field>,
}

impl PlanNode {
    fn new(op: PlanOp, inputs: Vec<PlanNode>, fields: Vec<Field>) -> Self {
        Self { op, inputs, fields }
    }

    /// Output columns as result metadata.
    pub fn columns(&self) -> Vec<ColumnInfo> {
        self.fields.iter().map(Field::to_column).collect()
    }

    /// Distribution required on the edges into this node.
    pub fn input_distribution(&self) -> Distribution {
        match &self.op {
            PlanOp::Aggregate { group, .. } if group.is_empty() => Distribution::Global,
            PlanOp::Aggregate { .. } => Distribution::Hash,
            PlanOp::Join { condition: Some(_), .. } => Distribution::Hash,
            PlanOp::Join { condition: None, .. } => Distribution::Global,
            PlanOp::Sort { .. } => Distribution::Global,
            _ => Distribution::Forward,
        }
    }

    /// Returns true if the node emits retractions or updates.
    pub fn produces_updates(&self) -> bool {
        match &self.op {
            PlanOp::Aggregate { .. } => true,
            PlanOp::SetOp { all: false, .. } => true,
            PlanOp::Join { kind, .. } if *kind != "inner" => true,
            _ => self.inputs.iter().any(PlanNode::produces_updates),
        }
    }

    /// Estimated number of output rows.
    pub fn estimated_rows(&self) -> f64 {
        let input_rows: Vec<f64> = self.inputs.iter().map(PlanNode::estimated_rows).collect();
        let first = input_rows.first().copied().unwrap_or(0.0);
        match &self.op {
            PlanOp::TableScan { .. } => DEFAULT_SOURCE_ROWS,
            PlanOp::Values { tuples } => tuples.len() as f64,
            PlanOp::Filter { .. } => first * 0.25,
            PlanOp::Aggregate { group, .. } if group.is_empty() => 1.0,
            PlanOp::Aggregate { .. } => first * 0.1,
            PlanOp::Join { .. } => input_rows.iter().copied().fold(0.0, f64::max),
            PlanOp::SetOp { .. } => input_rows.iter().sum(),
            PlanOp::Sort { fetch, .. } => fetch
                .as_deref()
                .and_then(|f| f.parse::<f64>().ok())
                .map_or(first, |f| f.min(first)),
            PlanOp::Sink { .. } | PlanOp::Project { .. } => first,
        }
    }

    fn cumulative_rows(&self) -> f64 {
        self.estimated_rows()
            + self
                .inputs
                .iter()
                .map(PlanNode::cumulative_rows)
                .sum::<f64>()
    }

    /// Logical operator description, e.g. `LogicalFilter(condition=[a > 1])`.
    pub fn logical_description(&self) -> String {
        match &self.op {
            PlanOp::Sink { path, fields } => format!(
                "LogicalSink(table=[{}], fields=[{}])",
                path,
                fields.join(", ")
            ),
            PlanOp::Project { exprs } => format!("LogicalProject({})", render_named(exprs)),
            PlanOp::Filter { condition } => format!("LogicalFilter(condition=[{condition}])"),
            PlanOp::Aggregate { group, calls } => {
                let mut desc = format!("LogicalAggregate(group=[{{{}}}]", group.join(", "));
                if !calls.is_empty() {
                    let _ = write!(desc, ", {}", render_named(calls));
                }
                desc.push(')');
                desc
            }
            PlanOp::Join { kind, condition } => format!(
                "LogicalJoin(condition=[{}], joinType=[{}])",
                condition.as_deref().unwrap_or("true"),
                kind
            ),
            PlanOp::SetOp { kind, all } => format!("Logical{kind}(all=[{all}])"),
            PlanOp::Sort {
                keys,
                offset,
                fetch,
            } => {
                let mut parts = Vec::new();
                if !keys.is_empty() {
                    parts.push(format!("sort=[{}]", keys.join(", ")));
                }
                if let Some(offset) = offset {
                    parts.push(format!("offset=[{offset}]"));
                }
                if let Some(fetch) = fetch {
                    parts.push(format!("fetch=[{fetch}]"));
                }
                format!("LogicalSort({})", parts.join(", "))
            }
            PlanOp::Values { tuples } => format!("LogicalValues(tuples=[{}])", render_tuples(tuples)),
            PlanOp::TableScan { path } => format!(
                "LogicalTableScan(table=[[{}, {}, {}]])",
                path.catalog, path.database, path.name
            ),
        }
    }

    /// Physical operator description, e.g. `Calc(where=[a > 1])`.
    pub fn physical_description(&self) -> String {
        let field_names = || {
            self.fields
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match &self.op {
            PlanOp::Sink { path, fields } => {
                format!("Sink(table=[{}], fields=[{}])", path, fields.join(", "))
            }
            PlanOp::Project { exprs } => format!(
                "Calc(select=[{}])",
                exprs
                    .iter()
                    .map(|(name, expr)| {
                        if name == expr {
                            name.clone()
                        } else {
                            format!("{expr} AS {name}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            PlanOp::Filter { condition } => format!("Calc(where=[{condition}])"),
            PlanOp::Aggregate { group, calls } => {
                let select = group
                    .iter()
                    .cloned()
                    .chain(calls.iter().map(|(name, expr)| format!("{expr} AS {name}")))
                    .collect::<Vec<_>>()
                    .join(", ");
                if group.is_empty() {
                    format!("GroupAggregate(select=[{select}])")
                } else {
                    format!(
                        "GroupAggregate(groupBy=[{}], select=[{}])",
                        group.join(", "),
                        select
                    )
                }
            }
            PlanOp::Join { kind, condition } => format!(
                "Join(joinType=[{}Join], where=[{}], select=[{}])",
                capitalize(kind),
                condition.as_deref().unwrap_or("true"),
                field_names()
            ),
            PlanOp::SetOp { kind, all } => format!("{kind}(all=[{all}], union=[{}])", field_names()),
            PlanOp::Sort {
                keys,
                offset,
                fetch,
            } => {
                let offset = offset.as_deref().unwrap_or("0");
                match (keys.is_empty(), fetch) {
                    (true, Some(fetch)) => format!("Limit(offset=[{offset}], fetch=[{fetch}])"),
                    (false, Some(fetch)) => format!(
                        "SortLimit(orderBy=[{}], offset=[{offset}], fetch=[{fetch}])",
                        keys.join(", ")
                    ),
                    (_, None) => format!("Sort(orderBy=[{}], offset=[{offset}])", keys.join(", ")),
                }
            }
            PlanOp::Values { tuples } => format!("Values(tuples=[{}])", render_tuples(tuples)),
            PlanOp::TableScan { path } => format!(
                "TableSourceScan(table=[[{}, {}, {}]], fields=[{}])",
                path.catalog,
                path.database,
                path.name,
                field_names()
            ),
        }
    }

    fn physical_line(&self, details: &[ExplainDetail]) -> String {
        let mut line = self.physical_description();
        if details.contains(&ExplainDetail::ChangelogMode) {
            // Insert before the closing parenthesis.
            line.pop();
            let mode = if self.produces_updates() { "I,UB,UA" } else { "I" };
            let _ = write!(line, ", changelogMode=[{mode}])");
        }
        if details.contains(&ExplainDetail::EstimatedCost) {
            let _ = write!(
                line,
                ": rowcount = {:.1E}, cumulative cost = {{{:.1E} rows}}",
                self.estimated_rows(),
                self.cumulative_rows()
            );
        }
        line
    }

    /// Renders the logical plan as an indented tree.
    pub fn render_logical(&self) -> String {
        let mut out = String::new();
        render_tree(self, &mut out, "", None, &|node| node.logical_description());
        out
    }

    /// Renders the physical plan as an indented tree.
    pub fn render_physical(&self, details: &[ExplainDetail]) -> String {
        let mut out = String::new();
        render_tree(self, &mut out, "", None, &|node| node.physical_line(details));
        out
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn render_named(items: &[(String, String)]) -> String {
    items
        .iter()
        .map(|(name, expr)| format!("{name}=[{expr}]"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_tuples(tuples: &[Vec<String>]) -> String {
    tuples
        .iter()
        .map(|row| format!("{{ {} }}", row.join(", ")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Writes `node` and its inputs using the `:- ` / `+- ` tree notation.
fn render_tree(
    node: &PlanNode,
    out: &mut String,
    prefix: &str,
    is_last: Option<bool>,
    describe: &dyn Fn(&PlanNode) -> String,
) {
    let (branch, child_prefix) = match is_last {
        None => (String::new(), String::new()),
        Some(true) => (format!("{prefix}+- "), format!("{prefix}   ")),
        Some(false) => (format!("{prefix}:- "), format!("{prefix}:  ")),
    };
    let _ = writeln!(out, "{branch}{}", describe(node));
    let count = node.inputs.len();
    for (i, input) in node.inputs.iter().enumerate() {
        render_tree(input, out, &child_prefix, Some(i + 1 == count), describe);
    }
}

/// Builds plans for statements against a catalog snapshot.
pub struct Planner<'a> {
    catalog: &'a Catalog,
}

type Ctes = HashMap<String, PlanNode>;

impl<'a> Planner<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Plans a query or INSERT statement. Other statements have no plan.
    pub fn plan_statement(&self, statement: &Statement) -> Result<Option<PlanNode>> {
        match statement {
            Statement::Query(query) => self.plan_query(query, &Ctes::new()).map(Some),
            Statement::Insert(insert) => {
                let path = self.catalog.qualify(&object_parts(&insert.table_name))?;
                let sink_columns = match self.catalog.resolve(&path)? {
                    CatalogObject::Table { columns, .. } => columns.clone(),
                    CatalogObject::View { .. } => {
                        return Err(FragsqlError::validation(format!(
                            "'{}' is a view; INSERT requires a table",
                            path
                        )))
                    }
                };
                let source = insert.source.as_ref().ok_or_else(|| {
                    FragsqlError::validation("INSERT requires a source query")
                })?;
                let input = self.plan_query(source, &Ctes::new())?;

                let fields: Vec<String> = if insert.columns.is_empty() {
                    sink_columns.iter().map(|c| c.name.clone()).collect()
                } else {
                    let mut named = Vec::with_capacity(insert.columns.len());
                    for ident in &insert.columns {
                        let column = sink_columns
                            .iter()
                            .find(|c| c.name.eq_ignore_ascii_case(&ident.value))
                            .ok_or_else(|| {
                                FragsqlError::validation(format!(
                                    "Unknown target column '{}' in sink '{}'",
                                    ident.value, path
                                ))
                            })?;
                        named.push(column.name.clone());
                    }
                    named
                };

                if fields.len() != input.fields.len() {
                    return Err(FragsqlError::validation(format!(
                        "Column types of query result and sink for '{}' do not match. \
                         Query has {} columns, sink has {}.",
                        path,
                        input.fields.len(),
                        fields.len()
                    )));
                }

                let out_fields = input.fields.clone();
                Ok(Some(PlanNode::new(
                    PlanOp::Sink { path, fields },
                    vec![input],
                    out_fields,
                )))
            }
            _ => Ok(None),
        }
    }

    fn plan_query(&self, query: &Query, ctes: &Ctes) -> Result<PlanNode> {
        let mut scope = ctes.clone();
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                let name = cte.alias.name.value.clone();
                let plan = self.plan_query(&cte.query, &scope)?;
                scope.insert(name.to_lowercase(), requalify(plan, &name));
            }
        }

        let mut node = self.plan_set_expr(&query.body, &scope)?;
        let keys: Vec<String> = query
            .order_by
            .as_ref()
            .map(|order_by| order_by.exprs.iter().map(sort_key).collect())
            .unwrap_or_default();
        let offset = query.offset.as_ref().map(|o| o.value.to_string());
        let fetch = query.limit.as_ref().map(ToString::to_string);
        if !keys.is_empty() || offset.is_some() || fetch.is_some() {
            let fields = node.fields.clone();
            node = PlanNode::new(
                PlanOp::Sort {
                    keys,
                    offset,
                    fetch,
                },
                vec![node],
                fields,
            );
        }
        Ok(node)
    }

    fn plan_set_expr(&self, body: &SetExpr, ctes: &Ctes) -> Result<PlanNode> {
        match body {
            SetExpr::Select(select) => self.plan_select(select, ctes),
            SetExpr::Query(query) => self.plan_query(query, ctes),
            SetExpr::SetOperation {
                op,
                set_quantifier,
                left,
                right,
            } => {
                let left = self.plan_set_expr(left, ctes)?;
                let right = self.plan_set_expr(right, ctes)?;
                if left.fields.len() != right.fields.len() {
                    return Err(FragsqlError::validation(format!(
                        "Set operation inputs have different column counts: {} and {}",
                        left.fields.len(),
                        right.fields.len()
                    )));
                }
                let kind = match op {
                    SetOperator::Union => "Union",
                    SetOperator::Intersect => "Intersect",
                    _ => "Minus",
                };
                let fields = left
                    .fields
                    .iter()
                    .map(|f| Field {
                        qualifier: None,
                        ..f.clone()
                    })
                    .collect();
                Ok(PlanNode::new(
                    PlanOp::SetOp {
                        kind,
                        all: matches!(set_quantifier, SetQuantifier::All),
                    },
                    vec![left, right],
                    fields,
                ))
            }
            SetExpr::Values(values) => {
                let first = values.rows.first().ok_or_else(|| {
                    FragsqlError::validation("VALUES requires at least one row")
                })?;
                let fields = first
                    .iter()
                    .enumerate()
                    .map(|(i, expr)| Field {
                        qualifier: None,
                        name: format!("EXPR${i}"),
                        data_type: infer_type(expr, &[]),
                    })
                    .collect();
                let tuples = values
                    .rows
                    .iter()
                    .map(|row| row.iter().map(ToString::to_string).collect())
                    .collect();
                Ok(PlanNode::new(PlanOp::Values { tuples }, vec![], fields))
            }
            other => Err(FragsqlError::unsupported(format!(
                "Unsupported query body: {other}"
            ))),
        }
    }

    fn plan_select(&self, select: &Select, ctes: &Ctes) -> Result<PlanNode> {
        let mut input = match select.from.split_first() {
            None => PlanNode::new(
                PlanOp::Values {
                    tuples: vec![vec!["0".to_string()]],
                },
                vec![],
                vec![Field {
                    qualifier: None,
                    name: "ZERO".to_string(),
                    data_type: "INT".to_string(),
                }],
            ),
            Some((first, rest)) => {
                let mut node = self.plan_from(first, ctes)?;
                for item in rest {
                    let right = self.plan_from(item, ctes)?;
                    node = join(node, right, "inner", None);
                }
                node
            }
        };

        if let Some(selection) = &select.selection {
            check_expr_columns(selection, &input.fields)?;
            let fields = input.fields.clone();
            input = PlanNode::new(
                PlanOp::Filter {
                    condition: selection.to_string(),
                },
                vec![input],
                fields,
            );
        }

        let projection = expand_projection(&select.projection, &input.fields)?;

        let group: Vec<String> = match &select.group_by {
            GroupByExpr::Expressions(exprs, ..) => exprs.iter().map(ToString::to_string).collect(),
            _ => projection
                .iter()
                .filter(|(_, expr, _)| !self.is_aggregate_call(expr))
                .map(|(_, expr, _)| expr.to_string())
                .collect(),
        };
        let has_aggregates = projection
            .iter()
            .any(|(_, expr, _)| self.is_aggregate_call(expr));

        let fields: Vec<Field> = projection
            .iter()
            .map(|(name, expr, data_type)| Field {
                qualifier: None,
                name: name.clone(),
                data_type: data_type
                    .clone()
                    .or_else(|| self.function_type(expr))
                    .unwrap_or_else(|| infer_type(expr, &input.fields)),
            })
            .collect();

        let mut node = if has_aggregates || !group.is_empty() {
            let calls = projection
                .iter()
                .filter(|(_, expr, _)| self.is_aggregate_call(expr))
                .map(|(name, expr, _)| (name.clone(), expr.to_string()))
                .collect();
            PlanNode::new(PlanOp::Aggregate { group, calls }, vec![input], fields)
        } else {
            let exprs = projection
                .iter()
                .map(|(name, expr, _)| (name.clone(), expr.to_string()))
                .collect();
            PlanNode::new(PlanOp::Project { exprs }, vec![input], fields)
        };

        if let Some(having) = &select.having {
            let fields = node.fields.clone();
            node = PlanNode::new(
                PlanOp::Filter {
                    condition: having.to_string(),
                },
                vec![node],
                fields,
            );
        }

        if select.distinct.is_some() {
            let fields = node.fields.clone();
            let group = fields.iter().map(|f| f.name.clone()).collect();
            node = PlanNode::new(
                PlanOp::Aggregate {
                    group,
                    calls: vec![],
                },
                vec![node],
                fields,
            );
        }

        Ok(node)
    }

    fn plan_from(&self, from: &TableWithJoins, ctes: &Ctes) -> Result<PlanNode> {
        let mut node = self.plan_factor(&from.relation, ctes)?;
        for j in &from.joins {
            let right = self.plan_factor(&j.relation, ctes)?;
            let (kind, constraint) = join_parts(&j.join_operator);
            let condition = match constraint {
                Some(JoinConstraint::On(expr)) => {
                    let mut scope = node.fields.clone();
                    scope.extend(right.fields.iter().cloned());
                    check_expr_columns(expr, &scope)?;
                    Some(expr.to_string())
                }
                _ => None,
            };
            node = join(node, right, kind, condition);
        }
        Ok(node)
    }

    fn plan_factor(&self, factor: &TableFactor, ctes: &Ctes) -> Result<PlanNode> {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let parts = object_parts(name);
                let visible = alias
                    .as_ref()
                    .map(|a| a.name.value.clone())
                    .unwrap_or_else(|| parts.last().cloned().unwrap_or_default());

                if let [single] = parts.as_slice() {
                    if let Some(cte) = ctes.get(&single.to_lowercase()) {
                        return Ok(requalify(cte.clone(), &visible));
                    }
                }

                let path = self.catalog.qualify(&parts)?;
                let object = self.catalog.resolve(&path)?;
                let fields = object
                    .columns()
                    .iter()
                    .map(|c| Field {
                        qualifier: Some(visible.clone()),
                        name: c.name.clone(),
                        data_type: c.data_type.clone(),
                    })
                    .collect();
                Ok(PlanNode::new(PlanOp::TableScan { path }, vec![], fields))
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                let plan = self.plan_query(subquery, ctes)?;
                Ok(match alias {
                    Some(alias) => requalify(plan, &alias.name.value),
                    None => plan,
                })
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.plan_from(table_with_joins, ctes),
            other => Err(FragsqlError::unsupported(format!(
                "Unsupported table reference: {other}"
            ))),
        }
    }

    fn is_aggregate_call(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Function(function) => {
                let name = function.name.to_string();
                match self.catalog.function(&name) {
                    Some(udf) => udf.kind.is_aggregate(),
                    None => AGGREGATE_FUNCTIONS.contains(&name.to_uppercase().as_str()),
                }
            }
            Expr::Nested(inner) => self.is_aggregate_call(inner),
            _ => false,
        }
    }

    /// Declared return type of a call to a registered function.
    fn function_type(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Function(function) => self
                .catalog
                .function(&function.name.to_string())
                .map(|udf| udf.return_type.clone()),
            Expr::Nested(inner) => self.function_type(inner),
            _ => None,
        }
    }
}

fn sort_key(key: &OrderByExpr) -> String {
    let direction = if key.asc == Some(false) { "DESC" } else { "ASC" };
    format!("{} {direction}", key.expr)
}

fn join(left: PlanNode, right: PlanNode, kind: &'static str, condition: Option<String>) -> PlanNode {
    let mut fields = left.fields.clone();
    fields.extend(right.fields.iter().cloned());
    PlanNode::new(PlanOp::Join { kind, condition }, vec![left, right], fields)
}

fn join_parts(op: &JoinOperator) -> (&'static str, Option<&JoinConstraint>) {
    match op {
        JoinOperator::Inner(c) => ("inner", Some(c)),
        JoinOperator::LeftOuter(c) => ("left", Some(c)),
        JoinOperator::RightOuter(c) => ("right", Some(c)),
        JoinOperator::FullOuter(c) => ("full", Some(c)),
        _ => ("inner", None),
    }
}

fn requalify(mut plan: PlanNode, qualifier: &str) -> PlanNode {
    for field in &mut plan.fields {
        field.qualifier = Some(qualifier.to_string());
    }
    plan
}

pub(crate) fn object_parts(name: &ObjectName) -> Vec<String> {
    name.0.iter().map(|ident| ident.value.clone()).collect()
}

/// Expands the select list into `(output name, expression, known type)`.
fn expand_projection(
    items: &[SelectItem],
    input: &[Field],
) -> Result<Vec<(String, Expr, Option<String>)>> {
    let mut out = Vec::new();
    for (i, item) in items.iter().enumerate() {
        match item {
            SelectItem::UnnamedExpr(expr) => {
                check_expr_columns(expr, input)?;
                let name = match expr {
                    Expr::Identifier(ident) => ident.value.clone(),
                    Expr::CompoundIdentifier(idents) => idents
                        .last()
                        .map(|ident| ident.value.clone())
                        .unwrap_or_default(),
                    _ => format!("EXPR${i}"),
                };
                out.push((name, expr.clone(), None));
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                check_expr_columns(expr, input)?;
                out.push((alias.value.clone(), expr.clone(), None));
            }
            SelectItem::Wildcard(..) => {
                for field in input {
                    out.push((
                        field.name.clone(),
                        Expr::Identifier(field.name.as_str().into()),
                        Some(field.data_type.clone()),
                    ));
                }
            }
            SelectItem::QualifiedWildcard(name, ..) => {
                let qualifier = object_parts(name).last().cloned().unwrap_or_default();
                let matching: Vec<&Field> = input
                    .iter()
                    .filter(|f| {
                        f.qualifier
                            .as_deref()
                            .is_some_and(|q| q.eq_ignore_ascii_case(&qualifier))
                    })
                    .collect();
                if matching.is_empty() {
                    return Err(FragsqlError::validation(format!(
                        "Unknown table '{qualifier}' in '{qualifier}.*'"
                    )));
                }
                for field in matching {
                    out.push((
                        field.name.clone(),
                        Expr::Identifier(field.name.as_str().into()),
                        Some(field.data_type.clone()),
                    ));
                }
            }
        }
    }
    Ok(out)
}

fn find_field<'f>(fields: &'f [Field], qualifier: Option<&str>, name: &str) -> Result<&'f Field> {
    let matches: Vec<&Field> = fields
        .iter()
        .filter(|f| f.name.eq_ignore_ascii_case(name))
        .filter(|f| match qualifier {
            Some(q) => f
                .qualifier
                .as_deref()
                .is_some_and(|fq| fq.eq_ignore_ascii_case(q)),
            None => true,
        })
        .collect();

    let display = match qualifier {
        Some(q) => format!("{q}.{name}"),
        None => name.to_string(),
    };
    match matches.as_slice() {
        [single] => Ok(single),
        [] => Err(FragsqlError::validation(format!(
            "Column '{display}' not found in any table"
        ))),
        _ => Err(FragsqlError::validation(format!(
            "Column '{display}' is ambiguous"
        ))),
    }
}

/// Checks that plain and qualified column references resolve.
///
/// Only the shallow shapes are visited: identifiers, binary and unary
/// operators, nesting and function names are left to the engine proper.
fn check_expr_columns(expr: &Expr, fields: &[Field]) -> Result<()> {
    match expr {
        Expr::Identifier(ident) => find_field(fields, None, &ident.value).map(|_| ()),
        Expr::CompoundIdentifier(idents) => match idents.as_slice() {
            [qualifier, column] => {
                find_field(fields, Some(&qualifier.value), &column.value).map(|_| ())
            }
            _ => Ok(()),
        },
        Expr::BinaryOp { left, right, .. } => {
            check_expr_columns(left, fields)?;
            check_expr_columns(right, fields)
        }
        Expr::UnaryOp { expr, .. } | Expr::Nested(expr) => check_expr_columns(expr, fields),
        Expr::IsNull(expr) | Expr::IsNotNull(expr) => check_expr_columns(expr, fields),
        _ => Ok(()),
    }
}

fn infer_type(expr: &Expr, fields: &[Field]) -> String {
    match expr {
        Expr::Identifier(ident) => find_field(fields, None, &ident.value)
            .map(|f| f.data_type.clone())
            .unwrap_or_else(|_| "UNKNOWN".to_string()),
        Expr::CompoundIdentifier(idents) => match idents.as_slice() {
            [qualifier, column] => find_field(fields, Some(&qualifier.value), &column.value)
                .map(|f| f.data_type.clone())
                .unwrap_or_else(|_| "UNKNOWN".to_string()),
            _ => "UNKNOWN".to_string(),
        },
        Expr::Value(SqlValue::Number(n, _)) if n.contains('.') => "DECIMAL".to_string(),
        Expr::Value(SqlValue::Number(..)) => "INT".to_string(),
        Expr::Value(SqlValue::SingleQuotedString(_)) => "STRING".to_string(),
        Expr::Value(SqlValue::Boolean(_)) => "BOOLEAN".to_string(),
        Expr::Value(SqlValue::Null) => "NULL".to_string(),
        Expr::Function(function)
            if function.name.to_string().eq_ignore_ascii_case("COUNT") =>
        {
            "BIGINT".to_string()
        }
        Expr::Nested(inner) => infer_type(inner, fields),
        _ => "UNKNOWN".to_string(),
    }
}
