//! SQL fragment registry.
//!
//! Fragments are named SQL snippets defined with `name := sql` and
//! referenced as `${name}` in later statements. The registry expands
//! references before statements reach the engine.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::engine::{ColumnInfo, Row, Table, TableResult, Value};
use crate::error::{FragsqlError, Result};

/// Pseudo-command that lists all fragments.
pub const SHOW_FRAGMENTS: &str = "SHOW FRAGMENTS";

const DEFINITION_PATTERN: &str = r"(?s)^(\S*)\s*:=\s*(.*)$";
const REFERENCE_PATTERN: &str = r"\$\{(.+?)\}";

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> Result<&'static Regex> {
    if let Some(regex) = cell.get() {
        return Ok(regex);
    }
    let regex = Regex::new(pattern)
        .map_err(|e| FragsqlError::internal(format!("Invalid fragment pattern: {e}")))?;
    Ok(cell.get_or_init(|| regex))
}

fn definition_regex() -> Result<&'static Regex> {
    static DEFINITION: OnceLock<Regex> = OnceLock::new();
    cached(&DEFINITION, DEFINITION_PATTERN)
}

fn reference_regex() -> Result<&'static Regex> {
    static REFERENCE: OnceLock<Regex> = OnceLock::new();
    cached(&REFERENCE, REFERENCE_PATTERN)
}

#[derive(Clone, Copy)]
enum Scan {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Splits `text` on `;` outside quoted literals and comments.
fn split_statements(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut state = Scan::Code;
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let next = chars.peek().map(|&(_, n)| n);
        match (state, c) {
            (Scan::Code, '\'' | '"' | '`') => state = Scan::Quoted(c),
            (Scan::Code, '-') if next == Some('-') => {
                chars.next();
                state = Scan::LineComment;
            }
            (Scan::Code, '/') if next == Some('*') => {
                chars.next();
                state = Scan::BlockComment;
            }
            (Scan::Code, ';') => {
                pieces.push(&text[start..i]);
                start = i + 1;
            }
            (Scan::Quoted(q), _) if q == c => state = Scan::Code,
            (Scan::LineComment, '\n') => state = Scan::Code,
            (Scan::BlockComment, '*') if next == Some('/') => {
                chars.next();
                state = Scan::Code;
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);
    pieces
}

/// Drops whitespace and `--` / `/* */` comments in front of a statement.
fn strip_leading_comments(piece: &str) -> &str {
    let mut rest = piece.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map_or("", |i| &after[i + 1..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |i| &after[i + 2..]);
        } else {
            return rest.trim_end();
        }
        rest = rest.trim_start();
    }
}

/// Returns true if `statement` is the fragment-listing pseudo-command.
pub fn check_show_fragments(statement: &str) -> bool {
    let trimmed = statement.trim();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
    trimmed.to_uppercase() == SHOW_FRAGMENTS
}

/// Named SQL fragments owned by one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentRegistry {
    fragments: BTreeMap<String, String>,
}

impl FragmentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or redefines) a fragment.
    pub fn register(&mut self, name: impl Into<String>, sql: impl Into<String>) -> Result<()> {
        let name = name.into();
        let sql = sql.into();
        if name.trim().is_empty() {
            return Err(FragsqlError::fragment("Illegal variable name."));
        }
        if sql.trim().is_empty() {
            return Err(FragsqlError::fragment("Illegal variable definition."));
        }
        debug!(fragment = %name, "Registered sql fragment");
        self.fragments.insert(name, sql);
        Ok(())
    }

    /// Removes a fragment.
    pub fn unregister(&mut self, name: &str) -> Result<String> {
        self.fragments.remove(name).ok_or_else(|| not_found(name))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fragments.get(name).map(String::as_str)
    }

    /// Looks up a fragment, failing if it is not defined.
    pub fn get_or_err(&self, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| not_found(name))
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    /// Iterates fragments in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fragments
            .iter()
            .map(|(name, sql)| (name.as_str(), sql.as_str()))
    }

    /// Registers every `name := value` piece of `statement` and expands
    /// `${name}` references in the rest.
    ///
    /// Returns an empty string when `statement` held only definitions.
    /// Definitions are committed only if every piece is valid.
    pub fn parse_variable(&mut self, statement: &str) -> Result<String> {
        let definition = definition_regex()?;
        let mut staged = self.fragments.clone();
        let mut defined = Vec::new();
        let mut remaining = Vec::new();

        for piece in split_statements(statement) {
            let piece = strip_leading_comments(piece);
            if piece.is_empty() {
                continue;
            }
            match definition.captures(piece) {
                Some(caps) => {
                    let name = caps.get(1).map_or("", |m| m.as_str());
                    let value = caps.get(2).map_or("", |m| m.as_str()).trim();
                    if name.is_empty() {
                        return Err(FragsqlError::fragment("Illegal variable name."));
                    }
                    if value.is_empty() {
                        return Err(FragsqlError::fragment("Illegal variable definition."));
                    }
                    let value = expand_references(&staged, value)?;
                    staged.insert(name.to_string(), value);
                    defined.push(name);
                }
                None => remaining.push(expand_references(&staged, piece)?),
            }
        }

        for name in defined {
            debug!(fragment = %name, "Registered sql fragment");
        }
        self.fragments = staged;
        Ok(remaining.join(";\n"))
    }

    fn columns() -> Vec<ColumnInfo> {
        vec![
            ColumnInfo::new("fragmentName", "STRING"),
            ColumnInfo::new("fragmentSql", "STRING"),
        ]
    }

    fn rows(&self) -> Vec<Row> {
        self.iter()
            .map(|(name, sql)| vec![Value::from(name), Value::from(sql)])
            .collect()
    }

    /// All fragments as a table.
    pub fn fragments_table(&self) -> Table {
        Table::from_values(Self::columns(), self.rows())
    }

    /// All fragments as a statement result.
    pub fn fragments_result(&self) -> TableResult {
        TableResult::with_content(Self::columns(), self.rows())
    }
}

fn not_found(name: &str) -> FragsqlError {
    FragsqlError::fragment(format!("The fragment of sql {name} does not exist."))
}

/// Replaces `${name}` references; undefined references are kept.
fn expand_references(fragments: &BTreeMap<String, String>, text: &str) -> Result<String> {
    let reference = reference_regex()?;
    let expanded = reference.replace_all(text, |caps: &Captures| {
        let name = &caps[1];
        match fragments.get(name) {
            Some(sql) => {
                debug!(fragment = %name, "Expanded sql fragment");
                sql.clone()
            }
            None => caps[0].to_string(),
        }
    });
    Ok(expanded.into_owned())
}
