//! In-memory catalog for the local engine.
//!
//! Tables and views are addressed by a three-part path
//! `catalog.database.name`; shorter references are qualified against the
//! session defaults. User-defined functions live in a flat, case-insensitive
//! namespace.

use crate::error::{FragsqlError, Result};
use std::collections::BTreeMap;
use std::fmt;

use super::{ColumnInfo, FunctionKind};

/// Fully qualified catalog path of a table or view.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectPath {
    pub catalog: String,
    pub database: String,
    pub name: String,
}

impl ObjectPath {
    pub fn new(
        catalog: impl Into<String>,
        database: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            database: database.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.database, self.name)
    }
}

/// A registered catalog object.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogObject {
    Table {
        columns: Vec<ColumnInfo>,
        options: Vec<String>,
    },
    View {
        columns: Vec<ColumnInfo>,
        query: String,
    },
}

impl CatalogObject {
    pub fn columns(&self) -> &[ColumnInfo] {
        match self {
            Self::Table { columns, .. } | Self::View { columns, .. } => columns,
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Table { .. } => "Table",
            Self::View { .. } => "View",
        }
    }
}

/// A registered user-defined function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFunction {
    pub name: String,
    pub kind: FunctionKind,
    pub return_type: String,
}

/// Catalog state owned by one engine instance.
#[derive(Debug, Clone)]
pub struct Catalog {
    default_catalog: String,
    default_database: String,
    objects: BTreeMap<ObjectPath, CatalogObject>,
    /// Keyed by upper-cased name.
    functions: BTreeMap<String, UserFunction>,
}

impl Catalog {
    /// Creates an empty catalog with the given defaults.
    pub fn new(default_catalog: impl Into<String>, default_database: impl Into<String>) -> Self {
        Self {
            default_catalog: default_catalog.into(),
            default_database: default_database.into(),
            objects: BTreeMap::new(),
            functions: BTreeMap::new(),
        }
    }

    pub fn default_catalog(&self) -> &str {
        &self.default_catalog
    }

    pub fn default_database(&self) -> &str {
        &self.default_database
    }

    /// Qualifies a one to three part identifier against the defaults.
    pub fn qualify(&self, parts: &[String]) -> Result<ObjectPath> {
        match parts {
            [name] => Ok(ObjectPath::new(
                &self.default_catalog,
                &self.default_database,
                name,
            )),
            [database, name] => Ok(ObjectPath::new(&self.default_catalog, database, name)),
            [catalog, database, name] => Ok(ObjectPath::new(catalog, database, name)),
            _ => Err(FragsqlError::validation(format!(
                "Invalid object identifier '{}'",
                parts.join(".")
            ))),
        }
    }

    /// Looks up an object by path.
    pub fn get(&self, path: &ObjectPath) -> Option<&CatalogObject> {
        self.objects.get(path)
    }

    /// Looks up an object by path, failing if it does not exist.
    pub fn resolve(&self, path: &ObjectPath) -> Result<&CatalogObject> {
        self.get(path).ok_or_else(|| {
            FragsqlError::validation(format!("Object '{}' not found", path.name))
        })
    }

    /// Registers an object. Returns false if it already existed and
    /// `if_not_exists` was set.
    pub fn create(
        &mut self,
        path: ObjectPath,
        object: CatalogObject,
        if_not_exists: bool,
    ) -> Result<bool> {
        if let Some(existing) = self.objects.get(&path) {
            if if_not_exists {
                return Ok(false);
            }
            return Err(FragsqlError::catalog(format!(
                "{} '{}' already exists",
                existing.label(),
                path
            )));
        }
        self.objects.insert(path, object);
        Ok(true)
    }

    /// Removes a table (`tables == true`) or view. Returns false if it did not
    /// exist and `if_exists` was set.
    pub fn drop(&mut self, path: &ObjectPath, tables: bool, if_exists: bool) -> Result<bool> {
        let label = if tables { "Table" } else { "View" };
        match self.objects.get(path) {
            Some(object) if object.is_table() == tables => {
                self.objects.remove(path);
                Ok(true)
            }
            Some(object) => Err(FragsqlError::catalog(format!(
                "'{}' is a {}, not a {}",
                path,
                object.label().to_lowercase(),
                label.to_lowercase()
            ))),
            None if if_exists => Ok(false),
            None => Err(FragsqlError::catalog(format!(
                "{} '{}' does not exist",
                label, path
            ))),
        }
    }

    /// Registers a function. An existing function with the same name is
    /// replaced.
    pub fn register_function(&mut self, function: UserFunction) -> Result<()> {
        if function.name.trim().is_empty() {
            return Err(FragsqlError::catalog("Function name must not be empty"));
        }
        self.functions.insert(function.name.to_uppercase(), function);
        Ok(())
    }

    /// Looks up a function by name, ignoring case.
    pub fn function(&self, name: &str) -> Option<&UserFunction> {
        self.functions.get(&name.to_uppercase())
    }

    /// Names of all registered functions, in the case they were registered.
    pub fn function_names(&self) -> Vec<String> {
        self.functions.values().map(|f| f.name.clone()).collect()
    }

    /// Names of all objects in the default database, sorted.
    pub fn object_names(&self) -> Vec<String> {
        self.objects
            .keys()
            .filter(|p| p.catalog == self.default_catalog && p.database == self.default_database)
            .map(|p| p.name.clone())
            .collect()
    }
}
