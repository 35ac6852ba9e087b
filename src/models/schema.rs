//! Schema-related data models.
//!
//! This module defines the normalized column description produced by table
//! introspection, the declared table definitions it is compared against, and
//! the comparison report.

use crate::db::connection::Row;
use crate::db::types::TypeMatch;
use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

/// Canonical description of one live column.
///
/// Keys are lower-cased driver attributes with `field` renamed to `name` and
/// `null` renamed to `is_nullable`; every other attribute (`type`, `key`,
/// `default`, `extra`, ...) is passed through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnDescriptor(Row);

impl ColumnDescriptor {
    pub(crate) fn from_map(map: Row) -> Self {
        Self(map)
    }

    /// Column name, empty if the driver did not report one.
    pub fn name(&self) -> &str {
        self.get_str("name").unwrap_or_default()
    }

    /// Native database type, e.g. `varchar(50)`.
    pub fn native_type(&self) -> &str {
        self.get_str("type").unwrap_or_default()
    }

    /// True when the driver reports the column as nullable (`YES`).
    pub fn is_nullable(&self) -> bool {
        self.get_str("is_nullable")
            .is_some_and(|v| v.eq_ignore_ascii_case("yes"))
    }

    /// Any attribute by its lower-cased key.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(JsonValue::as_str)
    }

    pub fn into_map(self) -> Row {
        self.0
    }
}

fn default_nullable() -> bool {
    true
}

/// A column as declared by the application's table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredColumn {
    pub name: String,
    /// Abstract type, e.g. `character varying(50)`, `INTEGER`, `boolean`
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default = "default_nullable", alias = "null")]
    pub nullable: bool,
}

impl DeclaredColumn {
    /// Create a nullable column declaration.
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            nullable: true,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Expected structure of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<DeclaredColumn>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: DeclaredColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Load definitions from a JSON file holding one table or a list of tables.
    pub fn load_file(path: &Path) -> DbResult<Vec<TableDefinition>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DbError::invalid_input(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content).map_err(|e| DbError::schema(e.to_string(), path.display().to_string()))
    }

    /// Parse one table or a list of tables.
    pub fn from_json(content: &str) -> Result<Vec<TableDefinition>, serde_json::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum DefinitionFile {
            One(TableDefinition),
            Many(Vec<TableDefinition>),
        }

        Ok(match serde_json::from_str(content)? {
            DefinitionFile::One(def) => vec![def],
            DefinitionFile::Many(defs) => defs,
        })
    }
}

/// One difference between a declared table and the live one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ColumnIssue {
    /// Declared but absent from the database
    Missing { column: String },
    /// Present with an incompatible native type
    TypeMismatch {
        column: String,
        db_type: String,
        xml_type: String,
    },
    /// Nullability differs from the declaration
    NullabilityMismatch {
        column: String,
        db_nullable: bool,
        xml_nullable: bool,
    },
    /// Present in the database but not declared
    Undeclared { column: String },
}

impl std::fmt::Display for ColumnIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing { column } => write!(f, "column '{}' is missing", column),
            Self::TypeMismatch {
                column,
                db_type,
                xml_type,
            } => write!(
                f,
                "column '{}' has type '{}', expected '{}'",
                column, db_type, xml_type
            ),
            Self::NullabilityMismatch {
                column,
                xml_nullable,
                ..
            } => write!(
                f,
                "column '{}' should {}allow NULL",
                column,
                if *xml_nullable { "" } else { "not " }
            ),
            Self::Undeclared { column } => write!(f, "column '{}' is not declared", column),
        }
    }
}

/// A column whose type satisfied the declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedColumn {
    pub column: String,
    pub rule: TypeMatch,
}

/// Result of comparing a table definition against the live table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub table: String,
    /// False when the table itself does not exist
    pub exists: bool,
    pub matched: Vec<MatchedColumn>,
    pub issues: Vec<ColumnIssue>,
}

impl TableReport {
    /// True when the live table satisfies the declaration.
    pub fn is_compatible(&self) -> bool {
        self.exists && self.issues.is_empty()
    }
}
