//! `QueryContext` and the caller-facing parameter object.
//!
//! spec.md scopes the schema/context factory that produces these values as
//! an external collaborator (§1) — only the *interface* is implemented here:
//! a flat table/column lookup and a parameter bag, both loadable from a
//! config file by the CLI (`SPEC_FULL.md` §E) rather than introspected from
//! a live database connection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single table's column list, as declared by the caller (or the CLI's
/// `--schema` file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<String>,
}

/// The logical schema a query chain compiles against: table name ->
/// row shape. Used by the chain recognizer to validate `from`/`join` table
/// references and by the lambda converter to validate column member access.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryContext {
    tables: HashMap<String, TableSchema>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, columns: Vec<String>) -> Self {
        self.tables.insert(name.into(), TableSchema { columns });
        self
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .map(|t| t.columns.iter().any(|c| c == column))
            .unwrap_or(false)
    }
}

/// A scalar or array value from the caller's params object, referenced as
/// `p.foo` / `p.ids[0]` inside a lambda (spec.md §6.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    Array(Vec<ParamValue>),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{}", n),
            ParamValue::String(s) => write!(f, "{}", s),
            ParamValue::Boolean(b) => write!(f, "{}", b),
            ParamValue::Null => write!(f, "null"),
            ParamValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// The caller-supplied named parameter object (spec.md §6.1).
pub type QueryParams = HashMap<String, ParamValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_reports_known_tables_and_columns() {
        let ctx = QueryContext::new()
            .with_table("users", vec!["id".into(), "age".into(), "name".into()])
            .with_table("departments", vec!["id".into(), "name".into()]);

        assert!(ctx.has_table("users"));
        assert!(!ctx.has_table("orders"));
        assert!(ctx.has_column("users", "age"));
        assert!(!ctx.has_column("users", "nonexistent"));
    }
}
