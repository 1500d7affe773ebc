//! # tinqer
//!
//! A LINQ-style, strongly-typed query builder that compiles a caller-supplied
//! arrow-function query chain — `from`, `where`, `select`, `join`, `groupBy`,
//! `orderBy`, pagination, terminal aggregates, and the `insert`/`update`/
//! `deleteFrom` write forms — into a parameterized SQL statement for
//! PostgreSQL or SQLite.
//!
//! ## Usage Example
//!
//! ```rust
//! use tinqer::{compile_query, QueryContext, QueryParams, ParamValue, PostgreSqlDialect};
//!
//! let ctx = QueryContext::new()
//!     .with_table("users", vec!["id".into(), "age".into(), "name".into()]);
//! let mut params = QueryParams::new();
//! params.insert("minAge".into(), ParamValue::Number(18.0));
//!
//! let compiled = compile_query(
//!     "(ctx, p) => ctx.from(\"users\").where(u => u.age > p.minAge)",
//!     &ctx,
//!     &params,
//!     &PostgreSqlDialect,
//! ).unwrap();
//!
//! println!("{}", compiled.sql);
//! ```
//!
//! The pipeline (spec §2) runs leaves-first: [`lexer`] tokenizes the source,
//! [`ast`] parses it into a JavaScript-subset grammar, [`chain`] recognizes
//! the LINQ operator chain and dispatches each lambda to [`convert`] (which
//! builds [`expr::Expression`] trees against a lexical [`convert::Scope`],
//! auto-parameterizing literals as it goes), and [`sql`] walks the resulting
//! [`operation::Operation`] tree to assemble dialect-specific SQL text.

pub mod ast;
pub mod chain;
mod compiled;
pub mod context;
pub mod convert;
pub mod error;
pub mod expr;
pub mod lexer;
pub mod operation;
pub mod sql;

// CLI module (included when building the binary)
pub mod cli;

pub use crate::compiled::CompiledQuery;
pub use crate::context::{ParamValue, QueryContext, QueryParams, TableSchema};
pub use crate::error::{
    CompileError, ConvertError, ExecutionError, GenerationError, LexError, ParseError,
};
pub use crate::expr::{AutoParam, ConstantValue, Expression, FieldContext};
pub use crate::operation::{JoinType, Operation, SymbolEntry, SymbolTable};
pub use crate::sql::{
    ArrayInStrategy, PostgreSqlDialect, QueryExecutor, SqlDialect, SqliteDialect, TerminalShape,
};

pub use crate::compiled::compile_query;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_query_end_to_end_smoke_test() {
        let ctx = QueryContext::new().with_table(
            "users",
            vec!["id".into(), "age".into(), "name".into()],
        );
        let params = QueryParams::new();

        let compiled = compile_query(
            "(ctx, p) => ctx.from(\"users\").where(u => u.age == null)",
            &ctx,
            &params,
            &PostgreSqlDialect,
        )
        .unwrap();

        assert_eq!(compiled.sql, "SELECT * FROM \"users\" WHERE \"age\" IS NULL");
        assert!(compiled.params.is_empty());
    }
}
