//! Dialect adapters (spec.md §4.7, §6.3): the pluggable placeholder format,
//! array-IN rewrite, and DML feature matrix that let the same generator
//! target both PostgreSQL and SQLite.
//!
//! Execution (post-generation parameter coercion, routing `prepare`/`run`/
//! `all`/`get` to a real driver) is named out of scope by spec.md §1; the
//! [`QueryExecutor`] trait below exists only to pin down that seam's shape,
//! per `SPEC_FULL.md` §H — no concrete driver implementation lives here.

use crate::error::ExecutionResult;

/// How a caller-supplied array parameter's membership test is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayInStrategy {
    /// `X = ANY($(list))` / `X <> ALL($(list))`; the driver binds the whole
    /// array as one parameter.
    AnyAll,
    /// `X IN (@list_0, @list_1, …)`; the generator must know the array's
    /// length up front to allocate one placeholder per element.
    Expand,
}

/// A dialect's view of how a terminal operator kind is actually executed
/// against a driver (spec.md §6.4). The compiler core never constructs
/// these; they describe the contract a real execution wrapper fulfills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalShape {
    /// Multiple rows (`toArray`/`toList`, the implicit default).
    Rows,
    /// A single row, or `None` for the `OrDefault` variants with no match.
    SingleRow,
    /// A bare scalar (`count`, `sum`, `avg`, `min`, `max`).
    Scalar,
    /// A boolean (`any`, `all`).
    Boolean,
    /// A row-change count (`insert`, `update`, `delete`).
    RowCount,
}

/// A pluggable SQL dialect (spec.md §4.7): placeholder formatting, LIKE/IN
/// rendering, identifier quoting, and the DML feature matrix of §6.3.
pub trait SqlDialect: Send + Sync {
    /// Human-readable name, used in `RuntimeUnsupported` messages.
    fn name(&self) -> &'static str;

    /// Quotes a table/column/alias identifier.
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Renders a bound-parameter placeholder for `name`.
    fn placeholder(&self, name: &str) -> String;

    /// How array-valued parameters are rendered in an `IN`/`= ANY` position.
    fn array_in_strategy(&self) -> ArrayInStrategy;

    /// Whether `RETURNING` is actually executable for `insert`/`update`
    /// statements on this dialect (spec.md §6.3). PostgreSQL supports it;
    /// SQLite's adapter refuses to run these forms even though the SQL
    /// generator can still emit the clause.
    fn supports_returning_on_write(&self) -> bool;
}

/// `$(name)` — pg-promise's named-parameter form.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgreSqlDialect;

impl SqlDialect for PostgreSqlDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn placeholder(&self, name: &str) -> String {
        format!("$({})", name)
    }

    fn array_in_strategy(&self) -> ArrayInStrategy {
        ArrayInStrategy::AnyAll
    }

    fn supports_returning_on_write(&self) -> bool {
        true
    }
}

/// `@name`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, name: &str) -> String {
        format!("@{}", name)
    }

    fn array_in_strategy(&self) -> ArrayInStrategy {
        ArrayInStrategy::Expand
    }

    fn supports_returning_on_write(&self) -> bool {
        false
    }
}

/// The out-of-scope execution-shell seam (spec.md §6.4): a real
/// implementation wraps a native driver handle, runs the compiled SQL, and
/// post-processes rows (boolean/date coercion, single-row unwrapping). No
/// type in this crate implements it; it documents the contract callers are
/// expected to build on top of `compile_query`.
pub trait QueryExecutor {
    type Row;

    fn execute_rows(&self, sql: &str, params: &[(&str, &str)]) -> ExecutionResult<Vec<Self::Row>>;
    fn execute_scalar(&self, sql: &str, params: &[(&str, &str)]) -> ExecutionResult<f64>;
    fn execute_boolean(&self, sql: &str, params: &[(&str, &str)]) -> ExecutionResult<bool>;
    fn execute_row_count(&self, sql: &str, params: &[(&str, &str)]) -> ExecutionResult<u64>;
}
