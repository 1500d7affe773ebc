//! The `Operation` tagged union (spec.md §3) — nodes of the query tree.
//! Each non-source node owns its upstream `source` (and, for `Join`, the
//! inner side's own sub-tree), forming an immutable singly-linked chain with
//! exactly one `From`/`Insert`/`Update`/`Delete` root at the bottom.

use crate::expr::Expression;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    LeftOuter,
    Cross,
}

/// What a projected property path in a joined shape resolves to (spec.md
/// §4.5). Attached to a `Join` node and consumed by the SQL generator to
/// qualify column references with the right alias.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolEntry {
    /// `deptName: d.name` — a concrete column on a specific table alias.
    Column { table_alias: String, column: String },
    /// `u, d` in `(u, d) => ({ u, d })` — the property stands for an entire
    /// table-reference, resolved further by a downstream `select`.
    TableRef { table_alias: String },
}

pub type SymbolTable = HashMap<String, SymbolEntry>;

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    From {
        table: String,
        schema: Option<String>,
        subquery: Option<Box<Operation>>,
        alias_hint: Option<String>,
    },
    Where {
        source: Box<Operation>,
        predicate: Expression,
    },
    Select {
        source: Box<Operation>,
        selector: Expression,
    },
    Join {
        source: Box<Operation>,
        inner: Box<Operation>,
        /// `None` only for `JoinType::Cross`, which has no key selectors.
        outer_key: Option<Expression>,
        inner_key: Option<Expression>,
        result_selector: Expression,
        join_type: JoinType,
        symbol_table: SymbolTable,
    },
    GroupBy {
        source: Box<Operation>,
        key_selector: Expression,
    },
    OrderBy {
        source: Box<Operation>,
        key_selector: Expression,
        descending: bool,
    },
    ThenBy {
        source: Box<Operation>,
        key_selector: Expression,
        descending: bool,
    },
    Take {
        source: Box<Operation>,
        count: Expression,
    },
    Skip {
        source: Box<Operation>,
        count: Expression,
    },
    Distinct {
        source: Box<Operation>,
    },
    Reverse {
        source: Box<Operation>,
    },

    // Terminals
    Count {
        source: Box<Operation>,
    },
    Sum {
        source: Box<Operation>,
        selector: Expression,
    },
    Avg {
        source: Box<Operation>,
        selector: Expression,
    },
    Min {
        source: Box<Operation>,
        selector: Expression,
    },
    Max {
        source: Box<Operation>,
        selector: Expression,
    },
    First {
        source: Box<Operation>,
        predicate: Option<Expression>,
    },
    FirstOrDefault {
        source: Box<Operation>,
        predicate: Option<Expression>,
    },
    Single {
        source: Box<Operation>,
        predicate: Option<Expression>,
    },
    SingleOrDefault {
        source: Box<Operation>,
        predicate: Option<Expression>,
    },
    Last {
        source: Box<Operation>,
        predicate: Option<Expression>,
    },
    LastOrDefault {
        source: Box<Operation>,
        predicate: Option<Expression>,
    },
    Any {
        source: Box<Operation>,
        predicate: Option<Expression>,
    },
    All {
        source: Box<Operation>,
        predicate: Expression,
    },
    /// `toArray`/`toList`, or the implicit default terminal when the chain
    /// ends on a non-terminal read operator.
    ToArray {
        source: Box<Operation>,
    },

    // Write path (spec.md §6.1)
    Insert {
        table: String,
        schema: Option<String>,
        values: Vec<(String, Expression)>,
        returning: Option<Vec<String>>,
    },
    Update {
        table: String,
        schema: Option<String>,
        set: Vec<(String, Expression)>,
        where_: Option<Expression>,
        returning: Option<Vec<String>>,
        allow_full_table_update: bool,
    },
    Delete {
        table: String,
        schema: Option<String>,
        where_: Option<Expression>,
        allow_full_table_delete: bool,
    },
}

impl Operation {
    /// The immediate upstream node, if any. `From`/`Insert`/`Update`/`Delete`
    /// are roots and return `None`.
    pub fn source(&self) -> Option<&Operation> {
        match self {
            Operation::From { .. }
            | Operation::Insert { .. }
            | Operation::Update { .. }
            | Operation::Delete { .. } => None,
            Operation::Where { source, .. }
            | Operation::Select { source, .. }
            | Operation::Join { source, .. }
            | Operation::GroupBy { source, .. }
            | Operation::OrderBy { source, .. }
            | Operation::ThenBy { source, .. }
            | Operation::Take { source, .. }
            | Operation::Skip { source, .. }
            | Operation::Distinct { source }
            | Operation::Reverse { source }
            | Operation::Count { source }
            | Operation::Sum { source, .. }
            | Operation::Avg { source, .. }
            | Operation::Min { source, .. }
            | Operation::Max { source, .. }
            | Operation::First { source, .. }
            | Operation::FirstOrDefault { source, .. }
            | Operation::Single { source, .. }
            | Operation::SingleOrDefault { source, .. }
            | Operation::Last { source, .. }
            | Operation::LastOrDefault { source, .. }
            | Operation::Any { source, .. }
            | Operation::All { source, .. }
            | Operation::ToArray { source } => Some(source),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Operation::Count { .. }
                | Operation::Sum { .. }
                | Operation::Avg { .. }
                | Operation::Min { .. }
                | Operation::Max { .. }
                | Operation::First { .. }
                | Operation::FirstOrDefault { .. }
                | Operation::Single { .. }
                | Operation::SingleOrDefault { .. }
                | Operation::Last { .. }
                | Operation::LastOrDefault { .. }
                | Operation::Any { .. }
                | Operation::All { .. }
                | Operation::ToArray { .. }
        )
    }
}
