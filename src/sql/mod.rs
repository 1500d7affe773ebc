//! SQL Generator (spec.md §4.6): walks a normalized `Operation` tree and
//! assembles SQL fragments in canonical clause order (SELECT, FROM, JOIN*,
//! WHERE, GROUP BY, ORDER BY, LIMIT, OFFSET), dispatching terminal operators
//! to either an `EXISTS`/`NOT EXISTS` rewrite (`any`/`all`), an aggregate
//! projection (`count`/`sum`/`avg`/`min`/`max`), or a `LIMIT`-bearing cursor
//! read (`first`/`single`/`last` and their default variants).

pub mod assemble;
pub mod dialect;
mod expression;

pub use dialect::{ArrayInStrategy, PostgreSqlDialect, QueryExecutor, SqlDialect, SqliteDialect, TerminalShape};

use crate::context::QueryParams;
use crate::convert::ConversionState;
use crate::error::{GenerationError, GenerationResult};
use crate::expr::{AutoParam, ConstantValue, Expression};
use crate::operation::{JoinType, Operation};
use assemble::{render_group_by, render_order_by, render_projection, OrderKey};
use expression::ExprEmitter;

/// Entry point used by [`crate::compile_query`]: dispatches to the DML
/// generators for write-path roots, or the read-path generator otherwise.
pub fn generate(
    operation: &Operation,
    dialect: &dyn SqlDialect,
    params: &QueryParams,
    state: &mut ConversionState,
) -> GenerationResult<String> {
    match operation {
        Operation::Insert { .. } => generate_insert(operation, dialect),
        Operation::Update { .. } => generate_update(operation, dialect),
        Operation::Delete { .. } => generate_delete(operation, dialect),
        _ => generate_read(operation, dialect, params, state),
    }
}

/// Flattens the singly-linked operation chain into root-first order
/// (spec.md §4.6 step 1). Does not descend into a `Join` node's `inner`
/// side; that sub-tree is rendered separately at the JOIN clause.
fn flatten(op: &Operation) -> Vec<&Operation> {
    match op.source() {
        Some(src) => {
            let mut chain = flatten(src);
            chain.push(op);
            chain
        }
        None => vec![op],
    }
}

struct FromInfo<'a> {
    table: &'a str,
    schema: Option<&'a str>,
    alias: Option<&'a str>,
}

fn from_info(op: &Operation) -> GenerationResult<FromInfo<'_>> {
    match op {
        Operation::From {
            table,
            schema,
            alias_hint,
            ..
        } => Ok(FromInfo {
            table,
            schema: schema.as_deref(),
            alias: alias_hint.as_deref(),
        }),
        _ => Err(GenerationError::InvalidAst {
            reason: "operation chain does not start at a 'from' root".into(),
        }),
    }
}

fn qualified_table(dialect: &dyn SqlDialect, schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(s) => format!(
            "{}.{}",
            dialect.quote_identifier(s),
            dialect.quote_identifier(table)
        ),
        None => dialect.quote_identifier(table),
    }
}

fn render_from(dialect: &dyn SqlDialect, info: &FromInfo, has_joins: bool) -> GenerationResult<String> {
    let base = qualified_table(dialect, info.schema, info.table);
    if !has_joins {
        return Ok(base);
    }
    let alias = info.alias.ok_or_else(|| GenerationError::InvalidAst {
        reason: "joined query is missing a table alias on its 'from' root".into(),
    })?;
    Ok(format!("{} AS {}", base, dialect.quote_identifier(alias)))
}

/// Renders a single `JOIN` clause, recursing into [`generate_read`] if the
/// inner source is itself a non-trivial chain rather than a bare table
/// (spec.md §4.6 step 5: "If the source is a subquery, render `(inner) AS
/// "tN"`.").
fn render_join(
    op: &Operation,
    dialect: &dyn SqlDialect,
    params: &QueryParams,
    state: &mut ConversionState,
) -> GenerationResult<String> {
    let Operation::Join {
        inner,
        outer_key,
        inner_key,
        join_type,
        ..
    } = op
    else {
        return Err(GenerationError::InvalidAst {
            reason: "render_join called on a non-Join operation".into(),
        });
    };

    let inner_chain = flatten(inner);
    let inner_from = from_info(inner_chain[0])?;
    let inner_alias = inner_from.alias.ok_or_else(|| GenerationError::InvalidAst {
        reason: "join's inner source is missing a table alias".into(),
    })?;

    let source_sql = if inner_chain.len() == 1 {
        qualified_table(dialect, inner_from.schema, inner_from.table)
    } else {
        format!("({})", generate_read(inner, dialect, params, state)?)
    };

    let keyword = match join_type {
        JoinType::Inner => "INNER JOIN",
        JoinType::LeftOuter => "LEFT OUTER JOIN",
        JoinType::Cross => "CROSS JOIN",
    };

    let on_clause = if *join_type == JoinType::Cross {
        String::new()
    } else {
        let emitter = ExprEmitter::new(dialect, true, params);
        let outer = outer_key.as_ref().ok_or_else(|| GenerationError::InvalidAst {
            reason: format!("{} is missing its outer key selector", keyword),
        })?;
        let inner_k = inner_key.as_ref().ok_or_else(|| GenerationError::InvalidAst {
            reason: format!("{} is missing its inner key selector", keyword),
        })?;
        format!(" ON {} = {}", emitter.emit(outer)?, emitter.emit(inner_k)?)
    };

    Ok(format!(
        "{} {} AS {}{}",
        keyword,
        source_sql,
        dialect.quote_identifier(inner_alias),
        on_clause
    ))
}

fn render_select_list(
    emitter: &ExprEmitter,
    terminal: Option<&Operation>,
    select: Option<&Expression>,
) -> GenerationResult<Vec<String>> {
    match terminal {
        Some(Operation::Count { .. }) => Ok(vec!["COUNT(*)".to_string()]),
        Some(Operation::Sum { selector, .. }) => Ok(vec![format!("SUM({})", emitter.emit(selector)?)]),
        Some(Operation::Avg { selector, .. }) => Ok(vec![format!("AVG({})", emitter.emit(selector)?)]),
        Some(Operation::Min { selector, .. }) => Ok(vec![format!("MIN({})", emitter.emit(selector)?)]),
        Some(Operation::Max { selector, .. }) => Ok(vec![format!("MAX({})", emitter.emit(selector)?)]),
        _ => match select {
            Some(sel) => render_projection(emitter, sel),
            None => Ok(vec!["*".to_string()]),
        },
    }
}

fn conjoin(emitter: &ExprEmitter, wheres: &[&Expression]) -> GenerationResult<String> {
    wheres
        .iter()
        .map(|w| emitter.emit(w))
        .collect::<GenerationResult<Vec<_>>>()
        .map(|parts| parts.join(" AND "))
}

fn synthesize_limit_param(state: &mut ConversionState, value: f64) -> String {
    let name = state.next_param_name();
    state.auto_params.push(AutoParam {
        name: name.clone(),
        value: ConstantValue::Number(value),
        field_context: None,
    });
    name
}

/// Generates a full `SELECT` statement (or an `EXISTS`-wrapped one) for a
/// read-path operation tree. Also used recursively to render a join's inner
/// source when that source is itself a non-trivial chain.
fn generate_read(
    operation: &Operation,
    dialect: &dyn SqlDialect,
    params: &QueryParams,
    state: &mut ConversionState,
) -> GenerationResult<String> {
    let chain = flatten(operation);
    let from = from_info(chain[0])?;

    let mut joins: Vec<&Operation> = Vec::new();
    let mut wheres: Vec<&Expression> = Vec::new();
    let mut select: Option<&Expression> = None;
    let mut group_by: Option<&Expression> = None;
    let mut order_bys: Vec<(&Expression, bool)> = Vec::new();
    let mut take: Option<&Expression> = None;
    let mut skip: Option<&Expression> = None;
    let mut distinct = false;
    let mut reverse_flip = false;
    let mut terminal: Option<&Operation> = None;

    for node in &chain[1..] {
        match node {
            Operation::Join { .. } => joins.push(node),
            Operation::Where { predicate, .. } => wheres.push(predicate),
            Operation::Select { selector, .. } => select = Some(selector),
            Operation::GroupBy { key_selector, .. } => group_by = Some(key_selector),
            Operation::OrderBy {
                key_selector,
                descending,
                ..
            } => {
                // A fresh `orderBy` restarts the ordering; `thenBy` extends it.
                order_bys.clear();
                order_bys.push((key_selector, *descending));
            }
            Operation::ThenBy {
                key_selector,
                descending,
                ..
            } => order_bys.push((key_selector, *descending)),
            Operation::Take { count, .. } => take = Some(count),
            Operation::Skip { count, .. } => skip = Some(count),
            Operation::Distinct { .. } => distinct = true,
            Operation::Reverse { .. } => reverse_flip = !reverse_flip,
            other => terminal = Some(other),
        }
    }

    let has_joins = !joins.is_empty();

    // spec.md §4.6 step 2: the EXISTS rewrite for `any`/`all` short-circuits
    // everything else — it ignores any projection/ordering/paging.
    match terminal {
        Some(Operation::Any { predicate, .. }) => {
            return generate_exists(
                dialect,
                params,
                &from,
                &joins,
                &wheres,
                predicate.as_ref(),
                false,
                state,
            );
        }
        Some(Operation::All { predicate, .. }) => {
            return generate_exists(
                dialect,
                params,
                &from,
                &joins,
                &wheres,
                Some(predicate),
                true,
                state,
            );
        }
        _ => {}
    }

    // Terminal-specific WHERE/LIMIT contributions (spec.md §4.6 steps 6, 9).
    let mut limit_literal: Option<f64> = None;
    match terminal {
        Some(Operation::First { predicate, .. }) | Some(Operation::FirstOrDefault { predicate, .. }) => {
            if let Some(p) = predicate {
                wheres.push(p);
            }
            if take.is_none() {
                limit_literal = Some(1.0);
            }
        }
        Some(Operation::Last { predicate, .. }) | Some(Operation::LastOrDefault { predicate, .. }) => {
            if let Some(p) = predicate {
                wheres.push(p);
            }
            if take.is_none() {
                limit_literal = Some(1.0);
            }
        }
        // `single`/`singleOrDefault` fetch up to two rows so an execution
        // wrapper can still distinguish "no match" / "exactly one" /
        // `MultipleElements` at runtime (spec.md §7) without a full scan.
        Some(Operation::Single { predicate, .. }) | Some(Operation::SingleOrDefault { predicate, .. }) => {
            if let Some(p) = predicate {
                wheres.push(p);
            }
            if take.is_none() {
                limit_literal = Some(2.0);
            }
        }
        _ => {}
    }

    let emitter = ExprEmitter::new(dialect, has_joins, params);

    let mut sql = String::from("SELECT ");
    if distinct {
        sql.push_str("DISTINCT ");
    }
    sql.push_str(&render_select_list(&emitter, terminal, select)?.join(", "));

    sql.push_str(" FROM ");
    sql.push_str(&render_from(dialect, &from, has_joins)?);
    for join_op in &joins {
        sql.push(' ');
        sql.push_str(&render_join(join_op, dialect, params, state)?);
    }

    if !wheres.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conjoin(&emitter, &wheres)?);
    }

    if let Some(key) = group_by {
        sql.push_str(" GROUP BY ");
        sql.push_str(&render_group_by(&emitter, key)?.join(", "));
    }

    // spec.md P7 / `SPEC_FULL.md` §G: `last`/`lastOrDefault` flips every
    // ordering direction; a `.reverse()` in the chain cancels that flip.
    let terminal_is_last = matches!(
        terminal,
        Some(Operation::Last { .. }) | Some(Operation::LastOrDefault { .. })
    );
    let flip = terminal_is_last ^ reverse_flip;

    if !order_bys.is_empty() {
        let keys: Vec<OrderKey> = order_bys
            .iter()
            .map(|(key_selector, descending)| OrderKey {
                key_selector,
                descending: descending ^ flip,
            })
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&render_order_by(&emitter, &keys)?);
    } else if flip {
        sql.push_str(" ORDER BY 1 DESC");
    }

    if let Some(t) = take {
        sql.push_str(" LIMIT ");
        sql.push_str(&emitter.emit(t)?);
    } else if let Some(lit) = limit_literal {
        let name = synthesize_limit_param(state, lit);
        sql.push_str(" LIMIT ");
        sql.push_str(&dialect.placeholder(&name));
    }

    if let Some(s) = skip {
        sql.push_str(" OFFSET ");
        sql.push_str(&emitter.emit(s)?);
    }

    Ok(sql)
}

#[allow(clippy::too_many_arguments)]
fn generate_exists(
    dialect: &dyn SqlDialect,
    params: &QueryParams,
    from: &FromInfo,
    joins: &[&Operation],
    wheres: &[&Expression],
    predicate: Option<&Expression>,
    is_all: bool,
    state: &mut ConversionState,
) -> GenerationResult<String> {
    let has_joins = !joins.is_empty();
    let emitter = ExprEmitter::new(dialect, has_joins, params);

    let mut inner_wheres: Vec<String> = wheres
        .iter()
        .map(|w| emitter.emit(w))
        .collect::<GenerationResult<Vec<_>>>()?;
    if let Some(pred) = predicate {
        let pred_sql = emitter.emit(pred)?;
        inner_wheres.push(if is_all {
            format!("NOT ({})", pred_sql)
        } else {
            pred_sql
        });
    }

    let mut inner = String::from("SELECT 1 FROM ");
    inner.push_str(&render_from(dialect, from, has_joins)?);
    for join_op in joins {
        inner.push(' ');
        inner.push_str(&render_join(join_op, dialect, params, state)?);
    }
    if !inner_wheres.is_empty() {
        inner.push_str(" WHERE ");
        inner.push_str(&inner_wheres.join(" AND "));
    }

    let exists_kw = if is_all { "NOT EXISTS" } else { "EXISTS" };
    Ok(format!(
        "SELECT CASE WHEN {} ({}) THEN 1 ELSE 0 END",
        exists_kw, inner
    ))
}

// --- Write path (spec.md §6.1, §6.3) ----------------------------------

fn generate_insert(operation: &Operation, dialect: &dyn SqlDialect) -> GenerationResult<String> {
    let Operation::Insert {
        table,
        schema,
        values,
        returning,
    } = operation
    else {
        unreachable!("generate_insert called on a non-Insert operation");
    };

    let empty_params = QueryParams::new();
    let emitter = ExprEmitter::new(dialect, false, &empty_params);

    let columns = values
        .iter()
        .map(|(name, _)| dialect.quote_identifier(name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = values
        .iter()
        .map(|(_, expr)| emitter.emit(expr))
        .collect::<GenerationResult<Vec<_>>>()?
        .join(", ");

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified_table(dialect, schema.as_deref(), table),
        columns,
        placeholders
    );
    append_returning(&mut sql, returning.as_deref(), dialect)?;
    Ok(sql)
}

fn generate_update(operation: &Operation, dialect: &dyn SqlDialect) -> GenerationResult<String> {
    let Operation::Update {
        table,
        schema,
        set,
        where_,
        returning,
        ..
    } = operation
    else {
        unreachable!("generate_update called on a non-Update operation");
    };

    let empty_params = QueryParams::new();
    let emitter = ExprEmitter::new(dialect, false, &empty_params);

    let assignments = set
        .iter()
        .map(|(name, expr)| -> GenerationResult<String> {
            Ok(format!("{} = {}", dialect.quote_identifier(name), emitter.emit(expr)?))
        })
        .collect::<GenerationResult<Vec<_>>>()?
        .join(", ");

    let mut sql = format!(
        "UPDATE {} SET {}",
        qualified_table(dialect, schema.as_deref(), table),
        assignments
    );
    if let Some(predicate) = where_ {
        sql.push_str(" WHERE ");
        sql.push_str(&emitter.emit(predicate)?);
    }
    append_returning(&mut sql, returning.as_deref(), dialect)?;
    Ok(sql)
}

fn generate_delete(operation: &Operation, dialect: &dyn SqlDialect) -> GenerationResult<String> {
    let Operation::Delete {
        table,
        schema,
        where_,
        ..
    } = operation
    else {
        unreachable!("generate_delete called on a non-Delete operation");
    };

    let mut sql = format!("DELETE FROM {}", qualified_table(dialect, schema.as_deref(), table));
    if let Some(predicate) = where_ {
        let empty_params = QueryParams::new();
        let emitter = ExprEmitter::new(dialect, false, &empty_params);
        sql.push_str(" WHERE ");
        sql.push_str(&emitter.emit(predicate)?);
    }
    Ok(sql)
}

fn append_returning(
    sql: &mut String,
    returning: Option<&[String]>,
    dialect: &dyn SqlDialect,
) -> GenerationResult<()> {
    let Some(columns) = returning else {
        return Ok(());
    };
    if !dialect.supports_returning_on_write() {
        return Err(GenerationError::RuntimeUnsupported {
            feature: "RETURNING".into(),
            dialect: dialect.name().into(),
        });
    }
    sql.push_str(" RETURNING ");
    if columns.is_empty() {
        sql.push('*');
    } else {
        let rendered = columns
            .iter()
            .map(|c| dialect.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&rendered);
    }
    Ok(())
}
