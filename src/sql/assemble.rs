//! Clause-assembly helpers used by [`super::generate`]: SELECT-list,
//! GROUP BY, and ORDER BY rendering, kept separate from the top-level
//! clause orchestration for the same "Tidy First" reasons the teacher
//! decomposed its own generator this way.

use super::expression::ExprEmitter;
use crate::error::{GenerationError, GenerationResult};
use crate::expr::Expression;

/// Renders the SELECT list for a plain projection (spec.md §4.6 step 3,
/// the non-aggregate branches): an object literal becomes one
/// `expr AS "alias"` per property; a bare expression is rendered as-is
/// (no alias) unless it is a plain column, which still gets no alias per
/// the worked examples in spec.md §8.
pub fn render_projection(emitter: &ExprEmitter, selector: &Expression) -> GenerationResult<Vec<String>> {
    match selector {
        Expression::Object { properties } => properties
            .iter()
            .map(|(name, expr)| -> GenerationResult<String> {
                Ok(format!(
                    "{} AS {}",
                    emitter.emit(expr)?,
                    emitter.dialect.quote_identifier(name)
                ))
            })
            .collect(),
        other => Ok(vec![emitter.emit(other)?]),
    }
}

/// Renders a GROUP BY key selector (spec.md §4.6 step 7): a single column
/// key renders as that column; a composite object-literal key renders each
/// property expression as a comma-separated list.
pub fn render_group_by(emitter: &ExprEmitter, key_selector: &Expression) -> GenerationResult<Vec<String>> {
    match key_selector {
        Expression::Object { properties } => properties
            .iter()
            .map(|(_, expr)| emitter.emit(expr))
            .collect(),
        other => Ok(vec![emitter.emit(other)?]),
    }
}

/// One ORDER BY / THEN BY key, with its (possibly flipped) direction
/// already resolved.
pub struct OrderKey<'a> {
    pub key_selector: &'a Expression,
    pub descending: bool,
}

pub fn render_order_by(emitter: &ExprEmitter, keys: &[OrderKey]) -> GenerationResult<String> {
    if keys.is_empty() {
        return Err(GenerationError::InvalidAst {
            reason: "render_order_by called with no keys".into(),
        });
    }
    let parts = keys
        .iter()
        .map(|k| {
            let dir = if k.descending { "DESC" } else { "ASC" };
            Ok(format!("{} {}", emitter.emit(k.key_selector)?, dir))
        })
        .collect::<GenerationResult<Vec<_>>>()?;
    Ok(parts.join(", "))
}
