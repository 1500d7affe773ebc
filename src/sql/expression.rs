//! Dialect-aware expression emitter (spec.md §4.6 "Emission rules for
//! expressions"). Walks an [`Expression`] tree bottom-up into SQL text.

use super::dialect::{ArrayInStrategy, SqlDialect};
use crate::context::QueryParams;
use crate::error::{GenerationError, GenerationResult};
use crate::expr::{
    AggregateFn, ArithOp, BooleanMethodKind, CompareOp, ConstantValue, Expression, InList,
    LogicalOp, StringMethodKind,
};

/// Carries the per-query context the emitter needs but that isn't on the
/// `Expression` node itself: whether column references should be table-
/// qualified (spec.md §4.5 — unqualified for single-table queries), and the
/// caller's params object (needed to size a SQLite array-IN expansion).
pub struct ExprEmitter<'a> {
    pub dialect: &'a dyn SqlDialect,
    pub qualify_columns: bool,
    pub params: &'a QueryParams,
}

impl<'a> ExprEmitter<'a> {
    pub fn new(dialect: &'a dyn SqlDialect, qualify_columns: bool, params: &'a QueryParams) -> Self {
        Self {
            dialect,
            qualify_columns,
            params,
        }
    }

    pub fn emit(&self, expr: &Expression) -> GenerationResult<String> {
        match expr {
            Expression::Column { name, table } | Expression::BooleanColumn { name, table } => {
                Ok(self.emit_column(name, table.as_deref()))
            }
            Expression::Constant { value } => Ok(self.emit_constant(value)),
            Expression::Param { param, property, index } => {
                Ok(self.emit_param(param, property.as_deref(), *index))
            }
            Expression::Comparison { operator, left, right } => self.emit_comparison(*operator, left, right),
            Expression::Logical { operator, left, right } => {
                let op = match operator {
                    LogicalOp::And => "AND",
                    LogicalOp::Or => "OR",
                };
                Ok(format!("({} {} {})", self.emit(left)?, op, self.emit(right)?))
            }
            Expression::Not(inner) => self.emit_not(inner),
            Expression::Arithmetic { operator, left, right } => {
                let op = match operator {
                    ArithOp::Add => "+",
                    ArithOp::Sub => "-",
                    ArithOp::Mul => "*",
                    ArithOp::Div => "/",
                    ArithOp::Mod => "%",
                };
                Ok(format!("({} {} {})", self.emit(left)?, op, self.emit(right)?))
            }
            Expression::Concat { left, right } => {
                Ok(format!("({} || {})", self.emit(left)?, self.emit(right)?))
            }
            Expression::StringMethod { object, method } => {
                let fn_name = match method {
                    StringMethodKind::ToLowerCase => "LOWER",
                    StringMethodKind::ToUpperCase => "UPPER",
                };
                Ok(format!("{}({})", fn_name, self.emit(object)?))
            }
            Expression::BooleanMethod { object, method, arguments } => {
                self.emit_boolean_method(object, *method, arguments)
            }
            Expression::Aggregate { function, expression } => self.emit_aggregate(*function, expression.as_deref()),
            Expression::Conditional { condition, then_branch, else_branch } => Ok(format!(
                "CASE WHEN {} THEN {} ELSE {} END",
                self.emit(condition)?,
                self.emit(then_branch)?,
                self.emit(else_branch)?
            )),
            Expression::Coalesce { expressions } => {
                let parts = expressions
                    .iter()
                    .map(|e| self.emit(e))
                    .collect::<GenerationResult<Vec<_>>>()?;
                Ok(format!("COALESCE({})", parts.join(", ")))
            }
            Expression::In { value, list, negated } => self.emit_in(value, list, *negated),
            Expression::Array { elements } => {
                let parts = elements
                    .iter()
                    .map(|e| self.emit(e))
                    .collect::<GenerationResult<Vec<_>>>()?;
                Ok(format!("({})", parts.join(", ")))
            }
            Expression::Object { .. } => Err(GenerationError::InvalidAst {
                reason: "an object literal cannot be emitted as a scalar expression; it must be \
                         flattened into a projection list first"
                    .into(),
            }),
        }
    }

    fn emit_column(&self, name: &str, table: Option<&str>) -> String {
        let quoted_name = self.dialect.quote_identifier(name);
        match (self.qualify_columns, table) {
            (true, Some(alias)) => format!("{}.{}", self.dialect.quote_identifier(alias), quoted_name),
            _ => quoted_name,
        }
    }

    fn emit_constant(&self, value: &ConstantValue) -> String {
        match value {
            ConstantValue::Null => "NULL".to_string(),
            // Only `null` ever survives conversion as an inline constant
            // (spec.md §4.4); the remaining arms exist for completeness and
            // for DML value literals that bypass auto-parameterization.
            ConstantValue::Number(n) => format!("{}", n),
            ConstantValue::String(s) => format!("'{}'", s.replace('\'', "''")),
            ConstantValue::Boolean(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
        }
    }

    fn emit_param(&self, param: &str, property: Option<&str>, index: Option<usize>) -> String {
        let base = property.unwrap_or(param);
        match index {
            Some(i) => self.dialect.placeholder(&format!("{}_{}", base, i)),
            None => self.dialect.placeholder(base),
        }
    }

    fn emit_comparison(
        &self,
        operator: CompareOp,
        left: &Expression,
        right: &Expression,
    ) -> GenerationResult<String> {
        // spec.md P3: `== null` / `!= null` rewrite to IS [NOT] NULL.
        if right.is_null_constant() {
            return self.emit_null_comparison(operator, left);
        }
        if left.is_null_constant() {
            return self.emit_null_comparison(flip_compare(operator), right);
        }
        let op = match operator {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        };
        Ok(format!("{} {} {}", self.emit(left)?, op, self.emit(right)?))
    }

    fn emit_null_comparison(&self, operator: CompareOp, operand: &Expression) -> GenerationResult<String> {
        let operand_sql = self.emit(operand)?;
        match operator {
            CompareOp::Eq => Ok(format!("{} IS NULL", operand_sql)),
            CompareOp::NotEq => Ok(format!("{} IS NOT NULL", operand_sql)),
            _ => Ok(format!(
                "{} {} NULL",
                operand_sql,
                match operator {
                    CompareOp::Gt => ">",
                    CompareOp::Gte => ">=",
                    CompareOp::Lt => "<",
                    CompareOp::Lte => "<=",
                    _ => unreachable!(),
                }
            )),
        }
    }

    fn emit_not(&self, inner: &Expression) -> GenerationResult<String> {
        if let Expression::In { value, list, negated } = inner {
            return self.emit_in(value, list, !negated);
        }
        Ok(format!("NOT ({})", self.emit(inner)?))
    }

    fn emit_boolean_method(
        &self,
        object: &Expression,
        method: BooleanMethodKind,
        arguments: &[Expression],
    ) -> GenerationResult<String> {
        let object_sql = self.emit(object)?;
        let arg_sql = self.emit(
            arguments
                .first()
                .ok_or_else(|| GenerationError::InvalidAst {
                    reason: "boolean string method missing its argument".into(),
                })?,
        )?;
        // spec.md §4.6: wildcards are not escaped; documented contract, not a bug.
        let pattern = match method {
            BooleanMethodKind::StartsWith => format!("{} || '%'", arg_sql),
            BooleanMethodKind::EndsWith => format!("'%' || {}", arg_sql),
            BooleanMethodKind::Includes | BooleanMethodKind::Contains => {
                format!("'%' || {} || '%'", arg_sql)
            }
        };
        Ok(format!("{} LIKE {}", object_sql, pattern))
    }

    fn emit_aggregate(
        &self,
        function: AggregateFn,
        expression: Option<&Expression>,
    ) -> GenerationResult<String> {
        if function == AggregateFn::Count && expression.is_none() {
            return Ok("COUNT(*)".to_string());
        }
        let fn_name = match function {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        };
        let inner = expression.ok_or_else(|| GenerationError::InvalidAst {
            reason: format!("aggregate '{}' is missing its selector expression", fn_name),
        })?;
        Ok(format!("{}({})", fn_name, self.emit(inner)?))
    }

    fn emit_in(&self, value: &Expression, list: &InList, negated: bool) -> GenerationResult<String> {
        let value_sql = self.emit(value)?;
        match list {
            InList::Literal(elements) => {
                if elements.is_empty() {
                    // `X IN ()` is invalid SQL; an empty membership list is
                    // unsatisfiable (or vacuously true when negated).
                    return Ok(if negated { "TRUE".to_string() } else { "FALSE".to_string() });
                }
                let parts = elements
                    .iter()
                    .map(|e| self.emit(e))
                    .collect::<GenerationResult<Vec<_>>>()?;
                let op = if negated { "NOT IN" } else { "IN" };
                Ok(format!("{} {} ({})", value_sql, op, parts.join(", ")))
            }
            InList::Param(name) => self.emit_in_param(&value_sql, name, negated),
        }
    }

    fn emit_in_param(&self, value_sql: &str, name: &str, negated: bool) -> GenerationResult<String> {
        match self.dialect.array_in_strategy() {
            ArrayInStrategy::AnyAll => {
                let list_placeholder = self.dialect.placeholder(name);
                Ok(if negated {
                    format!("{} <> ALL({})", value_sql, list_placeholder)
                } else {
                    format!("{} = ANY({})", value_sql, list_placeholder)
                })
            }
            ArrayInStrategy::Expand => {
                let len = self
                    .params
                    .get(name)
                    .and_then(|v| v.as_array())
                    .map(|items| items.len())
                    .ok_or_else(|| GenerationError::InvalidAst {
                        reason: format!(
                            "array parameter '{}' is required to expand an IN-list on this dialect",
                            name
                        ),
                    })?;
                if len == 0 {
                    return Ok(if negated { "TRUE".to_string() } else { "FALSE".to_string() });
                }
                let placeholders: Vec<String> = (0..len)
                    .map(|i| self.dialect.placeholder(&format!("{}_{}", name, i)))
                    .collect();
                let op = if negated { "NOT IN" } else { "IN" };
                Ok(format!("{} {} ({})", value_sql, op, placeholders.join(", ")))
            }
        }
    }
}

fn flip_compare(operator: CompareOp) -> CompareOp {
    match operator {
        CompareOp::Eq => CompareOp::Eq,
        CompareOp::NotEq => CompareOp::NotEq,
        CompareOp::Gt => CompareOp::Lt,
        CompareOp::Gte => CompareOp::Lte,
        CompareOp::Lt => CompareOp::Gt,
        CompareOp::Lte => CompareOp::Gte,
    }
}
