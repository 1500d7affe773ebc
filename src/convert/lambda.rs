//! AST -> `Expression` conversion (spec.md §4.4): the Lambda Converter.
//!
//! Each lambda body is converted through [`convert_to_expression`], which
//! dispatches on the `JsExpr` node kind and resolves identifiers through the
//! lexical [`Scope`] in effect for that body. Literal constants are replaced
//! by synthetic auto-parameters as they're encountered (spec.md §4.4/§4.5),
//! and the field-context hint is attached retroactively once we know the
//! column the literal was compared or combined against.

use super::scope::{is_stringish_name, Binding, ConversionState, Scope};
use crate::ast::{BinaryOp, JsExpr, Literal, UnaryOp};
use crate::error::{ConvertError, ConvertResult};
use crate::expr::{
    AggregateFn, ArithOp, BooleanMethodKind, CompareOp, ConstantValue, Expression, FieldContext,
    InList, LogicalOp, StringMethodKind,
};
use crate::operation::SymbolEntry;
use crate::context::{QueryContext, QueryParams};

/// The result of converting a single AST node. Most nodes settle into a
/// plain `Expression`; the two marker variants exist only transiently while
/// walking a joined-shape or grouping-parameter member chain, and must be
/// resolved to `Expr` before the caller can use the result as a value.
pub enum ConvertedNode {
    Expr(Expression),
    /// A projected table reference awaiting one more `.column` access
    /// (spec.md §4.5 — `j.u.name` resolves `j.u` to this, then `.name`).
    TableRef(String),
}

fn expect_expr(node: ConvertedNode, context: &str) -> ConvertResult<Expression> {
    match node {
        ConvertedNode::Expr(expr) => Ok(expr),
        ConvertedNode::TableRef(alias) => Err(ConvertError::JoinShapeError(format!(
            "table reference '{}' used without a further member access in {}",
            alias, context
        ))),
    }
}

/// Converts any AST node that must settle into a concrete value/boolean
/// expression (i.e. everywhere except the object half of a joined-shape
/// member chain).
pub fn convert_to_expression(
    expr: &JsExpr,
    scope: &Scope,
    ctx: &QueryContext,
    params: &QueryParams,
    state: &mut ConversionState,
) -> ConvertResult<Expression> {
    let node = convert_expr(expr, scope, ctx, params, state)?;
    expect_expr(node, "expression position")
}

/// Converts a lambda body used in a boolean position (`where`, `any`/`all`
/// predicates, the condition of a ternary, operands of `&&`/`||`), promoting
/// a bare column reference to `booleanColumn` (spec.md §3).
pub fn convert_predicate(
    expr: &JsExpr,
    scope: &Scope,
    ctx: &QueryContext,
    params: &QueryParams,
    state: &mut ConversionState,
) -> ConvertResult<Expression> {
    let value = convert_to_expression(expr, scope, ctx, params, state)?;
    Ok(to_boolean(value))
}

fn to_boolean(expr: Expression) -> Expression {
    match expr {
        Expression::Column { name, table } => Expression::BooleanColumn { name, table },
        Expression::Logical { operator, left, right } => Expression::Logical {
            operator,
            left: Box::new(to_boolean(*left)),
            right: Box::new(to_boolean(*right)),
        },
        Expression::Not(inner) => Expression::Not(Box::new(to_boolean(*inner))),
        other => other,
    }
}

fn convert_expr(
    expr: &JsExpr,
    scope: &Scope,
    ctx: &QueryContext,
    params: &QueryParams,
    state: &mut ConversionState,
) -> ConvertResult<ConvertedNode> {
    match expr {
        JsExpr::Identifier { name, .. } => convert_identifier(name, scope),
        JsExpr::Literal { value, .. } => Ok(ConvertedNode::Expr(convert_literal(value, state))),
        JsExpr::Member {
            object,
            property,
            computed,
            ..
        } => convert_member(object, property, *computed, scope, ctx, params, state),
        JsExpr::Call { callee, arguments, .. } => {
            convert_call(callee, arguments, scope, ctx, params, state)
        }
        JsExpr::Unary { op, argument, .. } => convert_unary(*op, argument, scope, ctx, params, state),
        JsExpr::Binary { op, left, right, .. } => {
            convert_binary(*op, left, right, scope, ctx, params, state)
        }
        JsExpr::Conditional {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            let condition = convert_predicate(condition, scope, ctx, params, state)?;
            let then_branch = convert_to_expression(then_branch, scope, ctx, params, state)?;
            let else_branch = convert_to_expression(else_branch, scope, ctx, params, state)?;
            Ok(ConvertedNode::Expr(Expression::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            }))
        }
        JsExpr::Array { elements, .. } => {
            let elements = elements
                .iter()
                .map(|e| convert_to_expression(e, scope, ctx, params, state))
                .collect::<ConvertResult<Vec<_>>>()?;
            Ok(ConvertedNode::Expr(Expression::Array { elements }))
        }
        JsExpr::Object { properties, .. } => {
            let properties = properties
                .iter()
                .map(|p| -> ConvertResult<(String, Expression)> {
                    Ok((
                        p.key.clone(),
                        convert_to_expression(&p.value, scope, ctx, params, state)?,
                    ))
                })
                .collect::<ConvertResult<Vec<_>>>()?;
            Ok(ConvertedNode::Expr(Expression::Object { properties }))
        }
        JsExpr::Arrow(_) => Err(ConvertError::UnsupportedConstruct(
            "nested arrow function in expression position".into(),
        )),
    }
}

fn convert_identifier(name: &str, scope: &Scope) -> ConvertResult<ConvertedNode> {
    match scope.lookup(name) {
        Some(Binding::Row { .. }) | Some(Binding::JoinedRow { .. }) => Err(
            ConvertError::ProjectionTooComplex(format!(
                "bare row reference '{}' is not a supported expression",
                name
            )),
        ),
        Some(Binding::QueryParams) => Err(ConvertError::UnsupportedConstruct(format!(
            "query-parameter object '{}' referenced without a property",
            name
        ))),
        Some(Binding::Grouping { .. }) => Err(ConvertError::UnsupportedConstruct(format!(
            "grouping parameter '{}' used without '.key' or an aggregate method",
            name
        ))),
        None => Err(ConvertError::UnboundIdentifier(name.to_string())),
    }
}

fn convert_literal(value: &Literal, state: &mut ConversionState) -> Expression {
    match value {
        Literal::Null => Expression::Constant {
            value: ConstantValue::Null,
        },
        Literal::Number(n) => auto_param(state, ConstantValue::Number(*n)),
        Literal::String(s) => auto_param(state, ConstantValue::String(s.clone())),
        Literal::Boolean(b) => auto_param(state, ConstantValue::Boolean(*b)),
    }
}

fn auto_param(state: &mut ConversionState, value: ConstantValue) -> Expression {
    let name = state.next_param_name();
    state.auto_params.push(crate::expr::AutoParam {
        name: name.clone(),
        value,
        field_context: None,
    });
    Expression::Param {
        param: name,
        property: None,
        index: None,
    }
}

const NUMERIC_GLOBALS: &[(&str, f64)] = &[
    ("MAX_SAFE_INTEGER", 9007199254740991.0),
    ("MIN_SAFE_INTEGER", -9007199254740991.0),
    ("MAX_VALUE", f64::MAX),
];

fn convert_member(
    object: &JsExpr,
    property: &JsExpr,
    computed: bool,
    scope: &Scope,
    ctx: &QueryContext,
    params: &QueryParams,
    state: &mut ConversionState,
) -> ConvertResult<ConvertedNode> {
    if computed {
        return convert_computed_member(object, property, scope, ctx, params, state);
    }

    let prop_name = match property {
        JsExpr::Identifier { name, .. } => name.clone(),
        _ => {
            return Err(ConvertError::UnsupportedConstruct(
                "non-identifier member property".into(),
            ))
        }
    };

    if let JsExpr::Identifier { name: obj_name, .. } = &**object {
        if obj_name == "Number" && scope.lookup(obj_name).is_none() {
            if let Some((_, value)) = NUMERIC_GLOBALS.iter().find(|(n, _)| *n == prop_name) {
                return Ok(ConvertedNode::Expr(auto_param(
                    state,
                    ConstantValue::Number(*value),
                )));
            }
            return Err(ConvertError::UnsupportedConstruct(format!(
                "Number.{}",
                prop_name
            )));
        }

        return match scope.lookup(obj_name) {
            Some(Binding::Row { table_alias }) => Ok(ConvertedNode::Expr(Expression::Column {
                name: prop_name,
                table: table_alias.clone(),
            })),
            Some(Binding::QueryParams) => {
                if !params.contains_key(&prop_name) {
                    return Err(ConvertError::UnknownQueryParameter(prop_name));
                }
                Ok(ConvertedNode::Expr(Expression::Param {
                    param: obj_name.clone(),
                    property: Some(prop_name),
                    index: None,
                }))
            }
            Some(Binding::JoinedRow { symbol_table }) => {
                match symbol_table.get(&prop_name) {
                    Some(SymbolEntry::Column { table_alias, column }) => {
                        Ok(ConvertedNode::Expr(Expression::Column {
                            name: column.clone(),
                            table: Some(table_alias.clone()),
                        }))
                    }
                    Some(SymbolEntry::TableRef { table_alias }) => {
                        Ok(ConvertedNode::TableRef(table_alias.clone()))
                    }
                    None => Err(ConvertError::UnboundIdentifier(format!(
                        "{}.{}",
                        obj_name, prop_name
                    ))),
                }
            }
            Some(Binding::Grouping { key_selector, .. }) if prop_name == "key" => {
                Ok(ConvertedNode::Expr((**key_selector).clone()))
            }
            Some(Binding::Grouping { .. }) => Err(ConvertError::UnsupportedConstruct(format!(
                "grouping parameter property '.{}'; only '.key' and aggregate methods are supported",
                prop_name
            ))),
            None => Err(ConvertError::UnboundIdentifier(obj_name.clone())),
        };
    }

    // Nested member on an already-resolved table reference, e.g. the second
    // hop of `x.user.id` once `x.user` resolved to a `TableRef`.
    match convert_expr(object, scope, ctx, params, state)? {
        ConvertedNode::TableRef(alias) => Ok(ConvertedNode::Expr(Expression::Column {
            name: prop_name,
            table: Some(alias),
        })),
        ConvertedNode::Expr(_) => Err(ConvertError::UnsupportedConstruct(format!(
            "member access '.{}' on a non-row expression",
            prop_name
        ))),
    }
}

fn parse_literal_index(expr: &JsExpr) -> ConvertResult<usize> {
    match expr {
        JsExpr::Literal {
            value: Literal::Number(n),
            ..
        } if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as usize),
        other => Err(ConvertError::UnsupportedConstruct(format!(
            "array index must be a non-negative integer literal (position: {})",
            other.pos()
        ))),
    }
}

fn convert_computed_member(
    object: &JsExpr,
    index_expr: &JsExpr,
    scope: &Scope,
    ctx: &QueryContext,
    params: &QueryParams,
    state: &mut ConversionState,
) -> ConvertResult<ConvertedNode> {
    match convert_expr(object, scope, ctx, params, state)? {
        ConvertedNode::Expr(Expression::Param {
            param,
            property: Some(property),
            index: None,
        }) => {
            let index = parse_literal_index(index_expr)?;
            Ok(ConvertedNode::Expr(Expression::Param {
                param,
                property: Some(property),
                index: Some(index),
            }))
        }
        _ => Err(ConvertError::UnsupportedConstruct(
            "computed member access is only supported on a query-parameter property".into(),
        )),
    }
}

fn convert_unary(
    op: UnaryOp,
    argument: &JsExpr,
    scope: &Scope,
    ctx: &QueryContext,
    params: &QueryParams,
    state: &mut ConversionState,
) -> ConvertResult<ConvertedNode> {
    match op {
        UnaryOp::Not => {
            let inner = convert_predicate(argument, scope, ctx, params, state)?;
            Ok(ConvertedNode::Expr(Expression::Not(Box::new(inner))))
        }
        UnaryOp::Neg => {
            if let JsExpr::Literal {
                value: Literal::Number(n),
                ..
            } = argument
            {
                return Ok(ConvertedNode::Expr(auto_param(
                    state,
                    ConstantValue::Number(-n),
                )));
            }
            let inner = convert_to_expression(argument, scope, ctx, params, state)?;
            Ok(ConvertedNode::Expr(Expression::Arithmetic {
                operator: ArithOp::Sub,
                left: Box::new(Expression::Constant {
                    value: ConstantValue::Number(0.0),
                }),
                right: Box::new(inner),
            }))
        }
    }
}

fn is_literal_js(expr: &JsExpr) -> bool {
    matches!(expr, JsExpr::Literal { .. })
}

fn is_string_operand(js: &JsExpr, expr: &Expression) -> bool {
    if matches!(
        js,
        JsExpr::Literal {
            value: Literal::String(_),
            ..
        }
    ) {
        return true;
    }
    match expr {
        Expression::Concat { .. } => true,
        Expression::Column { name, .. } | Expression::BooleanColumn { name, .. } => {
            is_stringish_name(name)
        }
        Expression::Param { param, property, .. } => {
            is_stringish_name(property.as_deref().unwrap_or(param))
        }
        _ => false,
    }
}

fn is_boolean_expr(expr: &Expression) -> bool {
    matches!(
        expr,
        Expression::Comparison { .. }
            | Expression::Logical { .. }
            | Expression::Not(_)
            | Expression::BooleanColumn { .. }
            | Expression::BooleanMethod { .. }
            | Expression::In { .. }
    )
}

/// Attaches a field-context hint to the auto-param most recently produced
/// from a direct literal operand of a comparison/arithmetic against a
/// column (spec.md §4.4).
fn attach_field_context(
    state: &mut ConversionState,
    left_js: &JsExpr,
    left: &Expression,
    right_js: &JsExpr,
    right: &Expression,
) {
    if is_literal_js(right_js) {
        if let (Expression::Column { name, table }, Expression::Param { param, .. }) = (left, right) {
            if let Some(ap) = state.auto_params.iter_mut().rev().find(|a| &a.name == param) {
                ap.field_context = Some(FieldContext {
                    field_name: name.clone(),
                    table_name: table.clone(),
                });
            }
        }
    }
    if is_literal_js(left_js) {
        if let (Expression::Param { param, .. }, Expression::Column { name, table }) = (left, right) {
            if let Some(ap) = state.auto_params.iter_mut().rev().find(|a| &a.name == param) {
                ap.field_context = Some(FieldContext {
                    field_name: name.clone(),
                    table_name: table.clone(),
                });
            }
        }
    }
}

fn convert_binary(
    op: BinaryOp,
    left_js: &JsExpr,
    right_js: &JsExpr,
    scope: &Scope,
    ctx: &QueryContext,
    params: &QueryParams,
    state: &mut ConversionState,
) -> ConvertResult<ConvertedNode> {
    let left = convert_to_expression(left_js, scope, ctx, params, state)?;
    let right = convert_to_expression(right_js, scope, ctx, params, state)?;

    let result = match op {
        BinaryOp::Add => {
            if is_string_operand(left_js, &left) || is_string_operand(right_js, &right) {
                Expression::Concat {
                    left: Box::new(left),
                    right: Box::new(right),
                }
            } else {
                attach_field_context(state, left_js, &left, right_js, &right);
                Expression::Arithmetic {
                    operator: ArithOp::Add,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            attach_field_context(state, left_js, &left, right_js, &right);
            let operator = match op {
                BinaryOp::Sub => ArithOp::Sub,
                BinaryOp::Mul => ArithOp::Mul,
                BinaryOp::Div => ArithOp::Div,
                BinaryOp::Mod => ArithOp::Mod,
                _ => unreachable!(),
            };
            Expression::Arithmetic {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        BinaryOp::Eq | BinaryOp::NotEq => {
            attach_field_context(state, left_js, &left, right_js, &right);
            let operator = if op == BinaryOp::Eq {
                CompareOp::Eq
            } else {
                CompareOp::NotEq
            };
            Expression::Comparison {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            attach_field_context(state, left_js, &left, right_js, &right);
            let operator = match op {
                BinaryOp::Lt => CompareOp::Lt,
                BinaryOp::Lte => CompareOp::Lte,
                BinaryOp::Gt => CompareOp::Gt,
                BinaryOp::Gte => CompareOp::Gte,
                _ => unreachable!(),
            };
            Expression::Comparison {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        BinaryOp::And => Expression::Logical {
            operator: LogicalOp::And,
            left: Box::new(to_boolean(left)),
            right: Box::new(to_boolean(right)),
        },
        BinaryOp::Or => {
            if is_boolean_expr(&left) && is_boolean_expr(&right) {
                Expression::Logical {
                    operator: LogicalOp::Or,
                    left: Box::new(to_boolean(left)),
                    right: Box::new(to_boolean(right)),
                }
            } else {
                flatten_coalesce(left, right)
            }
        }
        BinaryOp::NullishCoalesce => flatten_coalesce(left, right),
    };

    Ok(ConvertedNode::Expr(result))
}

fn flatten_coalesce(left: Expression, right: Expression) -> Expression {
    let mut expressions = match left {
        Expression::Coalesce { expressions } => expressions,
        other => vec![other],
    };
    match right {
        Expression::Coalesce { expressions: more } => expressions.extend(more),
        other => expressions.push(other),
    }
    Expression::Coalesce { expressions }
}

fn convert_call(
    callee: &JsExpr,
    arguments: &[JsExpr],
    scope: &Scope,
    ctx: &QueryContext,
    params: &QueryParams,
    state: &mut ConversionState,
) -> ConvertResult<ConvertedNode> {
    let (object, property) = match callee {
        JsExpr::Member {
            object,
            property,
            computed: false,
            ..
        } => (object.as_ref(), property.as_ref()),
        _ => {
            return Err(ConvertError::UnsupportedConstruct(
                "call to a non-member callee".into(),
            ))
        }
    };

    let method_name = match property {
        JsExpr::Identifier { name, .. } => name.clone(),
        _ => {
            return Err(ConvertError::UnsupportedConstruct(
                "computed method call".into(),
            ))
        }
    };

    if let JsExpr::Identifier { name: obj_name, .. } = object {
        if let Some(Binding::Grouping { row_binding, .. }) = scope.lookup(obj_name) {
            return convert_aggregate_call(&method_name, arguments, row_binding, ctx, params, state);
        }
    }

    let object_converted = convert_expr(object, scope, ctx, params, state)?;

    match method_name.as_str() {
        "toLowerCase" | "toUpperCase" => {
            let object_expr = expect_expr(object_converted, "string method receiver")?;
            let method = if method_name == "toLowerCase" {
                StringMethodKind::ToLowerCase
            } else {
                StringMethodKind::ToUpperCase
            };
            Ok(ConvertedNode::Expr(Expression::StringMethod {
                object: Box::new(object_expr),
                method,
            }))
        }
        "startsWith" | "endsWith" | "contains" => {
            let object_expr = expect_expr(object_converted, "string method receiver")?;
            let args = convert_args(arguments, scope, ctx, params, state)?;
            let method = match method_name.as_str() {
                "startsWith" => BooleanMethodKind::StartsWith,
                "endsWith" => BooleanMethodKind::EndsWith,
                "contains" => BooleanMethodKind::Contains,
                _ => unreachable!(),
            };
            Ok(ConvertedNode::Expr(Expression::BooleanMethod {
                object: Box::new(object_expr),
                method,
                arguments: args,
            }))
        }
        "includes" => convert_includes(object_converted, arguments, scope, ctx, params, state),
        other => Err(ConvertError::UnsupportedConstruct(format!(
            "method '{}'",
            other
        ))),
    }
}

/// `.includes(x)` means string substring search on a string receiver, or
/// array membership (`in`) on an array/param-list receiver (spec.md §4.4:
/// "`Array.includes(x)` becomes an `in` expression").
fn convert_includes(
    object_converted: ConvertedNode,
    arguments: &[JsExpr],
    scope: &Scope,
    ctx: &QueryContext,
    params: &QueryParams,
    state: &mut ConversionState,
) -> ConvertResult<ConvertedNode> {
    let mut args = convert_args(arguments, scope, ctx, params, state)?;
    if args.len() != 1 {
        return Err(ConvertError::WrongArity {
            operator: "includes".into(),
            expected: "1".into(),
            received: args.len(),
        });
    }
    let value = args.remove(0);

    match object_converted {
        ConvertedNode::Expr(Expression::Array { elements }) => Ok(ConvertedNode::Expr(Expression::In {
            value: Box::new(value),
            list: InList::Literal(elements),
            negated: false,
        })),
        ConvertedNode::Expr(Expression::Param {
            param,
            property,
            index: None,
        }) => Ok(ConvertedNode::Expr(Expression::In {
            value: Box::new(value),
            list: InList::Param(property.unwrap_or(param)),
            negated: false,
        })),
        ConvertedNode::Expr(object_expr) => Ok(ConvertedNode::Expr(Expression::BooleanMethod {
            object: Box::new(object_expr),
            method: BooleanMethodKind::Includes,
            arguments: vec![value],
        })),
        ConvertedNode::TableRef(alias) => Err(ConvertError::JoinShapeError(format!(
            "'includes' called on unresolved table reference '{}'",
            alias
        ))),
    }
}

fn convert_args(
    arguments: &[JsExpr],
    scope: &Scope,
    ctx: &QueryContext,
    params: &QueryParams,
    state: &mut ConversionState,
) -> ConvertResult<Vec<Expression>> {
    arguments
        .iter()
        .map(|arg| convert_to_expression(arg, scope, ctx, params, state))
        .collect()
}

fn convert_aggregate_call(
    method_name: &str,
    arguments: &[JsExpr],
    row_binding: &Binding,
    ctx: &QueryContext,
    params: &QueryParams,
    state: &mut ConversionState,
) -> ConvertResult<ConvertedNode> {
    let function = match method_name {
        "count" => AggregateFn::Count,
        "sum" => AggregateFn::Sum,
        "avg" | "average" => AggregateFn::Avg,
        "min" => AggregateFn::Min,
        "max" => AggregateFn::Max,
        other => {
            return Err(ConvertError::UnsupportedConstruct(format!(
                "grouping method '{}'",
                other
            )))
        }
    };

    if function == AggregateFn::Count && arguments.is_empty() {
        return Ok(ConvertedNode::Expr(Expression::Aggregate {
            function,
            expression: None,
        }));
    }

    let arg = arguments.first().ok_or_else(|| ConvertError::WrongArity {
        operator: method_name.to_string(),
        expected: "1".into(),
        received: 0,
    })?;

    let arrow = match arg {
        JsExpr::Arrow(arrow) => arrow,
        _ => {
            return Err(ConvertError::UnsupportedConstruct(
                "aggregate selector must be an arrow function".into(),
            ))
        }
    };

    if arrow.params.len() != 1 {
        return Err(ConvertError::WrongArity {
            operator: method_name.to_string(),
            expected: "1 parameter".into(),
            received: arrow.params.len(),
        });
    }

    let inner_scope = Scope::new().bind(arrow.params[0].clone(), row_binding.clone());
    let inner_expr = convert_to_expression(&arrow.body, &inner_scope, ctx, params, state)?;

    Ok(ConvertedNode::Expr(Expression::Aggregate {
        function,
        expression: Some(Box::new(inner_expr)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast;

    fn run(source: &str, scope: Scope, params: &QueryParams) -> (Expression, ConversionState) {
        let js = ast::parse(source).unwrap();
        let body = match js {
            JsExpr::Arrow(arrow) => *arrow.body,
            other => other,
        };
        let ctx = QueryContext::new().with_table("users", vec!["age".into(), "name".into()]);
        let mut state = ConversionState::new();
        let expr = convert_to_expression(&body, &scope, &ctx, params, &mut state).unwrap();
        (expr, state)
    }

    #[test]
    fn literal_in_comparison_gets_auto_parameterized_with_field_context() {
        let scope = Scope::new().bind("u", Binding::Row { table_alias: None });
        let params = QueryParams::new();
        let (expr, state) = run("u => u.age > 18", scope, &params);
        match expr {
            Expression::Comparison { operator: CompareOp::Gt, right, .. } => match *right {
                Expression::Param { param, .. } => {
                    let ap = state.auto_params.iter().find(|a| a.name == param).unwrap();
                    assert_eq!(ap.field_context.as_ref().unwrap().field_name, "age");
                }
                _ => panic!("expected Param"),
            },
            _ => panic!("expected Comparison"),
        }
    }

    #[test]
    fn null_comparison_stays_inline_constant() {
        let scope = Scope::new().bind("u", Binding::Row { table_alias: None });
        let params = QueryParams::new();
        let (expr, state) = run("u => u.age == null", scope, &params);
        assert!(state.auto_params.is_empty());
        match expr {
            Expression::Comparison { right, .. } => assert!(right.is_null_constant()),
            _ => panic!("expected comparison"),
        }
    }

    #[test]
    fn string_name_suffix_classifies_plus_as_concat() {
        let scope = Scope::new().bind("u", Binding::Row { table_alias: None });
        let params = QueryParams::new();
        let (expr, _) = run("u => u.firstName + u.lastName", scope, &params);
        assert!(matches!(expr, Expression::Concat { .. }));
    }

    #[test]
    fn numeric_addition_stays_arithmetic() {
        let scope = Scope::new().bind("u", Binding::Row { table_alias: None });
        let params = QueryParams::new();
        let (expr, _) = run("u => u.age + 1", scope, &params);
        assert!(matches!(expr, Expression::Arithmetic { operator: ArithOp::Add, .. }));
    }
}
