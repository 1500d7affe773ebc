//! Chain Recognizer (spec.md §4.3): walks the outermost call chain rooted at
//! `ctx.from(...)`/`from(ctx, ...)` (or the `update`/`insert`/`deleteFrom`
//! write roots) and folds it into an `Operation` tree, dispatching each
//! lambda argument to the [`crate::convert`] module against the row/joined
//! shape in effect at that point in the chain.

use crate::ast::{ArrowFunction, JsExpr};
use crate::context::{QueryContext, QueryParams};
use crate::convert::{convert_predicate, convert_to_expression, Binding, ConversionState, Scope};
use crate::error::{ConvertError, ConvertResult};
use crate::expr::Expression;
use crate::operation::{JoinType, Operation, SymbolEntry, SymbolTable};
use std::rc::Rc;

/// Recognizes a full query-chain source expression and returns its
/// normalized operation tree plus the conversion state accumulated while
/// building it (auto-params, alias counter).
pub fn recognize(
    expr: &JsExpr,
    ctx: &QueryContext,
    params: &QueryParams,
) -> ConvertResult<(Operation, ConversionState)> {
    let mut state = ConversionState::new();
    let (body, qp_name) = unwrap_outer_arrow(expr);
    let operation = recognize_chain(body, ctx, params, &qp_name, &mut state)?;
    Ok((operation, state))
}

/// `(ctx, p) => ...` binds the caller's chosen names for the context and
/// params-object parameters; a bare chain expression (the CLI's case, which
/// already resolved `ctx`/`p` as fixed identifiers) uses the defaults.
fn unwrap_outer_arrow(expr: &JsExpr) -> (&JsExpr, String) {
    match expr {
        JsExpr::Arrow(ArrowFunction { params, body, .. }) => {
            let qp_name = params.get(1).cloned().unwrap_or_else(|| "p".to_string());
            (body, qp_name)
        }
        other => (other, "p".to_string()),
    }
}

fn qp_scope(qp: &str) -> Scope {
    Scope::new().bind(qp, Binding::QueryParams)
}

/// A single `.method(args)` link peeled off the outer end of the chain, in
/// root-to-outer order once the full chain has been flattened.
struct ChainCall {
    method: String,
    args: Vec<JsExpr>,
}

struct RootCall {
    kind: String,
    table: String,
}

const ROOT_METHODS: &[&str] = &["from", "update", "insert", "deleteFrom"];

fn is_root_method(name: &str) -> bool {
    ROOT_METHODS.contains(&name)
}

fn ident_name(expr: &JsExpr) -> ConvertResult<String> {
    match expr {
        JsExpr::Identifier { name, .. } => Ok(name.clone()),
        other => Err(ConvertError::UnsupportedConstruct(format!(
            "expected a plain identifier (position: {})",
            other.pos()
        ))),
    }
}

fn string_literal(expr: &JsExpr) -> ConvertResult<String> {
    match expr {
        JsExpr::Literal {
            value: crate::ast::Literal::String(s),
            ..
        } => Ok(s.clone()),
        other => Err(ConvertError::UnsupportedConstruct(format!(
            "expected a string literal table name (position: {})",
            other.pos()
        ))),
    }
}

/// Peels `Call{Member{object, property}}` layers off the outer end of
/// `expr`, returning the root `from`/`update`/`insert`/`deleteFrom` call and
/// the operator calls chained on top of it, root-to-outer.
fn flatten(expr: &JsExpr) -> ConvertResult<(RootCall, Vec<ChainCall>)> {
    let mut calls = Vec::new();
    let mut current = expr;

    loop {
        match current {
            JsExpr::Call {
                callee, arguments, ..
            } => match &**callee {
                JsExpr::Member {
                    object,
                    property,
                    computed: false,
                    ..
                } => {
                    let method = ident_name(property)?;
                    if is_root_method(&method) {
                        if let JsExpr::Identifier { name, .. } = &**object {
                            if name == "ctx" {
                                let table = arguments
                                    .first()
                                    .ok_or_else(|| ConvertError::WrongArity {
                                        operator: method.clone(),
                                        expected: "1".into(),
                                        received: 0,
                                    })
                                    .and_then(string_literal)?;
                                calls.reverse();
                                return Ok((RootCall { kind: method, table }, calls));
                            }
                        }
                    }
                    calls.push(ChainCall {
                        method,
                        args: arguments.clone(),
                    });
                    current = object;
                }
                JsExpr::Identifier { name, .. } if is_root_method(name) => {
                    let table = arguments
                        .get(1)
                        .ok_or_else(|| ConvertError::WrongArity {
                            operator: name.clone(),
                            expected: "2".into(),
                            received: arguments.len(),
                        })
                        .and_then(string_literal)?;
                    calls.reverse();
                    return Ok((
                        RootCall {
                            kind: name.clone(),
                            table,
                        },
                        calls,
                    ));
                }
                _ => {
                    return Err(ConvertError::UnsupportedConstruct(
                        "call target is not a recognized chain operator".into(),
                    ))
                }
            },
            other => {
                return Err(ConvertError::UnsupportedConstruct(format!(
                    "expected a from/update/insert/deleteFrom chain (position: {})",
                    other.pos()
                )))
            }
        }
    }
}

fn recognize_chain(
    expr: &JsExpr,
    ctx: &QueryContext,
    params: &QueryParams,
    qp: &str,
    state: &mut ConversionState,
) -> ConvertResult<Operation> {
    let (root, calls) = flatten(expr)?;

    if !ctx.has_table(&root.table) {
        return Err(ConvertError::UnboundIdentifier(format!(
            "table '{}'",
            root.table
        )));
    }

    match root.kind.as_str() {
        "from" => build_read_chain(root.table, calls, ctx, params, qp, state),
        "insert" => build_insert(root.table, calls, ctx, params, qp, state),
        "update" => build_update(root.table, calls, ctx, params, qp, state),
        "deleteFrom" => build_delete(root.table, calls, ctx, params, qp, state),
        other => Err(ConvertError::UnknownOperator(other.to_string())),
    }
}

/// What a row-producing node resolves to while the read-path chain is being
/// folded: either a plain operation with the binding its output rows carry,
/// or a `groupJoin` awaiting the `selectMany(...defaultIfEmpty())` pairing
/// that turns it into a single LEFT OUTER JOIN (spec.md §4.5).
enum ChainNode {
    Read {
        operation: Operation,
        binding: Binding,
    },
    PendingGroupJoin {
        outer: Operation,
        inner: Operation,
        outer_key: Expression,
        inner_key: Expression,
        outer_param: String,
        group_param: String,
        outer_binding: Binding,
        inner_binding: Binding,
    },
}

fn build_read_chain(
    table: String,
    calls: Vec<ChainCall>,
    ctx: &QueryContext,
    params: &QueryParams,
    qp: &str,
    state: &mut ConversionState,
) -> ConvertResult<Operation> {
    let alias = state.next_alias();
    let mut node = ChainNode::Read {
        operation: Operation::From {
            table,
            schema: None,
            subquery: None,
            alias_hint: Some(alias.clone()),
        },
        binding: Binding::Row {
            table_alias: Some(alias),
        },
    };

    for call in calls {
        node = apply_read_call(node, call, ctx, params, qp, state)?;
    }

    let (operation, binding) = match node {
        ChainNode::Read { operation, binding } => (operation, binding),
        ChainNode::PendingGroupJoin { .. } => {
            return Err(ConvertError::JoinShapeError(
                "groupJoin must be followed by selectMany(x => x.<group>.defaultIfEmpty(), ...)"
                    .into(),
            ))
        }
    };

    // spec.md §4.3 MissingSelectAfterJoinWithResultSelector: a join whose
    // result-selector is a pure table-reference object (`(u, d) => ({u, d})`)
    // leaves every chain terminal in a joined shape with no resolved columns;
    // it must be followed by a `select` that picks concrete fields out of it.
    if let Binding::JoinedRow { symbol_table } = &binding {
        if symbol_table
            .values()
            .all(|entry| matches!(entry, SymbolEntry::TableRef { .. }))
        {
            return Err(ConvertError::JoinShapeError(
                "join result-selector is a pure table reference; add a '.select(...)' \
                 to project concrete columns before ending the chain"
                    .into(),
            ));
        }
    }

    Ok(if operation.is_terminal() {
        operation
    } else {
        Operation::ToArray {
            source: Box::new(operation),
        }
    })
}

fn single_arrow<'a>(args: &'a [JsExpr], method: &str, arity: usize) -> ConvertResult<&'a ArrowFunction> {
    let arg = args.first().ok_or_else(|| ConvertError::WrongArity {
        operator: method.to_string(),
        expected: "1".into(),
        received: 0,
    })?;
    let arrow = match arg {
        JsExpr::Arrow(arrow) => arrow,
        _ => {
            return Err(ConvertError::UnsupportedConstruct(format!(
                "'{}' expects an arrow-function argument",
                method
            )))
        }
    };
    if arrow.params.len() != arity {
        return Err(ConvertError::WrongArity {
            operator: method.to_string(),
            expected: format!("{} parameter(s)", arity),
            received: arrow.params.len(),
        });
    }
    Ok(arrow)
}

fn optional_arrow<'a>(
    args: &'a [JsExpr],
    method: &str,
) -> ConvertResult<Option<&'a ArrowFunction>> {
    match args.first() {
        None => Ok(None),
        Some(JsExpr::Arrow(arrow)) => {
            if arrow.params.len() != 1 {
                return Err(ConvertError::WrongArity {
                    operator: method.to_string(),
                    expected: "0 or 1 parameter(s)".into(),
                    received: arrow.params.len(),
                });
            }
            Ok(Some(arrow))
        }
        Some(_) => Err(ConvertError::UnsupportedConstruct(format!(
            "'{}' expects an arrow-function predicate",
            method
        ))),
    }
}

fn row_scope(param: &str, binding: &Binding) -> Scope {
    Scope::new().bind(param, binding.clone())
}

fn apply_read_call(
    node: ChainNode,
    call: ChainCall,
    ctx: &QueryContext,
    params: &QueryParams,
    qp: &str,
    state: &mut ConversionState,
) -> ConvertResult<ChainNode> {
    if call.method == "selectMany" {
        return apply_select_many(node, call.args, ctx, params, qp, state);
    }

    let (operation, binding) = match node {
        ChainNode::Read { operation, binding } => (operation, binding),
        ChainNode::PendingGroupJoin { .. } => {
            return Err(ConvertError::JoinShapeError(format!(
                "groupJoin must be followed by selectMany(...defaultIfEmpty()), not '{}'",
                call.method
            )))
        }
    };

    match call.method.as_str() {
        "where" => {
            let arrow = single_arrow(&call.args, "where", 1)?;
            let scope = row_scope(&arrow.params[0], &binding);
            let predicate = convert_predicate(&arrow.body, &scope, ctx, params, state)?;
            Ok(ChainNode::Read {
                operation: Operation::Where {
                    source: Box::new(operation),
                    predicate,
                },
                binding,
            })
        }
        "select" => {
            let arrow = single_arrow(&call.args, "select", 1)?;
            let scope = row_scope(&arrow.params[0], &binding);
            let selector = convert_to_expression(&arrow.body, &scope, ctx, params, state)?;
            Ok(ChainNode::Read {
                operation: Operation::Select {
                    source: Box::new(operation),
                    selector,
                },
                binding: Binding::Row { table_alias: None },
            })
        }
        "groupBy" => {
            let arrow = single_arrow(&call.args, "groupBy", 1)?;
            let scope = row_scope(&arrow.params[0], &binding);
            let key_selector = convert_to_expression(&arrow.body, &scope, ctx, params, state)?;
            Ok(ChainNode::Read {
                operation: Operation::GroupBy {
                    source: Box::new(operation),
                    key_selector: key_selector.clone(),
                },
                binding: Binding::Grouping {
                    key_selector: Box::new(key_selector),
                    row_binding: Box::new(binding),
                },
            })
        }
        "orderBy" | "orderByDescending" | "thenBy" | "thenByDescending" => {
            let arrow = single_arrow(&call.args, &call.method, 1)?;
            let scope = row_scope(&arrow.params[0], &binding);
            let key_selector = convert_to_expression(&arrow.body, &scope, ctx, params, state)?;
            let descending = call.method.ends_with("Descending");
            let operation = if call.method.starts_with("thenBy") {
                Operation::ThenBy {
                    source: Box::new(operation),
                    key_selector,
                    descending,
                }
            } else {
                Operation::OrderBy {
                    source: Box::new(operation),
                    key_selector,
                    descending,
                }
            };
            Ok(ChainNode::Read { operation, binding })
        }
        "take" | "skip" => {
            let arg = call
                .args
                .first()
                .ok_or_else(|| ConvertError::WrongArity {
                    operator: call.method.clone(),
                    expected: "1".into(),
                    received: 0,
                })?;
            let scope = qp_scope(qp);
            let count = convert_to_expression(arg, &scope, ctx, params, state)?;
            let operation = if call.method == "take" {
                Operation::Take {
                    source: Box::new(operation),
                    count,
                }
            } else {
                Operation::Skip {
                    source: Box::new(operation),
                    count,
                }
            };
            Ok(ChainNode::Read { operation, binding })
        }
        "distinct" => Ok(ChainNode::Read {
            operation: Operation::Distinct {
                source: Box::new(operation),
            },
            binding,
        }),
        "reverse" => Ok(ChainNode::Read {
            operation: Operation::Reverse {
                source: Box::new(operation),
            },
            binding,
        }),
        "count" => Ok(ChainNode::Read {
            operation: Operation::Count {
                source: Box::new(operation),
            },
            binding,
        }),
        "sum" | "avg" | "average" | "min" | "max" => {
            let arrow = single_arrow(&call.args, &call.method, 1)?;
            let scope = row_scope(&arrow.params[0], &binding);
            let selector = convert_to_expression(&arrow.body, &scope, ctx, params, state)?;
            let operation = match call.method.as_str() {
                "sum" => Operation::Sum {
                    source: Box::new(operation),
                    selector,
                },
                "avg" | "average" => Operation::Avg {
                    source: Box::new(operation),
                    selector,
                },
                "min" => Operation::Min {
                    source: Box::new(operation),
                    selector,
                },
                _ => Operation::Max {
                    source: Box::new(operation),
                    selector,
                },
            };
            Ok(ChainNode::Read { operation, binding })
        }
        "first" | "firstOrDefault" | "single" | "singleOrDefault" | "last" | "lastOrDefault" => {
            let predicate = optional_arrow(&call.args, &call.method)?
                .map(|arrow| {
                    let scope = row_scope(&arrow.params[0], &binding);
                    convert_predicate(&arrow.body, &scope, ctx, params, state)
                })
                .transpose()?;
            let source = Box::new(operation);
            let operation = match call.method.as_str() {
                "first" => Operation::First { source, predicate },
                "firstOrDefault" => Operation::FirstOrDefault { source, predicate },
                "single" => Operation::Single { source, predicate },
                "singleOrDefault" => Operation::SingleOrDefault { source, predicate },
                "last" => Operation::Last { source, predicate },
                _ => Operation::LastOrDefault { source, predicate },
            };
            Ok(ChainNode::Read { operation, binding })
        }
        "any" => {
            let predicate = optional_arrow(&call.args, "any")?
                .map(|arrow| {
                    let scope = row_scope(&arrow.params[0], &binding);
                    convert_predicate(&arrow.body, &scope, ctx, params, state)
                })
                .transpose()?;
            Ok(ChainNode::Read {
                operation: Operation::Any {
                    source: Box::new(operation),
                    predicate,
                },
                binding,
            })
        }
        "all" => {
            let arrow = single_arrow(&call.args, "all", 1)?;
            let scope = row_scope(&arrow.params[0], &binding);
            let predicate = convert_predicate(&arrow.body, &scope, ctx, params, state)?;
            Ok(ChainNode::Read {
                operation: Operation::All {
                    source: Box::new(operation),
                    predicate,
                },
                binding,
            })
        }
        "toArray" | "toList" => Ok(ChainNode::Read {
            operation: Operation::ToArray {
                source: Box::new(operation),
            },
            binding,
        }),
        "join" => apply_join(operation, binding, call.args, ctx, params, qp, state),
        "groupJoin" => apply_group_join(operation, binding, call.args, ctx, params, qp, state),
        other => Err(ConvertError::UnknownOperator(other.to_string())),
    }
}

/// `.join(innerSource, outerKeySelector, innerKeySelector, resultSelector)`
/// (spec.md §4.3) — an INNER JOIN with a two-parameter result selector.
fn apply_join(
    outer: Operation,
    outer_binding: Binding,
    args: Vec<JsExpr>,
    ctx: &QueryContext,
    params: &QueryParams,
    qp: &str,
    state: &mut ConversionState,
) -> ConvertResult<ChainNode> {
    if args.len() != 4 {
        return Err(ConvertError::WrongArity {
            operator: "join".into(),
            expected: "4".into(),
            received: args.len(),
        });
    }
    let inner_source_expr = &args[0];
    let outer_key_arrow = arrow_arg(&args[1], "join")?;
    let inner_key_arrow = arrow_arg(&args[2], "join")?;
    let result_arrow = arrow_arg_n(&args[3], "join", 2)?;

    let (inner_op, inner_binding) = recognize_sub_source(inner_source_expr, ctx, params, qp, state)?;

    let outer_key_scope = row_scope(&outer_key_arrow.params[0], &outer_binding);
    let outer_key = convert_to_expression(&outer_key_arrow.body, &outer_key_scope, ctx, params, state)?;
    let inner_key_scope = row_scope(&inner_key_arrow.params[0], &inner_binding);
    let inner_key = convert_to_expression(&inner_key_arrow.body, &inner_key_scope, ctx, params, state)?;

    let outer_param = &result_arrow.params[0];
    let inner_param = &result_arrow.params[1];
    let symbol_table = build_join_symbol_table(
        &result_arrow.body,
        outer_param,
        inner_param,
        &outer_binding,
        &inner_binding,
    )?;
    let result_selector = symbol_table_to_object(&symbol_table);

    let operation = Operation::Join {
        source: Box::new(outer),
        inner: Box::new(inner_op),
        outer_key: Some(outer_key),
        inner_key: Some(inner_key),
        result_selector,
        join_type: JoinType::Inner,
        symbol_table: symbol_table.clone(),
    };
    Ok(ChainNode::Read {
        operation,
        binding: Binding::JoinedRow {
            symbol_table: Rc::new(symbol_table),
        },
    })
}

/// `.groupJoin(innerSource, outerKeySelector, innerKeySelector, resultSelector)`
/// — held pending until the matching `selectMany` arrives (spec.md §4.5).
fn apply_group_join(
    outer: Operation,
    outer_binding: Binding,
    args: Vec<JsExpr>,
    ctx: &QueryContext,
    params: &QueryParams,
    qp: &str,
    state: &mut ConversionState,
) -> ConvertResult<ChainNode> {
    if args.len() != 4 {
        return Err(ConvertError::WrongArity {
            operator: "groupJoin".into(),
            expected: "4".into(),
            received: args.len(),
        });
    }
    let inner_source_expr = &args[0];
    let outer_key_arrow = arrow_arg(&args[1], "groupJoin")?;
    let inner_key_arrow = arrow_arg(&args[2], "groupJoin")?;
    let result_arrow = arrow_arg_n(&args[3], "groupJoin", 2)?;

    let (inner_op, inner_binding) = recognize_sub_source(inner_source_expr, ctx, params, qp, state)?;

    let outer_key_scope = row_scope(&outer_key_arrow.params[0], &outer_binding);
    let outer_key = convert_to_expression(&outer_key_arrow.body, &outer_key_scope, ctx, params, state)?;
    let inner_key_scope = row_scope(&inner_key_arrow.params[0], &inner_binding);
    let inner_key = convert_to_expression(&inner_key_arrow.body, &inner_key_scope, ctx, params, state)?;

    Ok(ChainNode::PendingGroupJoin {
        outer,
        inner: inner_op,
        outer_key,
        inner_key,
        outer_param: result_arrow.params[0].clone(),
        group_param: result_arrow.params[1].clone(),
        outer_binding,
        inner_binding,
    })
}

/// Handles both `selectMany` forms: the `groupJoin` + `defaultIfEmpty()`
/// pairing that collapses into a LEFT OUTER JOIN, and a plain cross join
/// over an unrelated queryable.
fn apply_select_many(
    node: ChainNode,
    args: Vec<JsExpr>,
    ctx: &QueryContext,
    params: &QueryParams,
    qp: &str,
    state: &mut ConversionState,
) -> ConvertResult<ChainNode> {
    if args.len() != 2 {
        return Err(ConvertError::WrongArity {
            operator: "selectMany".into(),
            expected: "2".into(),
            received: args.len(),
        });
    }
    let collection_arrow = arrow_arg(&args[0], "selectMany")?;
    let result_arrow = arrow_arg_n(&args[1], "selectMany", 2)?;

    match node {
        ChainNode::PendingGroupJoin {
            outer,
            inner,
            outer_key,
            inner_key,
            outer_param,
            group_param,
            outer_binding,
            inner_binding,
        } => {
            if collection_arrow.params.len() != 1
                || collection_arrow.params[0] != outer_param
            {
                return Err(ConvertError::JoinShapeError(
                    "selectMany's collection selector must take the groupJoin result parameter"
                        .into(),
                ));
            }
            expect_default_if_empty(&collection_arrow.body, &outer_param, &group_param)?;

            let shape_param = &result_arrow.params[0];
            let inner_param = &result_arrow.params[1];

            // The shape seen by the left side of the final result selector is
            // the groupJoin's own result shape, minus the group marker (which
            // collapses into the join itself and is never itself projected).
            let mut shape_table = SymbolTable::new();
            shape_table.insert(outer_param.clone(), table_ref_entry(&outer_binding, &outer_param)?);

            let shape_binding = Binding::JoinedRow {
                symbol_table: Rc::new(shape_table),
            };

            let symbol_table = build_join_symbol_table(
                &result_arrow.body,
                shape_param,
                inner_param,
                &shape_binding,
                &inner_binding,
            )?;
            let result_selector = symbol_table_to_object(&symbol_table);

            let operation = Operation::Join {
                source: Box::new(outer),
                inner: Box::new(inner),
                outer_key: Some(outer_key),
                inner_key: Some(inner_key),
                result_selector,
                join_type: JoinType::LeftOuter,
                symbol_table: symbol_table.clone(),
            };
            Ok(ChainNode::Read {
                operation,
                binding: Binding::JoinedRow {
                    symbol_table: Rc::new(symbol_table),
                },
            })
        }
        ChainNode::Read {
            operation: outer,
            binding: outer_binding,
        } => {
            // Cross join: the collection selector ignores its row parameter
            // and returns an independent queryable chain.
            let (inner_op, inner_binding) =
                recognize_sub_source(&collection_arrow.body, ctx, params, qp, state)?;

            let shape_param = &result_arrow.params[0];
            let inner_param = &result_arrow.params[1];
            let symbol_table = build_join_symbol_table(
                &result_arrow.body,
                shape_param,
                inner_param,
                &outer_binding,
                &inner_binding,
            )?;
            let result_selector = symbol_table_to_object(&symbol_table);

            let operation = Operation::Join {
                source: Box::new(outer),
                inner: Box::new(inner_op),
                outer_key: None,
                inner_key: None,
                result_selector,
                join_type: JoinType::Cross,
                symbol_table: symbol_table.clone(),
            };
            Ok(ChainNode::Read {
                operation,
                binding: Binding::JoinedRow {
                    symbol_table: Rc::new(symbol_table),
                },
            })
        }
    }
}

/// Validates the `x => x.<group>.defaultIfEmpty()` collection-selector shape
/// required to collapse a `groupJoin` into a LEFT OUTER JOIN.
fn expect_default_if_empty(body: &JsExpr, outer_param: &str, group_param: &str) -> ConvertResult<()> {
    let shape_error = || {
        ConvertError::JoinShapeError(
            "expected 'x => x.<group>.defaultIfEmpty()' as the selectMany collection selector"
                .into(),
        )
    };
    match body {
        JsExpr::Call {
            callee, arguments, ..
        } if arguments.is_empty() => match &**callee {
            JsExpr::Member {
                object,
                property,
                computed: false,
                ..
            } => {
                let method = ident_name(property).map_err(|_| shape_error())?;
                if method != "defaultIfEmpty" {
                    return Err(shape_error());
                }
                match &**object {
                    JsExpr::Member {
                        object: inner_object,
                        property: inner_property,
                        computed: false,
                        ..
                    } => {
                        let root = ident_name(inner_object).map_err(|_| shape_error())?;
                        let field = ident_name(inner_property).map_err(|_| shape_error())?;
                        if root == outer_param && field == group_param {
                            Ok(())
                        } else {
                            Err(shape_error())
                        }
                    }
                    _ => Err(shape_error()),
                }
            }
            _ => Err(shape_error()),
        },
        _ => Err(shape_error()),
    }
}

fn arrow_arg<'a>(expr: &'a JsExpr, method: &str) -> ConvertResult<&'a ArrowFunction> {
    arrow_arg_n(expr, method, 1)
}

fn arrow_arg_n<'a>(expr: &'a JsExpr, method: &str, arity: usize) -> ConvertResult<&'a ArrowFunction> {
    match expr {
        JsExpr::Arrow(arrow) if arrow.params.len() == arity => Ok(arrow),
        JsExpr::Arrow(arrow) => Err(ConvertError::WrongArity {
            operator: method.to_string(),
            expected: format!("{} parameter(s)", arity),
            received: arrow.params.len(),
        }),
        _ => Err(ConvertError::UnsupportedConstruct(format!(
            "'{}' expects an arrow-function argument",
            method
        ))),
    }
}

/// Recognizes an inner/cross join source, which is itself a full `from(...)`
/// chain (typically just `ctx.from("table")`, but any read chain is
/// accepted).
fn recognize_sub_source(
    expr: &JsExpr,
    ctx: &QueryContext,
    params: &QueryParams,
    qp: &str,
    state: &mut ConversionState,
) -> ConvertResult<(Operation, Binding)> {
    let (root, calls) = flatten(expr)?;
    if root.kind != "from" {
        return Err(ConvertError::UnsupportedConstruct(
            "join/groupJoin/selectMany inner source must be a 'from' chain".into(),
        ));
    }
    if !ctx.has_table(&root.table) {
        return Err(ConvertError::UnboundIdentifier(format!(
            "table '{}'",
            root.table
        )));
    }
    let alias = state.next_alias();
    let mut node = ChainNode::Read {
        operation: Operation::From {
            table: root.table,
            schema: None,
            subquery: None,
            alias_hint: Some(alias.clone()),
        },
        binding: Binding::Row {
            table_alias: Some(alias),
        },
    };
    for call in calls {
        node = apply_read_call(node, call, ctx, params, qp, state)?;
    }
    match node {
        ChainNode::Read { operation, binding } => Ok((operation, binding)),
        ChainNode::PendingGroupJoin { .. } => Err(ConvertError::JoinShapeError(
            "join source ended mid-groupJoin with no matching selectMany".into(),
        )),
    }
}

/// Builds the symbol table for a two-parameter join/groupJoin result
/// selector object literal. Every property must be either a bare table
/// reference (`u`) or a direct field off one of the two parameters
/// (`d.name`) — mixing the two forms in the same selector is rejected
/// (spec.md §4.3 "MixedJoinSelector").
fn build_join_symbol_table(
    body: &JsExpr,
    outer_param: &str,
    inner_param: &str,
    outer_binding: &Binding,
    inner_binding: &Binding,
) -> ConvertResult<SymbolTable> {
    let properties = match body {
        JsExpr::Object { properties, .. } => properties,
        _ => {
            return Err(ConvertError::JoinShapeError(
                "join result selector must be an object literal".into(),
            ))
        }
    };

    let mut table = SymbolTable::new();
    let mut saw_table_ref = false;
    let mut saw_column = false;

    for prop in properties {
        match &prop.value {
            JsExpr::Identifier { name, .. } if name == outer_param => {
                table.insert(prop.key.clone(), table_ref_entry(outer_binding, outer_param)?);
                saw_table_ref = true;
            }
            JsExpr::Identifier { name, .. } if name == inner_param => {
                table.insert(prop.key.clone(), table_ref_entry(inner_binding, inner_param)?);
                saw_table_ref = true;
            }
            JsExpr::Member {
                object,
                property,
                computed: false,
                ..
            } => {
                let root = ident_name(object)?;
                let field = ident_name(property)?;
                let entry = if root == outer_param {
                    column_entry(outer_binding, &field)?
                } else if root == inner_param {
                    column_entry(inner_binding, &field)?
                } else {
                    return Err(ConvertError::JoinShapeError(format!(
                        "join result selector field '{}' does not reference either parameter",
                        prop.key
                    )));
                };
                table.insert(prop.key.clone(), entry);
                saw_column = true;
            }
            _ => {
                return Err(ConvertError::JoinShapeError(format!(
                    "join result selector field '{}' must be a bare parameter or one of its columns",
                    prop.key
                )))
            }
        }
    }

    if saw_table_ref && saw_column {
        return Err(ConvertError::JoinShapeError(
            "join result selector mixes whole-table references and individual columns".into(),
        ));
    }

    Ok(table)
}

fn table_ref_entry(binding: &Binding, param_name: &str) -> ConvertResult<SymbolEntry> {
    match binding {
        Binding::Row {
            table_alias: Some(alias),
        } => Ok(SymbolEntry::TableRef {
            table_alias: alias.clone(),
        }),
        Binding::JoinedRow { .. } => Err(ConvertError::JoinShapeError(format!(
            "'{}' is already a joined shape; nest a 'select' before joining again",
            param_name
        ))),
        _ => Err(ConvertError::JoinShapeError(format!(
            "'{}' is not a row binding",
            param_name
        ))),
    }
}

fn column_entry(binding: &Binding, field: &str) -> ConvertResult<SymbolEntry> {
    match binding {
        Binding::Row {
            table_alias: Some(alias),
        } => Ok(SymbolEntry::Column {
            table_alias: alias.clone(),
            column: field.to_string(),
        }),
        Binding::JoinedRow { symbol_table } => match symbol_table.get(field) {
            Some(entry) => Ok(entry.clone()),
            None => Err(ConvertError::UnboundIdentifier(field.to_string())),
        },
        _ => Err(ConvertError::JoinShapeError(format!(
            "cannot project field '{}' from this binding",
            field
        ))),
    }
}

fn symbol_table_to_object(table: &SymbolTable) -> Expression {
    let mut properties: Vec<(String, Expression)> = table
        .iter()
        .map(|(key, entry)| {
            let expr = match entry {
                SymbolEntry::Column { table_alias, column } => Expression::Column {
                    name: column.clone(),
                    table: Some(table_alias.clone()),
                },
                SymbolEntry::TableRef { table_alias } => Expression::Column {
                    name: "*".to_string(),
                    table: Some(table_alias.clone()),
                },
            };
            (key.clone(), expr)
        })
        .collect();
    properties.sort_by(|a, b| a.0.cmp(&b.0));
    Expression::Object { properties }
}

// --- Write path (spec.md §6.1) ---------------------------------------

fn object_literal_properties(expr: &JsExpr, method: &str) -> ConvertResult<&[crate::ast::ObjectProperty]> {
    match expr {
        JsExpr::Object { properties, .. } => Ok(properties),
        _ => Err(ConvertError::UnsupportedConstruct(format!(
            "'{}' expects an object literal argument",
            method
        ))),
    }
}

fn convert_value_object(
    expr: &JsExpr,
    method: &str,
    ctx: &QueryContext,
    params: &QueryParams,
    qp: &str,
    state: &mut ConversionState,
) -> ConvertResult<Vec<(String, Expression)>> {
    let scope = qp_scope(qp);
    object_literal_properties(expr, method)?
        .iter()
        .map(|prop| -> ConvertResult<(String, Expression)> {
            Ok((
                prop.key.clone(),
                convert_to_expression(&prop.value, &scope, ctx, params, state)?,
            ))
        })
        .collect()
}

fn string_array(expr: &JsExpr, method: &str) -> ConvertResult<Vec<String>> {
    match expr {
        JsExpr::Array { elements, .. } => elements
            .iter()
            .map(|e| string_literal(e))
            .collect::<ConvertResult<Vec<_>>>(),
        _ => Err(ConvertError::UnsupportedConstruct(format!(
            "'{}' expects an array of column-name string literals",
            method
        ))),
    }
}

fn build_insert(
    table: String,
    calls: Vec<ChainCall>,
    ctx: &QueryContext,
    params: &QueryParams,
    qp: &str,
    state: &mut ConversionState,
) -> ConvertResult<Operation> {
    let mut values: Option<Vec<(String, Expression)>> = None;
    let mut returning: Option<Vec<String>> = None;

    for call in calls {
        match call.method.as_str() {
            "values" => {
                let arg = call.args.first().ok_or_else(|| ConvertError::WrongArity {
                    operator: "values".into(),
                    expected: "1".into(),
                    received: 0,
                })?;
                values = Some(convert_value_object(arg, "values", ctx, params, qp, state)?);
            }
            "returning" => {
                let arg = call.args.first().ok_or_else(|| ConvertError::WrongArity {
                    operator: "returning".into(),
                    expected: "1".into(),
                    received: 0,
                })?;
                returning = Some(string_array(arg, "returning")?);
            }
            other => return Err(ConvertError::UnknownOperator(other.to_string())),
        }
    }

    let values = values.ok_or_else(|| ConvertError::UnsupportedConstruct(
        "insert(...) requires a '.values({...})' call".into(),
    ))?;

    for (column, _) in &values {
        if !ctx.has_column(&table, column) {
            return Err(ConvertError::UnboundIdentifier(format!(
                "{}.{}",
                table, column
            )));
        }
    }

    Ok(Operation::Insert {
        table,
        schema: None,
        values,
        returning,
    })
}

fn build_update(
    table: String,
    calls: Vec<ChainCall>,
    ctx: &QueryContext,
    params: &QueryParams,
    qp: &str,
    state: &mut ConversionState,
) -> ConvertResult<Operation> {
    let mut set: Option<Vec<(String, Expression)>> = None;
    let mut where_: Option<Expression> = None;
    let mut returning: Option<Vec<String>> = None;
    let mut allow_full_table_update = false;

    let row_binding = Binding::Row { table_alias: None };

    for call in calls {
        match call.method.as_str() {
            "set" => {
                let arg = call.args.first().ok_or_else(|| ConvertError::WrongArity {
                    operator: "set".into(),
                    expected: "1".into(),
                    received: 0,
                })?;
                set = Some(convert_value_object(arg, "set", ctx, params, qp, state)?);
            }
            "where" => {
                let arrow = single_arrow(&call.args, "where", 1)?;
                let scope = row_scope(&arrow.params[0], &row_binding);
                where_ = Some(convert_predicate(&arrow.body, &scope, ctx, params, state)?);
            }
            "returning" => {
                let arg = call.args.first().ok_or_else(|| ConvertError::WrongArity {
                    operator: "returning".into(),
                    expected: "1".into(),
                    received: 0,
                })?;
                returning = Some(string_array(arg, "returning")?);
            }
            "allowFullTableUpdate" => allow_full_table_update = true,
            other => return Err(ConvertError::UnknownOperator(other.to_string())),
        }
    }

    let set = set.ok_or_else(|| ConvertError::UnsupportedConstruct(
        "update(...) requires a '.set({...})' call".into(),
    ))?;

    for (column, _) in &set {
        if !ctx.has_column(&table, column) {
            return Err(ConvertError::UnboundIdentifier(format!(
                "{}.{}",
                table, column
            )));
        }
    }

    if where_.is_none() && !allow_full_table_update {
        return Err(ConvertError::MissingWhereGuard {
            operation: "update".into(),
            table,
        });
    }

    Ok(Operation::Update {
        table,
        schema: None,
        set,
        where_,
        returning,
        allow_full_table_update,
    })
}

fn build_delete(
    table: String,
    calls: Vec<ChainCall>,
    ctx: &QueryContext,
    params: &QueryParams,
    qp: &str,
    state: &mut ConversionState,
) -> ConvertResult<Operation> {
    let mut where_: Option<Expression> = None;
    let mut allow_full_table_delete = false;

    let row_binding = Binding::Row { table_alias: None };

    for call in calls {
        match call.method.as_str() {
            "where" => {
                let arrow = single_arrow(&call.args, "where", 1)?;
                let scope = row_scope(&arrow.params[0], &row_binding);
                where_ = Some(convert_predicate(&arrow.body, &scope, ctx, params, state)?);
            }
            "allowFullTableDelete" => allow_full_table_delete = true,
            other => return Err(ConvertError::UnknownOperator(other.to_string())),
        }
    }

    if where_.is_none() && !allow_full_table_delete {
        return Err(ConvertError::MissingWhereGuard {
            operation: "delete".into(),
            table,
        });
    }

    Ok(Operation::Delete {
        table,
        schema: None,
        where_,
        allow_full_table_delete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast;

    fn ctx() -> QueryContext {
        QueryContext::new()
            .with_table("users", vec!["id".into(), "age".into(), "name".into()])
            .with_table(
                "departments",
                vec!["id".into(), "name".into()],
            )
    }

    #[test]
    fn recognizes_from_where_select() {
        let js = ast::parse(
            r#"(ctx, p) => ctx.from("users").where(u => u.age > p.minAge).select(u => ({ name: u.name }))"#,
        )
        .unwrap();
        let (op, state) = recognize(&js, &ctx(), &QueryParams::new()).unwrap();
        assert!(matches!(op, Operation::ToArray { .. }));
        assert_eq!(state.auto_params.len(), 0);
    }

    #[test]
    fn missing_where_guard_on_delete_is_rejected() {
        let js = ast::parse(r#"(ctx, p) => ctx.deleteFrom("users")"#).unwrap();
        let err = recognize(&js, &ctx(), &QueryParams::new()).unwrap_err();
        assert!(matches!(err, ConvertError::MissingWhereGuard { .. }));
    }

    #[test]
    fn allow_full_table_delete_bypasses_guard() {
        let js =
            ast::parse(r#"(ctx, p) => ctx.deleteFrom("users").allowFullTableDelete()"#).unwrap();
        let (op, _) = recognize(&js, &ctx(), &QueryParams::new()).unwrap();
        assert!(matches!(
            op,
            Operation::Delete {
                allow_full_table_delete: true,
                ..
            }
        ));
    }

    #[test]
    fn join_with_table_ref_selector_builds_joined_shape() {
        let js = ast::parse(
            r#"(ctx, p) => ctx.from("users").join(ctx.from("departments"), u => u.id, d => d.id, (u, d) => ({ u, d }))"#,
        )
        .unwrap();
        let (op, _) = recognize(&js, &ctx(), &QueryParams::new()).unwrap();
        match op {
            Operation::ToArray { source } => match *source {
                Operation::Join { join_type, symbol_table, .. } => {
                    assert_eq!(join_type, JoinType::Inner);
                    assert_eq!(symbol_table.len(), 2);
                }
                _ => panic!("expected Join"),
            },
            _ => panic!("expected ToArray"),
        }
    }

    #[test]
    fn mixed_join_selector_is_rejected() {
        let js = ast::parse(
            r#"(ctx, p) => ctx.from("users").join(ctx.from("departments"), u => u.id, d => d.id, (u, d) => ({ u, name: d.name }))"#,
        )
        .unwrap();
        let err = recognize(&js, &ctx(), &QueryParams::new()).unwrap_err();
        assert!(matches!(err, ConvertError::JoinShapeError(_)));
    }

    #[test]
    fn unknown_table_is_rejected() {
        let js = ast::parse(r#"(ctx, p) => ctx.from("ghosts")"#).unwrap();
        let err = recognize(&js, &ctx(), &QueryParams::new()).unwrap_err();
        assert!(matches!(err, ConvertError::UnboundIdentifier(_)));
    }
}
