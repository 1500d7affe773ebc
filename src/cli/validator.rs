//! Query-chain syntax/semantics validation without SQL generation.
//!
//! Runs the same parse and chain-recognition stages `compile_query` uses,
//! then stops short of the SQL generator (spec.md §2) to report a structural
//! summary instead of a pipeline's worth of errors a reader then has to
//! translate back into "is my chain even well-formed".

use std::collections::HashSet;

use crate::context::{QueryContext, QueryParams};
use crate::error::{ConvertError, LexError, ParseError};
use crate::expr::Expression;
use crate::operation::Operation;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Validation result for a query chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidateResult {
    Valid { summary: ValidationSummary },
    Invalid {
        error: ValidationErrorInfo,
        suggestions: Vec<String>,
    },
}

/// Structural summary of a successfully recognized query chain.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationSummary {
    pub operation_count: usize,
    pub operations: Vec<String>,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub has_aggregation: bool,
    pub has_grouping: bool,
    pub has_joins: bool,
    pub complexity_score: u8,
}

/// Detailed error information for validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrorInfo {
    /// Error type (input, lex, parse, convert).
    pub error_type: String,
    pub message: String,
    pub position: Option<usize>,
    pub context: Option<String>,
}

/// Configuration for validation behavior.
#[derive(Debug, Clone, Default)]
pub struct ValidationConfig {
    /// Whether to flag aggregation-without-grouping and overly complex chains.
    pub semantic_validation: bool,
    /// Rejects chains whose complexity score exceeds this threshold.
    pub max_complexity: Option<u8>,
}

/// Validates query-chain syntax and structure without compiling to SQL.
#[derive(Debug, Default)]
pub struct ChainValidator {
    config: ValidationConfig,
}

impl ChainValidator {
    pub fn new() -> Self {
        Self {
            config: ValidationConfig {
                semantic_validation: true,
                max_complexity: None,
            },
        }
    }

    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validates a query chain source string against a schema and params object.
    pub fn validate(
        &self,
        source: &str,
        context: &QueryContext,
        params: &QueryParams,
    ) -> ValidationResult<ValidateResult> {
        if source.trim().is_empty() {
            return Ok(ValidateResult::Invalid {
                error: ValidationErrorInfo {
                    error_type: "input".to_string(),
                    message: "Empty input provided".to_string(),
                    position: Some(0),
                    context: None,
                },
                suggestions: vec![
                    "Provide a non-empty query chain".to_string(),
                    "Example: (ctx, p) => ctx.from(\"users\").where(u => u.age > p.minAge)"
                        .to_string(),
                ],
            });
        }

        let js = match crate::ast::parse(source) {
            Ok(js) => js,
            Err(e) => {
                let error_info = self.convert_parse_error(&e);
                let suggestions = self.parse_error_suggestions(&e);
                return Ok(ValidateResult::Invalid {
                    error: error_info,
                    suggestions,
                });
            }
        };

        let operation = match crate::chain::recognize(&js, context, params) {
            Ok((operation, _state)) => operation,
            Err(e) => {
                let error_info = self.convert_convert_error(&e);
                let suggestions = self.convert_error_suggestions(&e);
                return Ok(ValidateResult::Invalid {
                    error: error_info,
                    suggestions,
                });
            }
        };

        let summary = self.analyze(&operation);

        if let Some(max_complexity) = self.config.max_complexity {
            if summary.complexity_score > max_complexity {
                return Ok(ValidateResult::Invalid {
                    error: ValidationErrorInfo {
                        error_type: "complexity".to_string(),
                        message: format!(
                            "Query complexity ({}) exceeds maximum allowed ({})",
                            summary.complexity_score, max_complexity
                        ),
                        position: None,
                        context: None,
                    },
                    suggestions: vec![
                        "Break the chain into a simpler query".to_string(),
                        "Reduce the number of operators in the chain".to_string(),
                    ],
                });
            }
        }

        if self.config.semantic_validation {
            if let Some(error) = self.check_semantic_issues(&summary) {
                let suggestions = vec![
                    "Add a groupBy() before the aggregate terminal".to_string(),
                    "Or call toArray() and aggregate client-side if grouping isn't needed"
                        .to_string(),
                ];
                return Ok(ValidateResult::Invalid { error, suggestions });
            }
        }

        Ok(ValidateResult::Valid { summary })
    }

    fn check_semantic_issues(&self, summary: &ValidationSummary) -> Option<ValidationErrorInfo> {
        if summary.has_aggregation && !summary.has_grouping && summary.operation_count > 2 {
            return Some(ValidationErrorInfo {
                error_type: "semantic".to_string(),
                message: "Aggregation terminal without groupBy() over a multi-step chain may not mean what it looks like".to_string(),
                position: None,
                context: Some("Consider calling groupBy() before the aggregate terminal".to_string()),
            });
        }
        None
    }

    fn convert_parse_error(&self, error: &ParseError) -> ValidationErrorInfo {
        let (error_type, position) = match error {
            ParseError::LexError(lex) => ("lex".to_string(), lex_position(lex)),
            ParseError::UnexpectedToken { position, .. } => ("parse".to_string(), Some(*position)),
            ParseError::UnexpectedEof(pos) => ("parse".to_string(), Some(*pos)),
            ParseError::InvalidArrowBody(pos) => ("parse".to_string(), Some(*pos)),
            ParseError::UnsupportedSyntax(_, pos) => ("parse".to_string(), Some(*pos)),
        };
        ValidationErrorInfo {
            error_type,
            message: error.to_string(),
            position,
            context: None,
        }
    }

    fn parse_error_suggestions(&self, error: &ParseError) -> Vec<String> {
        match error {
            ParseError::LexError(_) => vec![
                "Check string quotes are closed".to_string(),
                "Remove unsupported characters or escape sequences".to_string(),
            ],
            ParseError::InvalidArrowBody(_) => vec![
                "Arrow function bodies must be a single expression or one return statement"
                    .to_string(),
            ],
            _ => vec![
                "Check the outer form is: (ctx, p) => ctx.from(\"table\")...".to_string(),
                "Check parentheses, dots, and argument lists".to_string(),
            ],
        }
    }

    fn convert_convert_error(&self, error: &ConvertError) -> ValidationErrorInfo {
        ValidationErrorInfo {
            error_type: "convert".to_string(),
            message: error.to_string(),
            position: None,
            context: None,
        }
    }

    fn convert_error_suggestions(&self, error: &ConvertError) -> Vec<String> {
        match error {
            ConvertError::MissingWhereGuard { .. } => vec![
                "Add a .where(...) predicate before update()/deleteFrom()".to_string(),
                "Or pass allowFullTableUpdate/allowFullTableDelete explicitly".to_string(),
            ],
            ConvertError::UnboundIdentifier(_) => {
                vec!["Check the lambda parameter name is used consistently".to_string()]
            }
            ConvertError::UnknownQueryParameter(_) => {
                vec!["Add the referenced key to the params object".to_string()]
            }
            _ => vec!["Check the query operator chain against the supported operator set".to_string()],
        }
    }

    fn analyze(&self, operation: &Operation) -> ValidationSummary {
        let mut ops = Vec::new();
        let mut columns = HashSet::new();
        let mut has_aggregation = false;
        let mut has_grouping = false;
        let mut has_joins = false;
        let mut score: u8 = 0;

        walk(
            operation,
            &mut ops,
            &mut columns,
            &mut has_aggregation,
            &mut has_grouping,
            &mut has_joins,
            &mut score,
        );

        ValidationSummary {
            operation_count: ops.len(),
            column_count: columns.len(),
            columns: columns.into_iter().collect(),
            operations: ops,
            has_aggregation,
            has_grouping,
            has_joins,
            complexity_score: score.min(10),
        }
    }
}

fn lex_position(error: &LexError) -> Option<usize> {
    match error {
        LexError::UnexpectedCharacter(_, pos) => Some(*pos),
        LexError::UnterminatedString(pos) => Some(*pos),
        LexError::InvalidNumber(_, pos) => Some(*pos),
        LexError::InvalidEscapeSequence(_, pos) => Some(*pos),
        LexError::EmptyInput => None,
    }
}

fn collect_columns(expr: &Expression, columns: &mut HashSet<String>) {
    match expr {
        Expression::Column { name, .. } | Expression::BooleanColumn { name, .. } => {
            columns.insert(name.clone());
        }
        Expression::Comparison { left, right, .. }
        | Expression::Logical { left, right, .. }
        | Expression::Arithmetic { left, right, .. }
        | Expression::Concat { left, right } => {
            collect_columns(left, columns);
            collect_columns(right, columns);
        }
        Expression::Not(inner) => collect_columns(inner, columns),
        Expression::StringMethod { object, .. } => collect_columns(object, columns),
        Expression::BooleanMethod {
            object, arguments, ..
        } => {
            collect_columns(object, columns);
            for arg in arguments {
                collect_columns(arg, columns);
            }
        }
        Expression::Aggregate { expression, .. } => {
            if let Some(inner) = expression {
                collect_columns(inner, columns);
            }
        }
        Expression::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            collect_columns(condition, columns);
            collect_columns(then_branch, columns);
            collect_columns(else_branch, columns);
        }
        Expression::Coalesce { expressions } | Expression::Array { elements: expressions } => {
            for e in expressions {
                collect_columns(e, columns);
            }
        }
        Expression::In { value, list, .. } => {
            collect_columns(value, columns);
            if let crate::expr::InList::Literal(items) = list {
                for item in items {
                    collect_columns(item, columns);
                }
            }
        }
        Expression::Object { properties } => {
            for (_, e) in properties {
                collect_columns(e, columns);
            }
        }
        Expression::Constant { .. } | Expression::Param { .. } => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn walk(
    op: &Operation,
    ops: &mut Vec<String>,
    columns: &mut HashSet<String>,
    has_aggregation: &mut bool,
    has_grouping: &mut bool,
    has_joins: &mut bool,
    score: &mut u8,
) {
    match op {
        Operation::From { .. } => {
            ops.push("from".to_string());
            *score += 1;
        }
        Operation::Where { source, predicate } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push("where".to_string());
            collect_columns(predicate, columns);
            *score += 2;
        }
        Operation::Select { source, selector } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push("select".to_string());
            collect_columns(selector, columns);
            *score += 1;
        }
        Operation::Join {
            source,
            inner,
            outer_key,
            inner_key,
            result_selector,
            ..
        } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            walk(inner, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push("join".to_string());
            *has_joins = true;
            if let Some(k) = outer_key {
                collect_columns(k, columns);
            }
            if let Some(k) = inner_key {
                collect_columns(k, columns);
            }
            collect_columns(result_selector, columns);
            *score += 3;
        }
        Operation::GroupBy { source, key_selector } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push("groupBy".to_string());
            *has_grouping = true;
            collect_columns(key_selector, columns);
            *score += 2;
        }
        Operation::OrderBy { source, key_selector, .. } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push("orderBy".to_string());
            collect_columns(key_selector, columns);
            *score += 1;
        }
        Operation::ThenBy { source, key_selector, .. } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push("thenBy".to_string());
            collect_columns(key_selector, columns);
            *score += 1;
        }
        Operation::Take { source, count } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push("take".to_string());
            collect_columns(count, columns);
            *score += 1;
        }
        Operation::Skip { source, count } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push("skip".to_string());
            collect_columns(count, columns);
            *score += 1;
        }
        Operation::Distinct { source } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push("distinct".to_string());
            *score += 1;
        }
        Operation::Reverse { source } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push("reverse".to_string());
            *score += 1;
        }
        Operation::Count { source } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push("count".to_string());
            *has_aggregation = true;
            *score += 3;
        }
        Operation::Sum { source, selector }
        | Operation::Avg { source, selector }
        | Operation::Min { source, selector }
        | Operation::Max { source, selector } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push(aggregate_label(op).to_string());
            *has_aggregation = true;
            collect_columns(selector, columns);
            *score += 3;
        }
        Operation::First { source, predicate }
        | Operation::FirstOrDefault { source, predicate }
        | Operation::Single { source, predicate }
        | Operation::SingleOrDefault { source, predicate }
        | Operation::Last { source, predicate }
        | Operation::LastOrDefault { source, predicate }
        | Operation::Any { source, predicate } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push(terminal_label(op).to_string());
            if let Some(p) = predicate {
                collect_columns(p, columns);
                *score += 2;
            } else {
                *score += 1;
            }
        }
        Operation::All { source, predicate } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push("all".to_string());
            collect_columns(predicate, columns);
            *score += 2;
        }
        Operation::ToArray { source } => {
            walk(source, ops, columns, has_aggregation, has_grouping, has_joins, score);
            ops.push("toArray".to_string());
        }
        Operation::Insert { values, .. } => {
            ops.push("insert".to_string());
            for (_, expr) in values {
                collect_columns(expr, columns);
            }
            *score += 2;
        }
        Operation::Update { set, where_, .. } => {
            ops.push("update".to_string());
            for (_, expr) in set {
                collect_columns(expr, columns);
            }
            if let Some(w) = where_ {
                collect_columns(w, columns);
            }
            *score += 2;
        }
        Operation::Delete { where_, .. } => {
            ops.push("deleteFrom".to_string());
            if let Some(w) = where_ {
                collect_columns(w, columns);
            }
            *score += 2;
        }
    }
}

fn aggregate_label(op: &Operation) -> &'static str {
    match op {
        Operation::Sum { .. } => "sum",
        Operation::Avg { .. } => "avg",
        Operation::Min { .. } => "min",
        Operation::Max { .. } => "max",
        _ => unreachable!(),
    }
}

fn terminal_label(op: &Operation) -> &'static str {
    match op {
        Operation::First { .. } => "first",
        Operation::FirstOrDefault { .. } => "firstOrDefault",
        Operation::Single { .. } => "single",
        Operation::SingleOrDefault { .. } => "singleOrDefault",
        Operation::Last { .. } => "last",
        Operation::LastOrDefault { .. } => "lastOrDefault",
        Operation::Any { .. } => "any",
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_ctx() -> QueryContext {
        QueryContext::new().with_table("users", vec!["id".into(), "age".into(), "name".into()])
    }

    #[test]
    fn valid_chain_reports_summary() {
        let validator = ChainValidator::new();
        let ctx = users_ctx();
        let params = QueryParams::new();

        let result = validator
            .validate(
                "(ctx, p) => ctx.from(\"users\").where(u => u.age > 18).select(u => ({ name: u.name }))",
                &ctx,
                &params,
            )
            .unwrap();

        match result {
            ValidateResult::Valid { summary } => {
                assert_eq!(summary.operations, vec!["from", "where", "select"]);
                assert!(summary.columns.contains(&"age".to_string()));
                assert!(summary.columns.contains(&"name".to_string()));
                assert!(!summary.has_joins);
                assert!(!summary.has_grouping);
            }
            ValidateResult::Invalid { error, .. } => panic!("expected valid, got {error:?}"),
        }
    }

    #[test]
    fn empty_input_is_invalid() {
        let validator = ChainValidator::new();
        let result = validator
            .validate("   ", &users_ctx(), &QueryParams::new())
            .unwrap();
        assert!(matches!(result, ValidateResult::Invalid { .. }));
    }

    #[test]
    fn unparseable_chain_is_invalid_with_parse_error_type() {
        let validator = ChainValidator::new();
        let result = validator
            .validate("(ctx, p) => ctx.from(", &users_ctx(), &QueryParams::new())
            .unwrap();

        match result {
            ValidateResult::Invalid { error, .. } => {
                assert_eq!(error.error_type, "parse");
            }
            ValidateResult::Valid { .. } => panic!("expected invalid"),
        }
    }

    #[test]
    fn aggregation_without_grouping_is_flagged_as_semantic() {
        let validator = ChainValidator::new();
        let ctx = users_ctx();
        let result = validator
            .validate(
                "(ctx, p) => ctx.from(\"users\").where(u => u.age > 18).select(u => ({ age: u.age })).sum(u => u.age)",
                &ctx,
                &QueryParams::new(),
            )
            .unwrap();

        match result {
            ValidateResult::Invalid { error, .. } => {
                assert_eq!(error.error_type, "semantic");
            }
            ValidateResult::Valid { .. } => panic!("expected semantic flag"),
        }
    }
}
