//! The top-level `compile_query` entry point (spec.md §2, §6.2): ties the
//! lexer, parser, chain recognizer/lambda converter, and SQL generator into
//! one call and produces the `{ sql, params }` result callers consume.

use std::collections::HashMap;

use crate::ast;
use crate::chain;
use crate::context::{ParamValue, QueryContext, QueryParams};
use crate::error::CompileError;
use crate::expr::{ConstantValue, FieldContext};
use crate::sql::{self, SqlDialect};

impl From<&ConstantValue> for ParamValue {
    fn from(value: &ConstantValue) -> Self {
        match value {
            ConstantValue::Number(n) => ParamValue::Number(*n),
            ConstantValue::String(s) => ParamValue::String(s.clone()),
            ConstantValue::Boolean(b) => ParamValue::Boolean(*b),
            ConstantValue::Null => ParamValue::Null,
        }
    }
}

/// The result of a successful compile (spec.md §6.2): the generated SQL
/// text, the merged parameter map (auto-extracted parameters plus the
/// caller's own, caller wins on name collision), and the field-context
/// hints an execution-wrapper adapter would use for type coercion
/// (`SPEC_FULL.md` §G).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: HashMap<String, ParamValue>,
    pub field_contexts: HashMap<String, FieldContext>,
}

/// Expands every array-valued parameter into indexed siblings
/// (`<name>_<i>`) alongside the base entry, per spec.md §6.2. Dialects that
/// need per-element placeholders (SQLite's `IN`-list expansion) read these
/// back out during SQL emission; dialects that don't (PostgreSQL's
/// `= ANY(...)`) simply ignore the extras.
fn expand_array_siblings(params: &mut HashMap<String, ParamValue>) {
    let arrays: Vec<(String, Vec<ParamValue>)> = params
        .iter()
        .filter_map(|(name, value)| match value {
            ParamValue::Array(items) => Some((name.clone(), items.clone())),
            _ => None,
        })
        .collect();

    for (name, items) in arrays {
        for (i, item) in items.into_iter().enumerate() {
            params.entry(format!("{}_{}", name, i)).or_insert(item);
        }
    }
}

/// Compiles a query-chain source string into a dialect-specific SQL
/// statement (spec.md §2): the single entry point tying together the
/// Source Extractor, Syntactic Parser, Chain Recognizer, Lambda Converter,
/// and SQL Generator pipeline stages.
pub fn compile_query(
    source: &str,
    context: &QueryContext,
    params: &QueryParams,
    dialect: &dyn SqlDialect,
) -> Result<CompiledQuery, CompileError> {
    if source.trim().is_empty() {
        return Err(CompileError::SourceUnavailable(
            "query source text is empty".to_string(),
        ));
    }

    let js = ast::parse(source)?;
    let (operation, mut state) = chain::recognize(&js, context, params)?;
    let sql = sql::generate(&operation, dialect, params, &mut state)?;

    let mut merged_params: HashMap<String, ParamValue> = HashMap::new();
    let mut field_contexts = HashMap::new();
    for auto_param in &state.auto_params {
        merged_params.insert(auto_param.name.clone(), (&auto_param.value).into());
        if let Some(ctx) = &auto_param.field_context {
            field_contexts.insert(auto_param.name.clone(), ctx.clone());
        }
    }
    for (name, value) in params {
        merged_params.insert(name.clone(), value.clone());
    }
    expand_array_siblings(&mut merged_params);

    Ok(CompiledQuery {
        sql,
        params: merged_params,
        field_contexts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::PostgreSqlDialect;

    fn users_ctx() -> QueryContext {
        QueryContext::new().with_table("users", vec!["id".into(), "age".into(), "name".into()])
    }

    #[test]
    fn compiles_predicate_with_auto_and_user_params() {
        let ctx = users_ctx();
        let mut params = QueryParams::new();
        params.insert("minAge".into(), ParamValue::Number(18.0));

        let result = compile_query(
            "(ctx, p) => ctx.from(\"users\").where(u => u.age > p.minAge && u.name == \"Ann\")",
            &ctx,
            &params,
            &PostgreSqlDialect,
        )
        .unwrap();

        assert_eq!(
            result.sql,
            "SELECT * FROM \"users\" WHERE (\"age\" > $(minAge) AND \"name\" = $(__p1))"
        );
        assert_eq!(result.params.get("minAge"), Some(&ParamValue::Number(18.0)));
        assert_eq!(
            result.params.get("__p1"),
            Some(&ParamValue::String("Ann".into()))
        );
    }

    #[test]
    fn empty_source_is_source_unavailable() {
        let ctx = users_ctx();
        let params = QueryParams::new();
        let err = compile_query("   ", &ctx, &params, &PostgreSqlDialect).unwrap_err();
        assert!(matches!(err, CompileError::SourceUnavailable(_)));
    }

    #[test]
    fn array_param_gets_indexed_siblings() {
        let ctx = users_ctx();
        let mut params = QueryParams::new();
        params.insert(
            "ids".into(),
            ParamValue::Array(vec![ParamValue::Number(1.0), ParamValue::Number(2.0)]),
        );

        let result = compile_query(
            "(ctx, p) => ctx.from(\"users\").where(u => p.ids.includes(u.id))",
            &ctx,
            &params,
            &crate::sql::SqliteDialect,
        )
        .unwrap();

        assert_eq!(result.params.get("ids_0"), Some(&ParamValue::Number(1.0)));
        assert_eq!(result.params.get("ids_1"), Some(&ParamValue::Number(2.0)));
        assert!(result.sql.contains("@ids_0"));
        assert!(result.sql.contains("@ids_1"));
    }
}
