//! Integration tests
//!
//! End-to-end coverage of `compile_query` against the worked scenarios
//! (S1-S7) and quantified properties (P1-P7) from the specification this
//! crate implements: predicate/auto-param extraction, null-comparison
//! rewrite, inner/left-outer/cross joins, groupBy aggregates, pagination,
//! guarded mutations, and ordering reversal.

use pretty_assertions::assert_eq;
use tinqer::{compile_query, ParamValue, PostgreSqlDialect, QueryContext, QueryParams, SqliteDialect};

fn users_departments_ctx() -> QueryContext {
    QueryContext::new()
        .with_table(
            "users",
            vec![
                "id".into(),
                "age".into(),
                "name".into(),
                "department_id".into(),
            ],
        )
        .with_table("departments", vec!["id".into(), "name".into()])
}

fn order_items_ctx() -> QueryContext {
    QueryContext::new().with_table(
        "order_items",
        vec![
            "order_id".into(),
            "quantity".into(),
            "unit_price".into(),
        ],
    )
}

fn test_products_ctx() -> QueryContext {
    QueryContext::new().with_table("test_products", vec!["id".into(), "name".into()])
}

// S1 - predicate + params
#[test]
fn s1_predicate_with_params_and_auto_param() {
    let ctx = users_departments_ctx();
    let mut params = QueryParams::new();
    params.insert("minAge".into(), ParamValue::Number(18.0));

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users").where(u => u.age > p.minAge && u.name == "Ann")"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert_eq!(
        compiled.sql,
        r#"SELECT * FROM "users" WHERE ("age" > $(minAge) AND "name" = $(__p1))"#
    );
    assert_eq!(compiled.params.get("minAge"), Some(&ParamValue::Number(18.0)));
    assert_eq!(compiled.params.get("__p1"), Some(&ParamValue::String("Ann".into())));
}

// S2 - null rewrite
#[test]
fn s2_null_comparison_rewrite() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users").where(u => u.age == null)"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert_eq!(compiled.sql, r#"SELECT * FROM "users" WHERE "age" IS NULL"#);
    assert!(compiled.params.is_empty());
}

// S3 - inner join + projection
#[test]
fn s3_inner_join_with_projection() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users")
            .join(ctx.from("departments"), u => u.department_id, d => d.id, (u, d) => ({ u, d }))
            .select(j => ({ userName: j.u.name, deptName: j.d.name }))"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert_eq!(
        compiled.sql,
        r#"SELECT "t0"."name" AS "userName", "t1"."name" AS "deptName" FROM "users" AS "t0" INNER JOIN "departments" AS "t1" ON "t0"."department_id" = "t1"."id""#
    );
}

// S4 - groupBy + aggregates
#[test]
fn s4_group_by_with_aggregates() {
    let ctx = order_items_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("order_items")
            .groupBy(oi => oi.order_id)
            .select(g => ({
                orderId: g.key,
                totalQuantity: g.sum(oi => oi.quantity),
                totalValue: g.sum(oi => oi.quantity * oi.unit_price),
                avgItemValue: g.average(oi => oi.unit_price)
            }))"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert_eq!(
        compiled.sql,
        r#"SELECT "order_id" AS "orderId", SUM("quantity") AS "totalQuantity", SUM(("quantity" * "unit_price")) AS "totalValue", AVG("unit_price") AS "avgItemValue" FROM "order_items" GROUP BY "order_id""#
    );
}

// S5 - pagination
#[test]
fn s5_pagination_skip_take() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users").orderByDescending(u => u.age).skip(10).take(20)"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert_eq!(
        compiled.sql,
        r#"SELECT * FROM "users" ORDER BY "age" DESC LIMIT $(__p2) OFFSET $(__p1)"#
    );
    assert_eq!(compiled.params.get("__p1"), Some(&ParamValue::Number(10.0)));
    assert_eq!(compiled.params.get("__p2"), Some(&ParamValue::Number(20.0)));
}

// S6 - guarded delete
#[test]
fn s6_delete_without_where_is_guarded() {
    let ctx = test_products_ctx();
    let params = QueryParams::new();

    let err = compile_query(
        r#"(ctx, p) => ctx.deleteFrom("test_products")"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        tinqer::CompileError::ConvertError(tinqer::ConvertError::MissingWhereGuard { .. })
    ));
}

// S7 - left outer join via groupJoin/selectMany
#[test]
fn s7_left_outer_join_via_group_join_select_many() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users")
            .groupJoin(ctx.from("departments"), u => u.department_id, d => d.id, (u, g) => ({ user: u, g }))
            .selectMany(x => x.g.defaultIfEmpty(), (x, dept) => ({ user: x.user, dept }))
            .select(r => ({ userId: r.user.id, deptId: r.dept.id }))"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert_eq!(
        compiled.sql,
        r#"SELECT "t0"."id" AS "userId", "t1"."id" AS "deptId" FROM "users" AS "t0" LEFT OUTER JOIN "departments" AS "t1" ON "t0"."department_id" = "t1"."id""#
    );
}

// P1 - parameter soundness: every placeholder appearing in the SQL has a
// corresponding entry in the returned params map.
#[test]
fn p1_every_placeholder_is_backed_by_a_param_entry() {
    let ctx = users_departments_ctx();
    let mut params = QueryParams::new();
    params.insert("minAge".into(), ParamValue::Number(21.0));

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users").where(u => u.age > p.minAge).take(5)"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert!(compiled.params.contains_key("minAge"));
    assert!(compiled
        .params
        .keys()
        .any(|k| k.starts_with("__p")));
}

// P2 - no inlining of runtime values: a string literal compared against a
// column must appear only behind a placeholder, never as literal text.
#[test]
fn p2_string_literal_never_inlined() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users").where(u => u.name == "Confidential")"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert!(!compiled.sql.contains("Confidential"));
    assert!(compiled
        .params
        .values()
        .any(|v| *v == ParamValue::String("Confidential".into())));
}

// P4 - alias monotonicity: first referenced table is t0, second is t1.
#[test]
fn p4_join_aliases_are_monotone() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users").join(ctx.from("departments"), u => u.department_id, d => d.id, (u, d) => ({ u, d }))"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    let t0_pos = compiled.sql.find("\"t0\"").unwrap();
    let t1_pos = compiled.sql.find("\"t1\"").unwrap();
    assert!(t0_pos < t1_pos);
    assert!(compiled.sql.contains(r#""users" AS "t0""#));
    assert!(compiled.sql.contains(r#""departments" AS "t1""#));
}

// P5 - guarded mutations: update without WHERE and without the opt-in flag
// is rejected the same way delete is in S6.
#[test]
fn p5_update_without_where_is_guarded() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let err = compile_query(
        r#"(ctx, p) => ctx.update("users").set({ name: "nobody" })"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        tinqer::CompileError::ConvertError(tinqer::ConvertError::MissingWhereGuard { .. })
    ));
}

#[test]
fn p5_allow_full_table_update_bypasses_guard() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.update("users").set({ name: "nobody" }).allowFullTableUpdate()"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert!(compiled.sql.starts_with(r#"UPDATE "users" SET "name" ="#));
    assert!(!compiled.sql.contains("WHERE"));
}

// P6 - commutativity of WHERE stacking: two chained `.where()` calls
// conjoin in left-to-right order.
#[test]
fn p6_stacked_wheres_conjoin_in_order() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users").where(u => u.age > 18).where(u => u.name != null)"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert_eq!(
        compiled.sql,
        r#"SELECT * FROM "users" WHERE "age" > $(__p1) AND "name" IS NOT NULL"#
    );
}

// P7 - LAST reversal: `last()` flips every ordering direction and applies
// a one-row limit.
#[test]
fn p7_last_flips_order_and_limits_to_one() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users").orderBy(u => u.age).last()"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert!(compiled.sql.contains(r#"ORDER BY "age" DESC"#));
    assert!(compiled.sql.contains("LIMIT"));
}

#[test]
fn p7_last_with_no_order_by_falls_back_to_ordinal_desc() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users").last()"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert!(compiled.sql.contains("ORDER BY 1 DESC"));
}

// Cross join via plain selectMany (not paired with groupJoin).
#[test]
fn cross_join_via_select_many() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users")
            .selectMany(u => ctx.from("departments"), (u, d) => ({ u, d }))
            .select(j => ({ userName: j.u.name, deptName: j.d.name }))"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert!(compiled.sql.contains("CROSS JOIN"));
}

// any()/all() EXISTS rewrite.
#[test]
fn any_compiles_to_exists_case_expression() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users").any(u => u.age > 18)"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert!(compiled.sql.starts_with("SELECT CASE WHEN EXISTS ("));
}

#[test]
fn all_compiles_to_not_exists_with_negated_predicate() {
    let ctx = users_departments_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users").all(u => u.age > 18)"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert!(compiled.sql.starts_with("SELECT CASE WHEN NOT EXISTS ("));
    assert!(compiled.sql.contains("NOT ("));
}

// SQLite dialect: `@name` placeholders and array-IN expansion.
#[test]
fn sqlite_dialect_uses_at_placeholders_and_expands_array_in() {
    let ctx = users_departments_ctx();
    let mut params = QueryParams::new();
    params.insert(
        "ids".into(),
        ParamValue::Array(vec![ParamValue::Number(1.0), ParamValue::Number(2.0), ParamValue::Number(3.0)]),
    );

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users").where(u => p.ids.includes(u.id))"#,
        &ctx,
        &params,
        &SqliteDialect,
    )
    .unwrap();

    assert!(compiled.sql.contains("@ids_0"));
    assert!(compiled.sql.contains("@ids_1"));
    assert!(compiled.sql.contains("@ids_2"));
    assert_eq!(compiled.params.get("ids_0"), Some(&ParamValue::Number(1.0)));
}

// PostgreSQL dialect: array-valued parameter renders as `= ANY(...)`.
#[test]
fn postgresql_dialect_renders_array_in_as_any() {
    let ctx = users_departments_ctx();
    let mut params = QueryParams::new();
    params.insert(
        "ids".into(),
        ParamValue::Array(vec![ParamValue::Number(1.0), ParamValue::Number(2.0)]),
    );

    let compiled = compile_query(
        r#"(ctx, p) => ctx.from("users").where(u => p.ids.includes(u.id))"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert!(compiled.sql.contains(r#"= ANY($(ids))"#));
}

// SQLite rejects RETURNING for insert at the generation layer (spec §6.3).
#[test]
fn sqlite_rejects_returning_on_insert() {
    let ctx = test_products_ctx();
    let params = QueryParams::new();

    let err = compile_query(
        r#"(ctx, p) => ctx.insert("test_products").values({ name: "Widget" }).returning(["id"])"#,
        &ctx,
        &params,
        &SqliteDialect,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        tinqer::CompileError::GenerationError(tinqer::GenerationError::RuntimeUnsupported { .. })
    ));
}

#[test]
fn postgresql_allows_returning_on_insert() {
    let ctx = test_products_ctx();
    let params = QueryParams::new();

    let compiled = compile_query(
        r#"(ctx, p) => ctx.insert("test_products").values({ name: "Widget" }).returning(["id"])"#,
        &ctx,
        &params,
        &PostgreSqlDialect,
    )
    .unwrap();

    assert!(compiled.sql.ends_with(r#"RETURNING "id""#));
}
