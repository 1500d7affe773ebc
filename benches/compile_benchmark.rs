//! Performance benchmarks
//!
//! Measures compile_query throughput over representative query shapes:
//! - Single-table predicates
//! - Joins and group-by aggregates
//! - Scaling with input size
//! - Dialect-specific performance
//! - Stage-by-stage (lex vs full compile) performance

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box as std_black_box;
use tinqer::{compile_query, lexer::Lexer, ParamValue, PostgreSqlDialect, QueryContext, QueryParams, SqliteDialect};

fn users_ctx() -> QueryContext {
    QueryContext::new()
        .with_table(
            "users",
            vec![
                "id".into(),
                "name".into(),
                "age".into(),
                "departmentId".into(),
            ],
        )
        .with_table("departments", vec!["id".into(), "name".into()])
}

fn params_with_min_age() -> QueryParams {
    let mut params = QueryParams::new();
    params.insert("minAge".into(), ParamValue::Number(18.0));
    params
}

/// Simple compile benchmark
fn benchmark_simple_compile(c: &mut Criterion) {
    let ctx = users_ctx();
    let params = params_with_min_age();
    let query = "(ctx, p) => ctx.from(\"users\").where(u => u.age > p.minAge).select(u => ({ name: u.name, age: u.age }))";

    c.bench_function("simple compile", |b| {
        b.iter(|| compile_query(black_box(query), &ctx, &params, &PostgreSqlDialect))
    });
}

/// Complex compile benchmark: join, group by, aggregates, ordering
fn benchmark_complex_compile(c: &mut Criterion) {
    let ctx = users_ctx();
    let params = QueryParams::new();
    let query = r#"
        (ctx, p) => ctx.from("users")
            .join(ctx.from("departments"), u => u.departmentId, d => d.id, (u, d) => ({ user: u, dept: d }))
            .where(r => r.user.age > 18)
            .groupBy(r => r.dept.name)
            .select(g => ({
                department: g.key,
                avgAge: g.avg(r => r.user.age),
                count: g.count(),
            }))
            .orderBy(r => r.avgAge)
    "#;

    c.bench_function("complex compile", |b| {
        b.iter(|| compile_query(black_box(query), &ctx, &params, &PostgreSqlDialect))
    });
}

/// Performance comparison by dialect
fn benchmark_dialects(c: &mut Criterion) {
    let ctx = users_ctx();
    let params = params_with_min_age();
    let query = "(ctx, p) => ctx.from(\"users\").where(u => u.age > p.minAge).orderBy(u => u.age).reverse()";

    let mut group = c.benchmark_group("dialect_comparison");

    group.bench_with_input(
        BenchmarkId::new("postgresql", "standard"),
        &query,
        |b, code| b.iter(|| compile_query(black_box(code), &ctx, &params, &PostgreSqlDialect)),
    );

    group.bench_with_input(
        BenchmarkId::new("sqlite", "standard"),
        &query,
        |b, code| b.iter(|| compile_query(black_box(code), &ctx, &params, &SqliteDialect)),
    );

    group.finish();
}

/// Performance measurement by stage: lexing alone vs full compile
fn benchmark_stages(c: &mut Criterion) {
    let ctx = users_ctx();
    let params = params_with_min_age();
    let query = "(ctx, p) => ctx.from(\"users\").where(u => u.age > p.minAge)";

    let mut group = c.benchmark_group("compile_stages");

    group.bench_function("lex_only", |b| {
        b.iter(|| {
            let mut lexer = Lexer::new(black_box(query.to_string()));
            let mut count = 0usize;
            while let Ok(token) = lexer.next_token() {
                if matches!(token.token, tinqer::lexer::Token::Eof) {
                    break;
                }
                count += 1;
            }
            std_black_box(count);
        })
    });

    group.bench_function("full_compile", |b| {
        b.iter(|| compile_query(black_box(query), &ctx, &params, &PostgreSqlDialect))
    });

    group.finish();
}

/// Performance measurement by input size (query-chain length)
fn benchmark_input_sizes(c: &mut Criterion) {
    let ctx = users_ctx();
    let params = params_with_min_age();

    let mut group = c.benchmark_group("input_sizes");

    let small = "(ctx, p) => ctx.from(\"users\")";
    group.bench_with_input(BenchmarkId::new("small", small.len()), &small, |b, code| {
        b.iter(|| compile_query(black_box(code), &ctx, &params, &PostgreSqlDialect))
    });

    let medium =
        "(ctx, p) => ctx.from(\"users\").where(u => u.age > p.minAge).select(u => ({ name: u.name }))";
    group.bench_with_input(BenchmarkId::new("medium", medium.len()), &medium, |b, code| {
        b.iter(|| compile_query(black_box(code), &ctx, &params, &PostgreSqlDialect))
    });

    let large = r#"
        (ctx, p) => ctx.from("users")
            .where(u => u.age > p.minAge && u.name.startsWith("A") && u.departmentId != null)
            .join(ctx.from("departments"), u => u.departmentId, d => d.id, (u, d) => ({ user: u, dept: d }))
            .where(r => r.dept.name != "temp")
            .groupBy(r => r.dept.name)
            .select(g => ({ department: g.key, avgAge: g.avg(r => r.user.age), count: g.count() }))
            .orderBy(r => r.avgAge)
            .take(10)
            .skip(5)
    "#;
    group.bench_with_input(BenchmarkId::new("large", large.len()), &large, |b, code| {
        b.iter(|| compile_query(black_box(code), &ctx, &params, &PostgreSqlDialect))
    });

    group.finish();
}

/// Throughput-based benchmarks measuring operations per second
fn benchmark_throughput(c: &mut Criterion) {
    let ctx = users_ctx();
    let params = params_with_min_age();

    let mut group = c.benchmark_group("throughput");

    let simple_queries = vec![
        "(ctx, p) => ctx.from(\"users\").select(u => u.name)",
        "(ctx, p) => ctx.from(\"users\").select(u => u.age)",
        "(ctx, p) => ctx.from(\"users\").where(u => u.age > p.minAge)",
        "(ctx, p) => ctx.from(\"users\").where(u => u.name == \"John\")",
        "(ctx, p) => ctx.from(\"users\").orderBy(u => u.age)",
        "(ctx, p) => ctx.from(\"users\").orderBy(u => u.age).reverse()",
    ];

    group.throughput(Throughput::Elements(simple_queries.len() as u64));
    group.bench_function("simple_queries_batch", |b| {
        b.iter(|| {
            for query in &simple_queries {
                let _ = std_black_box(compile_query(
                    black_box(query),
                    &ctx,
                    &params,
                    &PostgreSqlDialect,
                ));
            }
        })
    });

    group.finish();
}

/// Regression tests to catch performance degradation on baseline shapes
fn benchmark_regression_tests(c: &mut Criterion) {
    let ctx = users_ctx();
    let params = params_with_min_age();

    let mut group = c.benchmark_group("regression_tests");

    let baseline_queries = vec![
        ("select_all", "(ctx, p) => ctx.from(\"users\")"),
        (
            "simple_where",
            "(ctx, p) => ctx.from(\"users\").where(u => u.age > p.minAge)",
        ),
        (
            "simple_select",
            "(ctx, p) => ctx.from(\"users\").select(u => ({ name: u.name }))",
        ),
        (
            "simple_order_by",
            "(ctx, p) => ctx.from(\"users\").orderBy(u => u.age)",
        ),
        (
            "simple_group_by",
            "(ctx, p) => ctx.from(\"users\").groupBy(u => u.departmentId).select(g => ({ key: g.key, count: g.count() }))",
        ),
        (
            "basic_pipeline",
            "(ctx, p) => ctx.from(\"users\").where(u => u.age > p.minAge).orderBy(u => u.age).take(10)",
        ),
    ];

    for (name, query) in baseline_queries {
        group.bench_function(name, |b| {
            b.iter(|| compile_query(black_box(query), &ctx, &params, &PostgreSqlDialect))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_simple_compile,
    benchmark_complex_compile,
    benchmark_dialects,
    benchmark_stages,
    benchmark_input_sizes,
    benchmark_throughput,
    benchmark_regression_tests
);
criterion_main!(benches);
