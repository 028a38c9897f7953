//! SQL Generation Benchmark
//!
//! Schema compilation happens once per record type, but composing `find_all`
//! statements and translating them for PostgreSQL happens on every call.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use minorm::models::{Blog, User};
use minorm::{Field, FindOptions, Model, Schema, SqlDialect};

fn bench_schema_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("schema_compilation");

    for &num_fields in &[2, 8, 32] {
        group.bench_with_input(
            BenchmarkId::new("fields", num_fields),
            &num_fields,
            |b, &num_fields| {
                b.iter(|| {
                    let mut builder = Schema::builder(black_box("Wide"))
                        .field("id", Field::string().primary_key());
                    for i in 1..num_fields {
                        builder = builder.field(format!("field_{}", i), Field::integer());
                    }
                    black_box(builder.build())
                })
            },
        );
    }

    group.finish();
}

fn bench_find_composition(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_composition");

    group.bench_function("plain_select", |b| {
        b.iter(|| black_box(FindOptions::new().compose(Blog::schema(), SqlDialect::MySQL)))
    });

    group.bench_function("filtered_paginated", |b| {
        b.iter(|| {
            let options = FindOptions::new()
                .filter(black_box("`user_id`=?"), [black_box("u1")])
                .order_by("`create_at` desc")
                .limit((black_box(20), black_box(10)));
            black_box(options.compose(Blog::schema(), SqlDialect::MySQL))
        })
    });

    group.finish();
}

fn bench_dialect_translation(c: &mut Criterion) {
    let mut group = c.benchmark_group("dialect_translation");
    let update = User::schema().update_sql();

    group.bench_function("mysql_passthrough", |b| {
        b.iter(|| black_box(SqlDialect::MySQL.translate(black_box(update))))
    });

    group.bench_function("postgres_rewrite", |b| {
        b.iter(|| black_box(SqlDialect::PostgreSQL.translate(black_box(update))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_schema_compilation,
    bench_find_composition,
    bench_dialect_translation
);
criterion_main!(benches);
