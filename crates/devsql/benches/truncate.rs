//! Benchmark SQL truncation and keyword formatting on representative statements.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use devsql::{KeywordFormatter, SqlFormatter, truncate_in_lists, truncate_sql};

fn in_list_sql(items: usize) -> String {
    let ids: Vec<String> = (1..=items).map(|i| i.to_string()).collect();
    format!(
        "SELECT id, email, created_at FROM users WHERE id IN ({})",
        ids.join(", ")
    )
}

fn bench_in_lists(c: &mut Criterion) {
    let mut group = c.benchmark_group("truncate/in_lists");

    for items in [3, 50, 1000] {
        let sql = in_list_sql(items);
        group.bench_with_input(BenchmarkId::from_parameter(items), &sql, |b, sql| {
            b.iter(|| black_box(truncate_in_lists(black_box(sql))));
        });
    }

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("truncate/pipeline");
    let formatter = KeywordFormatter::new();

    let cases = [
        ("plain", "select id from users where id = 1".to_string()),
        ("in_list", in_list_sql(200)),
        (
            "subquery",
            "select a, b, c from t where x in (select y, z from u where w in (1, 2, 3, 4, 5))"
                .to_string(),
        ),
    ];

    for (name, sql) in &cases {
        group.bench_with_input(BenchmarkId::new("truncate", name), sql, |b, sql| {
            b.iter(|| black_box(truncate_sql(black_box(sql), false)));
        });
        group.bench_with_input(BenchmarkId::new("truncate_format", name), sql, |b, sql| {
            b.iter(|| {
                let short = truncate_sql(black_box(sql), false);
                black_box(formatter.format(&short))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_in_lists, bench_full_pipeline);
criterion_main!(benches);
