//! Table parsing and formatting benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lib_dataset::{format_table, parse_table};
use lib_types::EstimationRecord;

fn observation_text(rows: usize) -> String {
    (0..rows)
        .map(|i| {
            let t = i as f64 * 0.005;
            format!("{:.6} {:.6} {:.6}\n", t, t.sin(), t.cos())
        })
        .collect()
}

fn bench_table_io(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_io");

    for rows in [1000, 10_000, 100_000].iter() {
        let text = observation_text(*rows);
        group.bench_with_input(BenchmarkId::new("parse", rows), &text, |b, t| {
            b.iter(|| parse_table(black_box(t)));
        });

        let mut table = lib_dataset::EstimationTable::new(*rows, 4);
        for i in 0..*rows {
            let t = i as f64 * 0.005;
            table
                .push(EstimationRecord::new(t, vec![t, t.sin(), t.cos(), -t]))
                .unwrap();
        }
        group.bench_with_input(BenchmarkId::new("format", rows), &table, |b, t| {
            b.iter(|| format_table(black_box(t.filled_rows())));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_table_io);
criterion_main!(benches);
