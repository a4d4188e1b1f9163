//! Benchmarks for functional dependency discovery against column count.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::time::Duration;
use tabnorm_core::dependency::{DiscoveryOptions, discover};
use tabnorm_core::{RawTable, Value};

/// Builds a table where column `i` cycles with period `i + 2`, so that
/// many partial dependencies exist without any single-column key.
fn create_cyclic_table(columns: usize, rows: usize) -> RawTable {
    let names: Vec<String> = (0..columns).map(|i| format!("c{}", i)).collect();
    let data = (0..rows)
        .map(|row| {
            (0..columns)
                .map(|column| Value::Integer((row % (column + 2)) as i64))
                .collect()
        })
        .collect();
    RawTable::new("bench", names, data).unwrap()
}

fn bench_column_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("discovery_by_column_count");
    group.measurement_time(Duration::from_secs(5));

    for columns in [4, 6, 8, 10] {
        let table = create_cyclic_table(columns, 500);
        group.bench_with_input(BenchmarkId::from_parameter(columns), &table, |b, table| {
            b.iter(|| discover(std::hint::black_box(table), &DiscoveryOptions::default()));
        });
    }

    group.finish();
}

fn bench_determinant_ceiling(c: &mut Criterion) {
    let mut group = c.benchmark_group("discovery_by_ceiling");
    let table = create_cyclic_table(8, 500);

    for ceiling in 1..=4 {
        let options = DiscoveryOptions {
            max_determinant_size: ceiling,
            sample_size: None,
        };
        group.bench_with_input(BenchmarkId::from_parameter(ceiling), &options, |b, options| {
            b.iter(|| discover(std::hint::black_box(&table), options));
        });
    }

    group.finish();
}

fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("discovery_sampling");
    let table = create_cyclic_table(6, 5000);

    for sample in [None, Some(500), Some(100)] {
        let label = sample.map_or_else(|| "full".to_string(), |rows| rows.to_string());
        let options = DiscoveryOptions {
            max_determinant_size: 3,
            sample_size: sample,
        };
        group.bench_with_input(BenchmarkId::from_parameter(label), &options, |b, options| {
            b.iter(|| discover(std::hint::black_box(&table), options));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_column_count,
    bench_determinant_ceiling,
    bench_sampling
);
criterion_main!(benches);
