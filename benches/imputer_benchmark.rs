//! Benchmark for class-conditional imputation and correlation on SECOM-shaped tables
//!
//! Run with: cargo bench --bench imputer_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polars::prelude::*;
use rand::prelude::*;
use rand::SeedableRng;

use waferflow::pipeline::{correlation_matrix, leading_feature_columns, ClassConditionalImputer};

/// Labels in {-1, 1} plus `n_features` measurement columns with roughly
/// `missing_rate` of cells absent
fn generate_observation_table(n_rows: usize, n_features: usize, missing_rate: f64, seed: u64) -> DataFrame {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut columns: Vec<Column> = Vec::with_capacity(n_features + 1);

    // About 7% failing wafers, like the reference dataset
    let labels: Vec<i32> = (0..n_rows)
        .map(|_| if rng.gen::<f64>() < 0.07 { 1 } else { -1 })
        .collect();
    columns.push(Column::new("pass".into(), labels));

    for i in 0..n_features {
        let scale = 1.0 + (i % 10) as f64 * 10.0;
        let values: Vec<Option<f64>> = (0..n_rows)
            .map(|_| {
                if rng.gen::<f64>() < missing_rate {
                    None
                } else {
                    Some(rng.gen::<f64>() * scale)
                }
            })
            .collect();
        columns.push(Column::new(format!("feature_{}", i).into(), values));
    }

    DataFrame::new(columns).expect("Failed to create DataFrame")
}

/// Imputation cost as the number of measurement columns grows
fn benchmark_imputation_by_columns(c: &mut Criterion) {
    let mut group = c.benchmark_group("imputation_by_columns");
    group.sample_size(20);

    let n_rows = 1_567;
    let imputer = ClassConditionalImputer::new("pass");

    for n_cols in [50, 150, 300, 590] {
        let df = generate_observation_table(n_rows, n_cols, 0.05, 42);
        group.throughput(Throughput::Elements((n_rows * n_cols) as u64));

        group.bench_with_input(BenchmarkId::new("impute", n_cols), &df, |b, df| {
            b.iter(|| {
                let mut rng = rand::rngs::StdRng::seed_from_u64(7);
                let _ = imputer.impute(black_box(df), &mut rng);
            });
        });
    }

    group.finish();
}

/// Imputation cost as the share of missing cells grows
fn benchmark_imputation_by_missing_rate(c: &mut Criterion) {
    let mut group = c.benchmark_group("imputation_by_missing_rate");
    group.sample_size(20);

    let imputer = ClassConditionalImputer::new("pass");

    for rate in [0.01, 0.05, 0.2, 0.5] {
        let df = generate_observation_table(1_567, 200, rate, 42);

        group.bench_with_input(
            BenchmarkId::new("impute", format!("{:.0}%", rate * 100.0)),
            &df,
            |b, df| {
                b.iter(|| {
                    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
                    let _ = imputer.impute(black_box(df), &mut rng);
                });
            },
        );
    }

    group.finish();
}

/// Pairwise-complete correlation over the leading features
fn benchmark_summary_correlation(c: &mut Criterion) {
    let mut group = c.benchmark_group("summary_correlation");
    group.sample_size(30);

    let df = generate_observation_table(1_567, 590, 0.05, 42);
    for n_features in [4, 20, 60] {
        let columns = leading_feature_columns(&df, n_features);
        group.bench_with_input(BenchmarkId::new("pearson", n_features), &columns, |b, columns| {
            b.iter(|| {
                let _ = correlation_matrix(black_box(&df), black_box(columns));
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_imputation_by_columns,
    benchmark_imputation_by_missing_rate,
    benchmark_summary_correlation
);
criterion_main!(benches);
