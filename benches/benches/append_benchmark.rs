//! Append benchmarks: merging a small batch into a large monthly partition.
//!
//! Run with: `cargo bench --package ohlcvault-bench`

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ohlcvault_bench::{BenchmarkConfig, appender, bench_month, fresh_rows, seed_partition};
use ohlcvault_format::Codec;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

/// Benchmark configurations for different partition sizes.
fn benchmark_configs() -> Vec<(&'static str, BenchmarkConfig)> {
    vec![
        (
            "1-pair-month",
            BenchmarkConfig {
                pairs: 1,
                ..BenchmarkConfig::default()
            },
        ),
        ("6-pair-month", BenchmarkConfig::default()),
        (
            "6-pair-month-zstd",
            BenchmarkConfig {
                codec: Codec::Zstd,
                ..BenchmarkConfig::default()
            },
        ),
    ]
}

fn append_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(30));

    for (name, config) in benchmark_configs() {
        // Seed once; every iteration merges into a fresh copy.
        let seed_dir = TempDir::new().unwrap();
        let seeded = seed_partition(seed_dir.path(), &config).unwrap();
        let relative = seeded.strip_prefix(seed_dir.path()).unwrap().to_path_buf();

        group.throughput(Throughput::Elements(
            (config.existing_rows() + config.new_rows) as u64,
        ));
        group.bench_with_input(BenchmarkId::new("merge", name), &config, |b, config| {
            b.iter_batched(
                || {
                    let dir = TempDir::new().unwrap();
                    let target = dir.path().join(&relative);
                    fs::create_dir_all(target.parent().unwrap()).unwrap();
                    fs::copy(&seeded, &target).unwrap();
                    (dir, fresh_rows(config))
                },
                |(dir, rows)| {
                    let stats = appender(dir.path(), config)
                        .append(bench_month(), rows)
                        .unwrap();
                    assert_eq!(stats.rows_appended, config.new_rows);
                    dir
                },
                BatchSize::PerIteration,
            );
        });

        group.bench_with_input(BenchmarkId::new("noop", name), &config, |b, config| {
            let dir = TempDir::new().unwrap();
            let target = dir.path().join(&relative);
            fs::create_dir_all(target.parent().unwrap()).unwrap();
            fs::copy(&seeded, &target).unwrap();
            let appender = appender(dir.path(), config);

            b.iter_batched(
                || ohlcvault_bench::synthetic_rows(config.pairs, 0, 60),
                |rows| appender.append(bench_month(), rows).unwrap(),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, append_benchmark);
criterion_main!(benches);
