//! Benchmark runner that outputs a markdown table of merge timings.
//!
//! Run with: `cargo run --package ohlcvault-bench --bin benchmark_table --release`

use ohlcvault_bench::{
    AppendResult, BenchmarkConfig, format_bytes, format_duration, run_append, seed_partition,
};
use ohlcvault_format::Codec;
use std::io::Write;
use std::time::Duration;

/// Number of iterations per benchmark for statistical significance.
const ITERATIONS: usize = 3;

fn main() {
    println!("ohlcvault Append Benchmark");
    println!("==========================\n");

    let configs = [
        (
            "1 pair, 1 month",
            BenchmarkConfig {
                pairs: 1,
                ..BenchmarkConfig::default()
            },
        ),
        ("6 pairs, 1 month", BenchmarkConfig::default()),
        (
            "6 pairs, 1 month, zstd",
            BenchmarkConfig {
                codec: Codec::Zstd,
                ..BenchmarkConfig::default()
            },
        ),
        (
            "6 pairs, 1 month, 10k groups",
            BenchmarkConfig {
                row_group_size: 10_000,
                ..BenchmarkConfig::default()
            },
        ),
    ];

    println!("Running benchmarks ({ITERATIONS} iterations each)...\n");

    let mut results: Vec<(&str, BenchmarkConfig, Vec<AppendResult>)> = Vec::new();
    for (name, config) in configs {
        print!("Benchmarking {name}... ");
        let _ = std::io::stdout().flush();

        let mut runs = Vec::new();
        for i in 0..ITERATIONS {
            let run = tempfile::TempDir::new()
                .map_err(|e| e.to_string())
                .and_then(|dir| {
                    seed_partition(dir.path(), &config).map_err(|e| e.to_string())?;
                    run_append(dir.path(), &config).map_err(|e| e.to_string())
                });
            match run {
                Ok(result) => runs.push(result),
                Err(e) => eprintln!("\n  iteration {} failed: {e}", i + 1),
            }
            print!("{} ", i + 1);
            let _ = std::io::stdout().flush();
        }

        results.push((name, config, runs));
        println!("done");
    }

    println!("\n## Results\n");
    println!("| Partition | Existing Rows | Merge Time | Throughput | Size |");
    println!("|-----------|---------------|------------|------------|------|");

    for (name, config, runs) in &results {
        let Some(avg) = average_results(runs) else {
            println!("| {name} | {} | failed | - | - |", config.existing_rows());
            continue;
        };
        println!(
            "| {} | {:.0}k | {} | {:.1}M rows/s | {} |",
            name,
            config.existing_rows() as f64 / 1000.0,
            format_duration(avg.duration),
            avg.rows_per_sec(config) / 1_000_000.0,
            format_bytes(avg.partition_size)
        );
    }
}

/// Averages durations over successful runs.
fn average_results(runs: &[AppendResult]) -> Option<AppendResult> {
    let first = runs.first()?;
    let total: Duration = runs.iter().map(|r| r.duration).sum();
    Some(AppendResult {
        duration: total / runs.len() as u32,
        ..first.clone()
    })
}
