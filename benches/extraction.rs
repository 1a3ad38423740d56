//! Log extraction and ranking benchmarks
//!
//! Toyota Way: Genchi Genbutsu (measure, don't guess)
//!
//! Run with: cargo bench --bench extraction

use std::fmt::Write as _;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nanosweep::extract::extract_metrics;
use nanosweep::topk::top_k_values;

/// Synthetic nanoGPT log with `iters` iteration lines and an eval every 10
fn synthetic_log(iters: u64) -> String {
    let mut log = String::from("number of parameters: 0.80M\n");
    for i in 0..iters {
        if i % 10 == 0 {
            let _ = writeln!(log, "step {i}: train loss 2.5000, val loss 2.6000");
        }
        let _ = writeln!(log, "iter {i}: loss 2.4000, time 40.12ms, mfu 0.01%");
    }
    log.push_str("Duration: 12.34 seconds\n");
    log
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_metrics");

    for iters in [100u64, 5_000] {
        let log = synthetic_log(iters);
        group.bench_with_input(BenchmarkId::new("lines", iters), &log, |b, log| {
            b.iter(|| extract_metrics(black_box(log)));
        });
    }

    group.finish();
}

fn bench_topk(c: &mut Criterion) {
    let mut group = c.benchmark_group("top_k_val_loss");

    for rows in [128usize, 100_000] {
        #[allow(clippy::cast_precision_loss)]
        let losses: Vec<Option<f64>> = (0..rows)
            .map(|i| (i % 7 != 0).then(|| ((i * 7919) % 1000) as f64 / 100.0))
            .collect();
        group.bench_with_input(BenchmarkId::new("k10", rows), &losses, |b, losses| {
            b.iter(|| top_k_values(black_box(losses), 10));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extract, bench_topk);
criterion_main!(benches);
