use std::hint::black_box;

use chrono::NaiveDate;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use ndarray::Array2;
use sharpe_rs::optimize;
use sharpe_rs::OptimizerConfig;
use sharpe_rs::PriceSeries;

/// Deterministic pseudo-random walk so runs are comparable across machines.
fn synthetic_prices(n_days: usize, n_assets: usize) -> PriceSeries {
  let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
  let dates = (0..n_days)
    .map(|i| start + chrono::Duration::days(i as i64))
    .collect();

  let mut state = 0x2545_f491_4f6c_dd1d_u64;
  let mut closes = Array2::zeros((n_days, n_assets));
  for j in 0..n_assets {
    let mut px = 100.0 + 10.0 * j as f64;
    for i in 0..n_days {
      state = state
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
      let u = (state >> 11) as f64 / (1u64 << 53) as f64;
      px *= 1.0 + (u - 0.5) * 0.02;
      closes[[i, j]] = px;
    }
  }

  let symbols = (0..n_assets).map(|j| format!("SYM{j}")).collect();
  PriceSeries::new(dates, symbols, closes).unwrap()
}

fn bench_optimize(c: &mut Criterion) {
  let config = OptimizerConfig::default();
  let mut group = c.benchmark_group("optimize");

  for n_assets in [2, 4, 8] {
    let prices = synthetic_prices(252, n_assets);
    group.bench_with_input(
      BenchmarkId::from_parameter(n_assets),
      &prices,
      |b, prices| b.iter(|| optimize(black_box(prices), &config).unwrap()),
    );
  }

  group.finish();
}

criterion_group!(benches, bench_optimize);
criterion_main!(benches);
