//! # Portfolio Evaluation
//!
//! $$
//! V_t = s_0 \sum_i w_i \frac{P_{t,i}}{P_{1,i}},\qquad
//! \text{Sharpe} = \sqrt{k}\,\frac{\bar r - r_f/k}{\hat\sigma}
//! $$
//!
//! Maps a candidate allocation onto the portfolio's daily value series and
//! its summary statistics. The optimizer consumes the Sharpe ratio as its
//! objective; everything here is pure and deterministic.

use ndarray::Array1;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::series::PortfolioValueSeries;
use crate::series::PriceSeries;

/// Trading periods per year used for annualization.
pub const DEFAULT_PERIODS_PER_YEAR: u32 = 252;

/// Summary statistics of a portfolio value series.
///
/// Volatility is the sample standard deviation (ddof = 1) of single-period
/// returns, matching common financial tooling.
#[derive(Clone, Copy, Debug, Default)]
pub struct PortfolioStats {
  /// Total return over the observed window.
  pub cumulative_return: f64,
  /// Mean single-period return.
  pub mean_daily_return: f64,
  /// Sample standard deviation of single-period returns.
  pub daily_volatility: f64,
  /// Annualized mean excess return divided by volatility.
  pub sharpe: f64,
}

/// Daily portfolio value implied by `allocation` over `prices`.
///
/// Each instrument is normalized by its first close, scaled by
/// `start_value * w_i` and summed per date, so the first value equals
/// `start_value` whenever the allocation sums to one. The allocation is NOT
/// required to sum to one here; normalization policy belongs to callers.
pub fn portfolio_value(
  prices: &PriceSeries,
  allocation: &[f64],
  start_value: f64,
) -> Result<PortfolioValueSeries> {
  let n = prices.n_instruments();
  if allocation.len() != n {
    return Err(PortfolioError::DimensionMismatch {
      expected: n,
      actual: allocation.len(),
    });
  }
  if prices.n_dates() == 0 {
    return Err(PortfolioError::InsufficientData {
      required: 1,
      available: 0,
    });
  }

  let closes = prices.closes();
  let first = closes.row(0);
  for (idx, &p0) in first.iter().enumerate() {
    if p0 == 0.0 || !p0.is_finite() {
      return Err(PortfolioError::invalid_price_data(format!(
        "first close for {} is {}",
        prices.symbols()[idx],
        p0
      )));
    }
  }

  let mut values = Array1::zeros(prices.n_dates());
  for (t, row) in closes.rows().into_iter().enumerate() {
    let mut acc = 0.0;
    for i in 0..n {
      acc += start_value * allocation[i] * row[i] / first[i];
    }
    values[t] = acc;
  }

  PortfolioValueSeries::new(prices.dates().to_vec(), values)
}

/// Summary statistics of a value series.
///
/// `risk_free_rate` is annualized and de-annualized by `periods_per_year`
/// inside the Sharpe numerator. A flat series (or one with a single return,
/// where ddof = 1 has no denominator) fails with
/// [`PortfolioError::DegenerateVolatility`].
pub fn portfolio_stats(
  values: &PortfolioValueSeries,
  risk_free_rate: f64,
  periods_per_year: u32,
) -> Result<PortfolioStats> {
  let v = values.values();
  if v.len() < 2 {
    return Err(PortfolioError::InsufficientData {
      required: 2,
      available: v.len(),
    });
  }

  let returns = daily_returns(v);
  let cumulative_return = v[v.len() - 1] / v[0] - 1.0;
  let mean_daily_return = sample_mean(&returns);
  let daily_volatility = sample_stdev(&returns, mean_daily_return);

  if daily_volatility <= 0.0 || !daily_volatility.is_finite() {
    return Err(PortfolioError::DegenerateVolatility);
  }

  let k = periods_per_year as f64;
  let sharpe = k.sqrt() * (mean_daily_return - risk_free_rate / k) / daily_volatility;

  Ok(PortfolioStats {
    cumulative_return,
    mean_daily_return,
    daily_volatility,
    sharpe,
  })
}

fn daily_returns(values: &Array1<f64>) -> Vec<f64> {
  let mut out = Vec::with_capacity(values.len().saturating_sub(1));
  for t in 1..values.len() {
    out.push(values[t] / values[t - 1] - 1.0);
  }
  out
}

fn sample_mean(xs: &[f64]) -> f64 {
  if xs.is_empty() {
    0.0
  } else {
    xs.iter().sum::<f64>() / xs.len() as f64
  }
}

fn sample_stdev(xs: &[f64], mean: f64) -> f64 {
  if xs.len() < 2 {
    return 0.0;
  }

  let mut acc = 0.0;
  for &x in xs {
    let d = x - mean;
    acc += d * d;
  }
  (acc / (xs.len() - 1) as f64).sqrt()
}
