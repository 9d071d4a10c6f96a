//! # Allocation Optimizer
//!
//! $$
//! \mathbf{w}^\* = \arg\max_{\mathbf{w}\in[l,u]^N,\ \sum_i w_i = 1}
//! \text{Sharpe}(\mathbf{w})
//! $$
//!
//! Constrained Sharpe-ratio maximization over the allocation simplex. The
//! bound and sum-to-one constraints are encoded as quadratic penalties on a
//! derivative-free Nelder-Mead search; the raw solution is clamped and
//! renormalized before the final statistics are computed.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::TerminationReason;
use argmin::core::TerminationStatus;
use argmin::solver::neldermead::NelderMead;
use rayon::prelude::*;
use tracing::debug;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::evaluator::portfolio_stats;
use crate::evaluator::portfolio_value;
use crate::evaluator::PortfolioStats;
use crate::evaluator::DEFAULT_PERIODS_PER_YEAR;
use crate::series::PriceSeries;

/// Cost assigned to candidates whose statistics cannot be computed.
const DEGENERATE_COST: f64 = 1e10;
/// Quadratic penalty weight for the sum-to-one equality constraint.
const SUM_PENALTY: f64 = 1e3;
/// Quadratic penalty weight for per-weight bound violations.
const BOUND_PENALTY: f64 = 1e3;

/// Per-weight search bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum WeightBounds {
  /// Long-only weights in `[0, 1]`.
  #[default]
  LongOnly,
  /// Legacy-compatibility bound `[0, N]` where `N` is the instrument count.
  /// Permits weights above one before renormalization.
  InstrumentCount,
  /// Explicit bounds applied to every weight.
  Custom { lower: f64, upper: f64 },
}

impl WeightBounds {
  /// Concrete `(lower, upper)` pair for an `n`-instrument universe.
  pub fn resolve(&self, n: usize) -> (f64, f64) {
    match *self {
      WeightBounds::LongOnly => (0.0, 1.0),
      WeightBounds::InstrumentCount => (0.0, n as f64),
      WeightBounds::Custom { lower, upper } => (lower, upper),
    }
  }
}

/// Runtime configuration for [`optimize`].
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
  /// Annualized risk-free rate entering the Sharpe numerator.
  pub risk_free_rate: f64,
  /// Trading periods per year used for annualization.
  pub periods_per_year: u32,
  /// Per-weight search bounds.
  pub bounds: WeightBounds,
  /// Iteration cap for the solver.
  pub max_iters: u64,
  /// Simplex standard-deviation tolerance for convergence.
  pub sd_tolerance: f64,
  /// Extra deterministic seeds concentrated on single instruments. Zero
  /// keeps the single equal-weight attempt.
  pub restarts: usize,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      risk_free_rate: 0.0,
      periods_per_year: DEFAULT_PERIODS_PER_YEAR,
      bounds: WeightBounds::default(),
      max_iters: 5000,
      sd_tolerance: 1e-8,
      restarts: 0,
    }
  }
}

/// Output of one optimization run.
#[derive(Clone, Debug)]
pub struct OptimizationResult {
  /// Optimal weights, renormalized to sum exactly to one.
  pub weights: Vec<f64>,
  /// Statistics of the renormalized optimal portfolio.
  pub stats: PortfolioStats,
  /// Whether the solver reached its tolerance before the iteration cap.
  pub converged: bool,
  /// Solver iterations spent across all seeds.
  pub iterations: u64,
  /// Objective evaluations spent across all seeds.
  pub evaluations: u64,
}

struct SharpeCost {
  prices: PriceSeries,
  risk_free_rate: f64,
  periods_per_year: u32,
  lower: f64,
  upper: f64,
}

impl CostFunction for SharpeCost {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let mut penalty = 0.0;
    let sum: f64 = x.iter().sum();
    penalty += SUM_PENALTY * (sum - 1.0).powi(2);
    for &w in x {
      if w < self.lower {
        penalty += BOUND_PENALTY * (self.lower - w).powi(2);
      }
      if w > self.upper {
        penalty += BOUND_PENALTY * (w - self.upper).powi(2);
      }
    }

    let stats = portfolio_value(&self.prices, x, 1.0)
      .and_then(|value| portfolio_stats(&value, self.risk_free_rate, self.periods_per_year));

    match stats {
      Ok(stats) => Ok(penalty - stats.sharpe),
      Err(_) => Ok(penalty + DEGENERATE_COST),
    }
  }
}

struct SeedOutcome {
  raw: Vec<f64>,
  converged: bool,
  iterations: u64,
  evaluations: u64,
}

/// Sharpe-maximizing allocation for `prices` under `config`.
///
/// Deterministic: identical inputs produce identical results. Hitting the
/// iteration cap is reported as `converged = false` with the best-found
/// iterate; [`PortfolioError::DidNotConverge`] is reserved for the solver
/// erroring out or producing no iterate at all.
pub fn optimize(prices: &PriceSeries, config: &OptimizerConfig) -> Result<OptimizationResult> {
  let n = prices.n_instruments();
  if n == 0 {
    return Err(PortfolioError::EmptyPortfolio);
  }

  let (lower, upper) = config.bounds.resolve(n);

  if n == 1 {
    // The unique feasible allocation; nothing to search.
    let weights = vec![1.0];
    let value = portfolio_value(prices, &weights, 1.0)?;
    let stats = portfolio_stats(&value, config.risk_free_rate, config.periods_per_year)?;
    return Ok(OptimizationResult {
      weights,
      stats,
      converged: true,
      iterations: 0,
      evaluations: 1,
    });
  }

  let seeds = seed_points(n, config.restarts);
  let outcomes: Vec<Result<SeedOutcome>> = if seeds.len() > 1 {
    seeds
      .into_par_iter()
      .map(|seed| run_seed(prices, config, lower, upper, seed))
      .collect()
  } else {
    seeds
      .into_iter()
      .map(|seed| run_seed(prices, config, lower, upper, seed))
      .collect()
  };

  let mut iterations = 0;
  let mut evaluations = 0;
  let mut best: Option<OptimizationResult> = None;
  let mut last_error = None;

  for (idx, outcome) in outcomes.into_iter().enumerate() {
    let outcome = match outcome {
      Ok(outcome) => outcome,
      Err(err) => {
        debug!(seed = idx, error = %err, "seed failed");
        last_error = Some(err);
        continue;
      }
    };

    iterations += outcome.iterations;
    evaluations += outcome.evaluations;

    let weights = match normalize_weights(&outcome.raw, lower, upper) {
      Ok(weights) => weights,
      Err(err) => {
        debug!(seed = idx, error = %err, "seed produced unusable weights");
        last_error = Some(err);
        continue;
      }
    };
    let stats = match portfolio_value(prices, &weights, 1.0)
      .and_then(|value| portfolio_stats(&value, config.risk_free_rate, config.periods_per_year))
    {
      Ok(stats) => stats,
      Err(err) => {
        debug!(seed = idx, error = %err, "seed evaluates to degenerate portfolio");
        last_error = Some(err);
        continue;
      }
    };

    debug!(
      seed = idx,
      sharpe = stats.sharpe,
      converged = outcome.converged,
      iterations = outcome.iterations,
      "seed finished"
    );

    let better = best
      .as_ref()
      .map(|current| stats.sharpe > current.stats.sharpe)
      .unwrap_or(true);
    if better {
      best = Some(OptimizationResult {
        weights,
        stats,
        converged: outcome.converged,
        iterations: 0,
        evaluations: 0,
      });
    }
  }

  match best {
    Some(mut result) => {
      result.iterations = iterations;
      result.evaluations = evaluations;
      Ok(result)
    }
    None => Err(last_error.unwrap_or(PortfolioError::DidNotConverge {
      message: "no seed produced a usable allocation".to_string(),
    })),
  }
}

fn run_seed(
  prices: &PriceSeries,
  config: &OptimizerConfig,
  lower: f64,
  upper: f64,
  seed: Vec<f64>,
) -> Result<SeedOutcome> {
  let n = seed.len();
  let cost = SharpeCost {
    prices: prices.clone(),
    risk_free_rate: config.risk_free_rate,
    periods_per_year: config.periods_per_year,
    lower,
    upper,
  };

  let mut simplex = Vec::with_capacity(n + 1);
  simplex.push(seed.clone());
  for i in 0..n {
    let mut point = seed.clone();
    point[i] += 0.5;
    simplex.push(point);
  }

  let solver = NelderMead::new(simplex)
    .with_sd_tolerance(config.sd_tolerance)
    .map_err(|err| PortfolioError::DidNotConverge {
      message: err.to_string(),
    })?;

  let res = Executor::new(cost, solver)
    .configure(|state| state.max_iters(config.max_iters))
    .run()
    .map_err(|err| PortfolioError::DidNotConverge {
      message: err.to_string(),
    })?;

  let evaluations = res.problem.counts.get("cost_count").copied().unwrap_or(0);
  let converged = matches!(
    res.state.termination_status,
    TerminationStatus::Terminated(TerminationReason::SolverConverged)
  );
  let iterations = res.state.iter;
  let raw = res
    .state
    .best_param
    .ok_or_else(|| PortfolioError::DidNotConverge {
      message: "solver returned no iterate".to_string(),
    })?;

  Ok(SeedOutcome {
    raw,
    converged,
    iterations,
    evaluations,
  })
}

/// Equal weighting plus up to `restarts` seeds concentrated on single
/// instruments. Deterministic by construction.
fn seed_points(n: usize, restarts: usize) -> Vec<Vec<f64>> {
  let mut seeds = vec![vec![1.0 / n as f64; n]];
  for k in 0..restarts.min(n) {
    let mut seed = vec![0.2 / (n - 1) as f64; n];
    seed[k] = 0.8;
    seeds.push(seed);
  }
  seeds
}

/// Clamp into bounds and renormalize so the weights sum exactly to one. The
/// raw solver output may violate the equality constraint within penalty
/// tolerance; the reported allocation must not.
fn normalize_weights(raw: &[f64], lower: f64, upper: f64) -> Result<Vec<f64>> {
  let mut weights: Vec<f64> = raw
    .iter()
    .map(|&w| if w.is_finite() { w.clamp(lower, upper) } else { lower })
    .collect();

  let sum: f64 = weights.iter().sum();
  if !sum.is_finite() || sum.abs() < 1e-12 {
    return Err(PortfolioError::DidNotConverge {
      message: format!("weights sum to {sum} after clamping"),
    });
  }

  for w in &mut weights {
    *w /= sum;
  }
  Ok(weights)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;
  use ndarray::Array2;
  use tracing_test::traced_test;

  use super::*;
  use crate::series::PortfolioValueSeries;

  fn series_from_columns(columns: &[Vec<f64>]) -> PriceSeries {
    let n_dates = columns[0].len();
    let start = NaiveDate::from_ymd_opt(2010, 1, 4).unwrap();
    let dates = (0..n_dates)
      .map(|i| start + chrono::Duration::days(i as i64))
      .collect();
    let mut closes = Array2::zeros((n_dates, columns.len()));
    for (j, column) in columns.iter().enumerate() {
      for (i, &px) in column.iter().enumerate() {
        closes[[i, j]] = px;
      }
    }
    let symbols = (0..columns.len()).map(|j| format!("SYM{j}")).collect();
    PriceSeries::new(dates, symbols, closes).unwrap()
  }

  fn two_asset_fixture() -> PriceSeries {
    series_from_columns(&[
      vec![1.0, 1.02, 1.01, 1.05],
      vec![1.0, 0.99, 1.00, 0.98],
    ])
  }

  fn grid_best_sharpe(prices: &PriceSeries, config: &OptimizerConfig) -> (f64, f64) {
    let mut best = f64::NEG_INFINITY;
    let mut best_w = 0.0;
    for k in 0..=100 {
      let w = k as f64 / 100.0;
      let stats = portfolio_value(prices, &[w, 1.0 - w], 1.0)
        .and_then(|value| portfolio_stats(&value, config.risk_free_rate, config.periods_per_year));
      if let Ok(stats) = stats {
        if stats.sharpe > best {
          best = stats.sharpe;
          best_w = w;
        }
      }
    }
    (best, best_w)
  }

  #[test]
  fn empty_universe_is_rejected() {
    let start = NaiveDate::from_ymd_opt(2010, 1, 4).unwrap();
    let dates = (0..4)
      .map(|i| start + chrono::Duration::days(i))
      .collect();
    let prices = PriceSeries::new(dates, Vec::new(), Array2::zeros((4, 0))).unwrap();

    let result = optimize(&prices, &OptimizerConfig::default());
    assert!(matches!(result, Err(PortfolioError::EmptyPortfolio)));
  }

  #[test]
  fn single_instrument_gets_full_weight() {
    let prices = series_from_columns(&[vec![1.0, 1.02, 1.01, 1.05]]);
    let result = optimize(&prices, &OptimizerConfig::default()).unwrap();

    assert_eq!(result.weights, vec![1.0]);
    assert!(result.converged);
    assert_eq!(result.iterations, 0);

    let own = portfolio_value(&prices, &[1.0], 1.0)
      .and_then(|value| portfolio_stats(&value, 0.0, 252))
      .unwrap();
    assert_abs_diff_eq!(result.stats.sharpe, own.sharpe, epsilon = 1e-12);
  }

  #[test]
  fn weights_always_sum_to_one() {
    let prices = series_from_columns(&[
      vec![100.0, 104.0, 103.0, 108.0, 110.0],
      vec![40.0, 39.5, 41.0, 40.5, 42.0],
      vec![25.0, 25.5, 25.2, 26.0, 25.8],
    ]);
    let result = optimize(&prices, &OptimizerConfig::default()).unwrap();

    let sum: f64 = result.weights.iter().sum();
    assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-9);
    assert!(result.weights.iter().all(|&w| (-1e-9..=1.0 + 1e-9).contains(&w)));
    assert!(result.evaluations > 0);
  }

  #[test]
  fn optimize_is_deterministic() {
    let prices = two_asset_fixture();
    let config = OptimizerConfig::default();

    let a = optimize(&prices, &config).unwrap();
    let b = optimize(&prices, &config).unwrap();

    for (x, y) in a.weights.iter().zip(b.weights.iter()) {
      assert_abs_diff_eq!(*x, *y, epsilon = 1e-6);
    }
    assert_abs_diff_eq!(a.stats.sharpe, b.stats.sharpe, epsilon = 1e-6);
    assert_eq!(a.evaluations, b.evaluations);
  }

  #[test]
  fn two_asset_search_matches_grid_cross_check() {
    let prices = two_asset_fixture();
    let config = OptimizerConfig::default();

    let result = optimize(&prices, &config).unwrap();
    let (grid_best, grid_w) = grid_best_sharpe(&prices, &config);

    // The second instrument loses money on its own, yet the near-perfect
    // negative correlation puts the Sharpe optimum at roughly 38/62; the
    // grid is the ground truth the solver has to match or beat.
    assert!(result.stats.sharpe >= grid_best - 1e-6);
    assert!((result.stats.sharpe - grid_best).abs() < 0.2);
    assert_abs_diff_eq!(result.weights[0], grid_w, epsilon = 0.02);

    let equal = portfolio_value(&prices, &[0.5, 0.5], 1.0)
      .and_then(|value| portfolio_stats(&value, 0.0, 252))
      .unwrap();
    assert!(result.stats.sharpe > equal.sharpe);
  }

  #[test]
  fn legacy_bounds_still_produce_normalized_weights() {
    let prices = two_asset_fixture();
    let config = OptimizerConfig {
      bounds: WeightBounds::InstrumentCount,
      ..OptimizerConfig::default()
    };

    let result = optimize(&prices, &config).unwrap();
    let sum: f64 = result.weights.iter().sum();
    assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-9);
  }

  #[traced_test]
  #[test]
  fn restarts_never_hurt_the_objective() {
    let prices = series_from_columns(&[
      vec![100.0, 104.0, 103.0, 108.0, 110.0],
      vec![40.0, 39.5, 41.0, 40.5, 42.0],
      vec![25.0, 25.5, 25.2, 26.0, 25.8],
    ]);
    let base = optimize(&prices, &OptimizerConfig::default()).unwrap();
    let config = OptimizerConfig {
      restarts: 3,
      ..OptimizerConfig::default()
    };

    let restarted = optimize(&prices, &config).unwrap();
    assert!(restarted.stats.sharpe >= base.stats.sharpe - 1e-6);

    let again = optimize(&prices, &config).unwrap();
    assert_abs_diff_eq!(restarted.stats.sharpe, again.stats.sharpe, epsilon = 1e-9);
  }

  #[test]
  fn bounds_resolve_per_mode() {
    assert_eq!(WeightBounds::LongOnly.resolve(4), (0.0, 1.0));
    assert_eq!(WeightBounds::InstrumentCount.resolve(4), (0.0, 4.0));
    assert_eq!(
      WeightBounds::Custom {
        lower: 0.1,
        upper: 0.6
      }
      .resolve(4),
      (0.1, 0.6)
    );
  }

  #[test]
  fn normalization_recovers_exact_simplex() {
    let weights = normalize_weights(&[0.5004, 0.5004], 0.0, 1.0).unwrap();
    assert_abs_diff_eq!(weights.iter().sum::<f64>(), 1.0, epsilon = 1e-15);
    assert_abs_diff_eq!(weights[0], 0.5, epsilon = 1e-12);
  }

  #[test]
  fn flat_universe_cannot_be_optimized() {
    let prices = series_from_columns(&[vec![1.0, 1.0, 1.0, 1.0], vec![2.0, 2.0, 2.0, 2.0]]);
    let result = optimize(&prices, &OptimizerConfig::default());

    assert!(matches!(result, Err(PortfolioError::DegenerateVolatility)));
  }

  #[test]
  fn value_series_fixture_is_well_formed() {
    let prices = two_asset_fixture();
    let value = portfolio_value(&prices, &[0.5, 0.5], 1.0).unwrap();
    let as_series =
      PortfolioValueSeries::new(prices.dates().to_vec(), value.values().clone()).unwrap();
    assert_eq!(as_series.len(), 4);
  }
}
