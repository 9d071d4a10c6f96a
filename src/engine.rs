//! # Allocation Engine
//!
//! $$
//! \mathbf{w}^\* = \operatorname{Optimize}(P, \text{config})
//! $$
//!
//! Single configured entry point tying providers, evaluation and the Sharpe
//! search together. Thin by design; all logic lives in the components.

use crate::error::Result;
use crate::evaluator::portfolio_stats;
use crate::evaluator::portfolio_value;
use crate::evaluator::PortfolioStats;
use crate::optimizer::optimize;
use crate::optimizer::OptimizationResult;
use crate::optimizer::OptimizerConfig;
use crate::provider::DateRange;
use crate::provider::PriceDataProvider;
use crate::series::PriceSeries;

/// Configured facade over evaluation and optimization.
#[derive(Clone, Debug, Default)]
pub struct AllocationEngine {
  config: OptimizerConfig,
}

impl AllocationEngine {
  /// Construct an engine with explicit configuration.
  pub fn new(config: OptimizerConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &OptimizerConfig {
    &self.config
  }

  /// Sharpe-optimal allocation for an already-loaded price history.
  pub fn optimize(&self, prices: &PriceSeries) -> Result<OptimizationResult> {
    optimize(prices, &self.config)
  }

  /// Statistics of a fixed allocation, e.g. an equal-weight benchmark.
  pub fn evaluate(&self, prices: &PriceSeries, weights: &[f64]) -> Result<PortfolioStats> {
    let value = portfolio_value(prices, weights, 1.0)?;
    portfolio_stats(&value, self.config.risk_free_rate, self.config.periods_per_year)
  }

  /// Load prices from a provider, then optimize.
  pub fn optimize_from<P: PriceDataProvider>(
    &self,
    provider: &P,
    symbols: &[&str],
    range: &DateRange,
  ) -> Result<OptimizationResult> {
    let prices = provider.prices(symbols, range)?;
    self.optimize(&prices)
  }
}
